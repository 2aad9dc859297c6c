//! Parsing the output of archive list commands.

use serde::Serialize;

/// Shape of a list command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListFormat {
    /// `tar tv`: one entry per line, name last.
    Tar,
    /// `gzip -l`: a header line, then one entry.
    Gzip,
    /// `unzip -l`: three header lines and two footer lines.
    Unzip,
    /// `7z l`: nine lines of banner and two of totals.
    SevenZip,
    /// No list tool; the archive holds a single file named after its stem.
    Stem,
}

/// Entry names from a list command's `output`.
pub fn parse_listing(format: ListFormat, output: &str, stem: &str) -> Vec<String> {
    let lines: Vec<&str> = output.lines().collect();
    let count = lines.len();

    let keep = |index: usize| match format {
        ListFormat::Tar => true,
        ListFormat::Gzip => index > 0,
        ListFormat::Unzip => index >= 3 && index + 2 < count,
        ListFormat::SevenZip => index > 8 && index + 2 < count,
        ListFormat::Stem => false,
    };

    if format == ListFormat::Stem {
        return vec![stem.to_string()];
    }

    lines
        .iter()
        .enumerate()
        .filter(|(index, _)| keep(*index))
        .filter_map(|(_, line)| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}
