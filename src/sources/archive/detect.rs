//! Building the extractor registry from the host's archive tools.

use std::path::PathBuf;

use super::{ExtractorDescriptor, ExtractorRegistry, ListFormat};

/// Which family of archive tools to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// tar, gzip, bzip2 and unzip
    Posix,
    /// 7-Zip handles every format
    Windows,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Posix
        }
    }
}

const TARGZ_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar.gzip"];
const TARBZ_SUFFIXES: &[&str] = &[".tar.bz", ".tbz", ".tar.bz2", ".tar.bzip2", ".tar.bzip"];
const BZIP_SUFFIXES: &[&str] = &[".bz", ".bzip", ".bz2", ".bzip2"];
const GZIP_SUFFIXES: &[&str] = &[".gz", ".gzip"];
const TAR_SUFFIXES: &[&str] = &[".tar"];
const ZIP_SUFFIXES: &[&str] = &[".zip"];

struct Entry {
    name: &'static str,
    priority: i32,
    suffixes: &'static [&'static str],
    list: Option<&'static str>,
    extract: &'static str,
    format: ListFormat,
}

impl Entry {
    fn descriptor(&self, run: PathBuf) -> ExtractorDescriptor {
        ExtractorDescriptor {
            name: self.name.to_string(),
            priority: self.priority,
            suffixes: self.suffixes.iter().map(|s| s.to_string()).collect(),
            run: run.display().to_string(),
            list_command: self.list.map(str::to_string),
            extract_command: self.extract.to_string(),
            list_format: self.format,
        }
    }
}

/// (tool, formats it backs)
fn posix_table() -> Vec<(&'static str, Vec<Entry>)> {
    vec![
        (
            "tar",
            vec![
                Entry {
                    name: "TAR",
                    priority: 1,
                    suffixes: TAR_SUFFIXES,
                    list: Some("{run} tvf {source}"),
                    extract: "{run} xf {source} -C {dest}",
                    format: ListFormat::Tar,
                },
                Entry {
                    name: "TARGZ",
                    priority: 0,
                    suffixes: TARGZ_SUFFIXES,
                    list: Some("{run} tvfz {source}"),
                    extract: "{run} xfz {source} -C {dest}",
                    format: ListFormat::Tar,
                },
                Entry {
                    name: "TARBZ",
                    priority: 0,
                    suffixes: TARBZ_SUFFIXES,
                    list: Some("{run} tvfj {source}"),
                    extract: "{run} xfj {source} -C {dest}",
                    format: ListFormat::Tar,
                },
            ],
        ),
        (
            "gzip",
            vec![Entry {
                name: "GZIP",
                priority: 1,
                suffixes: GZIP_SUFFIXES,
                list: Some("{run} -l {source}"),
                extract: "{run} -dc {source} > {dest}/{stem}",
                format: ListFormat::Gzip,
            }],
        ),
        (
            "bzip2",
            vec![Entry {
                name: "BZIP",
                priority: 1,
                suffixes: BZIP_SUFFIXES,
                list: None,
                extract: "{run} -dc {source} > {dest}/{stem}",
                format: ListFormat::Stem,
            }],
        ),
        (
            "unzip",
            vec![Entry {
                name: "ZIP",
                priority: 1,
                suffixes: ZIP_SUFFIXES,
                list: Some("{run} -l {source}"),
                extract: "{run} -oqq {source} -d {dest}",
                format: ListFormat::Unzip,
            }],
        ),
    ]
}

fn windows_table() -> Vec<(&'static str, Vec<Entry>)> {
    let single = |name, suffixes| Entry {
        name,
        priority: 1,
        suffixes,
        list: Some("{run} l {source} -y"),
        extract: "{run} x {source} -y -o{dest}",
        format: ListFormat::SevenZip,
    };
    // compressed tarballs: decompress to stdout and untar from stdin
    let piped = |name, suffixes| Entry {
        name,
        priority: 0,
        suffixes,
        list: Some("{run} x {source} -so -y | {run} l -si -ttar -y"),
        extract: "{run} x {source} -so -y | {run} x -si -ttar -y -o{dest}",
        format: ListFormat::SevenZip,
    };

    vec![(
        "7z",
        vec![
            piped("TARGZ", TARGZ_SUFFIXES),
            piped("TARBZ", TARBZ_SUFFIXES),
            single("BZIP", BZIP_SUFFIXES),
            single("GZIP", GZIP_SUFFIXES),
            single("ZIP", ZIP_SUFFIXES),
            Entry {
                list: Some("{run} l {source} -y -ttar"),
                extract: "{run} x {source} -y -ttar -o{dest}",
                ..single("TAR", TAR_SUFFIXES)
            },
        ],
    )]
}

/// Register every format whose backing tool `locate` can find.
pub(super) fn detect_with<F>(platform: HostPlatform, locate: F) -> ExtractorRegistry
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let table = match platform {
        HostPlatform::Posix => posix_table(),
        HostPlatform::Windows => windows_table(),
    };

    let mut registry = ExtractorRegistry::new();
    for (tool, entries) in table {
        let Some(run) = locate(tool) else {
            tracing::debug!("`{}` not found; its archive formats are unavailable", tool);
            continue;
        };
        for entry in entries {
            if let Err(e) = registry.register(entry.descriptor(run.clone())) {
                tracing::warn!("{}", e);
            }
        }
    }
    registry
}
