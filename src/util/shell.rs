//! Centralized shell output and progress management.
//!
//! Commands report what they are doing through [`Shell::status`]; download
//! progress goes through [`Shell::bytes_progress`], which is a no-op when
//! stderr is not a terminal or the shell is quiet/verbose.

use std::fmt::Display;
use std::io::{self, IsTerminal};

use indicatif::{ProgressBar, ProgressStyle};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no progress
    Quiet,
    /// Default: status messages + progress bars
    #[default]
    Normal,
    /// --verbose: status lines and debug logs, no progress bars
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Finished,

    // In-progress statuses (cyan)
    Fetching,
    Unpacking,
    Probing,
    Running,

    // Warning statuses (yellow)
    Fresh,
    Skipped,
    Warning,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Fetching => "Fetching",
            Status::Unpacking => "Unpacking",
            Status::Probing => "Probing",
            Status::Running => "Running",
            Status::Fresh => "Fresh",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished => "\x1b[1;32m",
            Status::Fetching | Status::Unpacking | Status::Probing | Status::Running => {
                "\x1b[1;36m"
            }
            Status::Fresh | Status::Skipped | Status::Warning => "\x1b[1;33m",
        }
    }
}

/// Width that status words are right-aligned to.
const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug, Clone)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    /// Create a new shell.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
        }
    }

    /// Create a shell from CLI flags. Quiet wins over verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, color)
    }

    /// A shell that prints nothing but errors, for library callers and tests.
    pub fn quiet() -> Self {
        Shell::new(Verbosity::Quiet, ColorChoice::Never)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print a status message.
    ///
    /// Format: `{status:>12} {message}`. Nothing is printed in quiet mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() {
            return;
        }

        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();

        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Create a byte-based progress bar for downloads.
    ///
    /// `total_bytes` of `None` (no Content-Length) yields a spinner.
    pub fn bytes_progress(&self, msg: impl Display, total_bytes: Option<u64>) -> Progress {
        let interactive = io::stderr().is_terminal();
        let pb = if self.is_quiet() || self.is_verbose() || !interactive {
            None
        } else {
            let (pb, template) = match total_bytes {
                Some(total) => (
                    ProgressBar::new(total),
                    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
                ),
                None => (ProgressBar::new_spinner(), "{spinner:.green} {msg} {bytes}"),
            };
            if let Ok(style) = ProgressStyle::default_bar().template(template) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(msg.to_string());
            Some(pb)
        };

        Progress { pb, current: 0 }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

/// Progress bar wrapper that respects shell mode.
pub struct Progress {
    pb: Option<ProgressBar>,
    current: u64,
}

impl Progress {
    /// Advance by `delta` bytes.
    pub fn inc(&mut self, delta: u64) {
        self.current += delta;
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }

    /// Bytes seen so far.
    pub fn position(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_choice_parse() {
        assert_eq!("auto".parse::<ColorChoice>().unwrap(), ColorChoice::Auto);
        assert_eq!("ALWAYS".parse::<ColorChoice>().unwrap(), ColorChoice::Always);
        assert_eq!("never".parse::<ColorChoice>().unwrap(), ColorChoice::Never);
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }

    #[test]
    fn test_status_formatting() {
        let shell = Shell::new(Verbosity::Normal, ColorChoice::Never);

        let formatted = shell.format_status(Status::Unpacking);
        assert_eq!(formatted.trim(), "Unpacking");
        assert_eq!(formatted.len(), STATUS_WIDTH);
    }

    #[test]
    fn test_from_flags() {
        assert!(Shell::from_flags(true, true, ColorChoice::Never).is_quiet());
        assert!(Shell::from_flags(false, true, ColorChoice::Never).is_verbose());
        let normal = Shell::from_flags(false, false, ColorChoice::Never);
        assert!(!normal.is_quiet() && !normal.is_verbose());
    }

    #[test]
    fn test_quiet_progress_still_counts() {
        let shell = Shell::quiet();
        let mut progress = shell.bytes_progress("archive.zip", Some(100));
        progress.inc(40);
        progress.inc(60);
        progress.finish();
        assert_eq!(progress.position(), 100);
    }
}
