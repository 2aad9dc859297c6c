//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;

use berth::util::shell::ColorChoice;

/// Berth - fetch, unpack and probe what a C/C++ build needs
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the flags the host compiler needs for C99, C++11 and pthreads
    Probe(ProbeArgs),

    /// Download a file unless the local copy is current
    Fetch(FetchArgs),

    /// Unpack an archive with the matching host tool
    Unpack(UnpackArgs),

    /// List the archive tools found on this host
    Extractors,

    /// Download and unpack every dependency in Berth.toml, then probe
    Prepare(PrepareArgs),

    /// Run a unit-test binary, optionally under valgrind
    Test(TestArgs),

    /// Show the detected toolchain
    Toolchain,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Probe C99 support
    #[arg(long)]
    pub c99: bool,

    /// Probe C++11 support
    #[arg(long)]
    pub cxx11: bool,

    /// Probe POSIX threads
    #[arg(long)]
    pub pthreads: bool,

    /// Skip compiler-specific advisory checks
    #[arg(long)]
    pub no_advisories: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FetchArgs {
    /// URL to download
    pub url: String,

    /// Where to write the file
    pub dest: PathBuf,

    /// Download even if the recorded metadata matches
    #[arg(short, long)]
    pub force: bool,

    /// Expected SHA-256 of the file
    #[arg(long)]
    pub sha256: Option<String>,
}

#[derive(Args)]
pub struct UnpackArgs {
    /// The archive
    pub archive: PathBuf,

    /// Path the archive is expected to produce; unpacking is skipped if it exists
    pub target: Option<PathBuf>,

    /// Directory to extract into (defaults to the archive's directory)
    #[arg(long, value_name = "DIR")]
    pub into: Option<PathBuf>,

    /// List the archive's entries instead of extracting
    #[arg(long)]
    pub list: bool,
}

#[derive(Args)]
pub struct PrepareArgs {
    /// Never download; archives must already be present
    #[arg(long)]
    pub offline: bool,

    /// Re-download archives even if they look current
    #[arg(short, long)]
    pub force: bool,

    /// Do not run the probes listed in Berth.toml
    #[arg(long)]
    pub skip_probes: bool,
}

#[derive(Args)]
pub struct TestArgs {
    /// The compiled test binary
    pub binary: PathBuf,

    /// Directory for XML reports
    #[arg(long, value_name = "DIR", default_value = "test_out")]
    pub output_dir: PathBuf,

    /// Run under valgrind's memcheck
    #[arg(long)]
    pub memcheck: bool,

    /// Valgrind suppressions file
    #[arg(long, value_name = "FILE", requires = "memcheck")]
    pub suppressions: Option<PathBuf>,

    /// Arguments passed through to the test binary
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: CompletionShell,
}
