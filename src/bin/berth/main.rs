//! Berth CLI - fetch, unpack and probe third-party C/C++ code

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use berth::util::shell::Shell;
use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("berth=debug")
    } else if cli.quiet {
        EnvFilter::new("berth=error")
    } else {
        EnvFilter::new("berth=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);

    match cli.command {
        Commands::Probe(args) => commands::probe::execute(args, &shell),
        Commands::Fetch(args) => commands::fetch::execute(args, &shell),
        Commands::Unpack(args) => commands::unpack::execute(args, &shell),
        Commands::Extractors => commands::extractors::execute(),
        Commands::Prepare(args) => commands::prepare::execute(args, &shell),
        Commands::Test(args) => commands::test::execute(args, &shell),
        Commands::Toolchain => commands::toolchain::execute(),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
