//! `berth probe` command

use anyhow::Result;

use crate::cli::ProbeArgs;
use berth::ops::{format_report, probe, ProbeOptions};
use berth::util::shell::Shell;
use berth::util::GlobalContext;

pub fn execute(args: ProbeArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let mut opts = ProbeOptions {
        c99: args.c99,
        cxx11: args.cxx11,
        pthreads: args.pthreads,
        skip_advisories: args.no_advisories,
    };
    // no selection means everything
    if !opts.any() {
        opts = ProbeOptions {
            skip_advisories: args.no_advisories,
            ..ProbeOptions::all()
        };
    }

    let report = probe(&ctx, &opts, shell)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }

    Ok(())
}
