//! `berth prepare` command

use anyhow::Result;

use crate::cli::PrepareArgs;
use berth::ops::{format_report, prepare, PrepareOptions};
use berth::util::shell::{Shell, Status};
use berth::util::GlobalContext;

pub fn execute(args: PrepareArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let opts = PrepareOptions {
        offline: args.offline,
        force: args.force,
        skip_probes: args.skip_probes,
    };
    let result = prepare(&ctx, &opts, shell)?;

    if let Some(report) = &result.probes {
        if !shell.is_quiet() {
            eprint!("{}", format_report(report));
        }
    }
    if let Some(path) = &result.flags_file {
        shell.status(Status::Finished, format!("wrote {}", path.display()));
    } else {
        shell.status(
            Status::Finished,
            format!(
                "{} downloaded, {} unpacked",
                result.downloaded.len(),
                result.unpacked.len()
            ),
        );
    }

    Ok(())
}
