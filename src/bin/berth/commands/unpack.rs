//! `berth unpack` command

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::UnpackArgs;
use berth::sources::archive::list;
use berth::sources::{unpack_all, ExtractorRegistry, UnpackOptions, UnpackOutcome};
use berth::util::shell::{Shell, Status};
use berth::util::GlobalContext;

pub fn execute(args: UnpackArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let registry = ExtractorRegistry::detect();

    if args.list {
        if !args.archive.is_file() {
            bail!("archive `{}` does not exist", args.archive.display());
        }
        let descriptor = registry.select_or_err(&args.archive)?;
        for entry in list(descriptor, &args.archive)? {
            println!("{}", entry);
        }
        return Ok(());
    }

    let extract_dir = match &args.into {
        Some(dir) => dir.clone(),
        None => args
            .archive
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    // without an explicit target, expect a directory named like the archive's stem
    let target = match &args.target {
        Some(target) => target.clone(),
        None => {
            let descriptor = registry.select_or_err(&args.archive)?;
            let file_name = args
                .archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            extract_dir.join(descriptor.stem(&file_name))
        }
    };

    shell.status(Status::Unpacking, args.archive.display());
    let opts = UnpackOptions::from_config(ctx.config());
    match unpack_all(&registry, &args.archive, &target, &extract_dir, &opts)? {
        UnpackOutcome::AlreadyPresent => shell.status(Status::Fresh, target.display()),
        UnpackOutcome::Extracted => shell.status(Status::Finished, target.display()),
        UnpackOutcome::SkippedEmpty => shell.status(Status::Skipped, "archive is empty"),
    }

    Ok(())
}
