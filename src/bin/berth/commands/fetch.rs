//! `berth fetch` command

use anyhow::{Context, Result};
use url::Url;

use crate::cli::FetchArgs;
use berth::sources::{DownloadOptions, DownloadOutcome, Fetcher, MetadataStore};
use berth::util::shell::{Shell, Status};
use berth::util::GlobalContext;

pub fn execute(args: FetchArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let url = Url::parse(&args.url).with_context(|| format!("invalid url `{}`", args.url))?;

    let fetcher = Fetcher::new(&ctx.config().net, shell.clone())?;
    let mut store = MetadataStore::in_cache_dir(ctx.cache_dir())?;

    let opts = DownloadOptions {
        force: args.force,
        sha256: args.sha256.as_deref(),
    };
    let outcome = fetcher.download(&url, &args.dest, &mut store, opts)?;

    if let DownloadOutcome::Downloaded(_) = outcome {
        store
            .save()
            .with_context(|| format!("failed to save {}", store.path().display()))?;
        shell.status(Status::Finished, args.dest.display());
    }

    Ok(())
}
