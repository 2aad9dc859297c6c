//! `berth prepare`: fetch and unpack every dependency, then probe.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::{Dependency, Manifest};
use crate::ops::probe::{probe, ProbeOptions, ProbeReport};
use crate::sources::archive::{unpack_all, ExtractorRegistry, UnpackOptions, UnpackOutcome};
use crate::sources::remote::{DownloadOptions, DownloadOutcome, Fetcher, MetadataStore};
use crate::util::fs::write_string;
use crate::util::shell::{Shell, Status};
use crate::util::GlobalContext;

/// File the probe results are written to, inside the manifest's output dir.
pub const FLAGS_FILE: &str = "flags.json";

/// Options for [`prepare`].
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Never download; every archive must already be on disk.
    pub offline: bool,

    /// Download even when the recorded metadata says nothing changed.
    pub force: bool,

    /// Do not run the manifest's probes.
    pub skip_probes: bool,
}

/// What [`prepare`] did.
#[derive(Debug, Default)]
pub struct PrepareResult {
    pub downloaded: Vec<String>,
    pub unpacked: Vec<String>,
    pub probes: Option<ProbeReport>,
    /// Where the probe report was written.
    pub flags_file: Option<PathBuf>,
}

/// How dependencies are acquired.
pub struct Acquirer<'a> {
    pub fetcher: Option<&'a Fetcher>,
    pub store: &'a mut MetadataStore,
    pub registry: &'a ExtractorRegistry,
    pub unpack: UnpackOptions,
    pub force: bool,
    pub shell: &'a Shell,
}

impl Acquirer<'_> {
    /// Download (when the dependency has a URL) and unpack one dependency.
    ///
    /// Returns whether it was (downloaded, unpacked).
    pub fn acquire(&mut self, dep: &Dependency) -> Result<(bool, bool)> {
        if dep.target.exists() {
            tracing::debug!("{}: {} exists", dep.name, dep.target.display());
            self.shell.status(Status::Fresh, &dep.name);
            return Ok((false, false));
        }

        let downloaded = self.download(dep)?;

        self.shell
            .status(Status::Unpacking, format!("{} ({})", dep.name, file_name(&dep.archive)));
        let outcome = unpack_all(
            self.registry,
            &dep.archive,
            &dep.target,
            &dep.extract_dir,
            &self.unpack,
        )
        .with_context(|| format!("failed to unpack dependency `{}`", dep.name))?;

        Ok((downloaded, outcome == UnpackOutcome::Extracted))
    }

    fn download(&mut self, dep: &Dependency) -> Result<bool> {
        let Some(url) = &dep.url else {
            if !dep.archive.exists() {
                bail!(
                    "dependency `{}` has no url and `{}` does not exist",
                    dep.name,
                    dep.archive.display()
                );
            }
            return Ok(false);
        };

        let Some(fetcher) = self.fetcher else {
            if !dep.archive.exists() {
                bail!(
                    "cannot download `{}` in offline mode; place it at `{}`",
                    url,
                    dep.archive.display()
                );
            }
            self.shell.status(Status::Skipped, format!("{} (offline)", dep.name));
            return Ok(false);
        };

        let opts = DownloadOptions {
            force: self.force,
            sha256: dep.sha256.as_deref(),
        };
        let outcome = fetcher
            .download(url, &dep.archive, self.store, opts)
            .with_context(|| format!("failed to download dependency `{}`", dep.name))?;

        Ok(matches!(outcome, DownloadOutcome::Downloaded(_)))
    }
}

/// Bootstrap the project whose manifest is found from the working directory.
pub fn prepare(gctx: &GlobalContext, opts: &PrepareOptions, shell: &Shell) -> Result<PrepareResult> {
    let manifest_path = gctx.find_manifest()?;
    let manifest = Manifest::load(&manifest_path)?;
    prepare_manifest(gctx, &manifest, opts, shell)
}

/// Bootstrap an already loaded manifest.
pub fn prepare_manifest(
    gctx: &GlobalContext,
    manifest: &Manifest,
    opts: &PrepareOptions,
    shell: &Shell,
) -> Result<PrepareResult> {
    let mut result = PrepareResult::default();
    let config = gctx.config();
    let offline = opts.offline || config.net.offline;

    if !manifest.dependencies().is_empty() {
        let fetcher = if offline {
            None
        } else {
            Some(Fetcher::new(&config.net, shell.clone())?)
        };
        let mut store = MetadataStore::in_cache_dir(gctx.cache_dir())?;
        let registry = ExtractorRegistry::detect();
        if registry.is_empty() {
            shell.warn("no archive tools found on PATH (tar, gzip, bzip2, unzip or 7z)");
        }

        let mut acquirer = Acquirer {
            fetcher: fetcher.as_ref(),
            store: &mut store,
            registry: &registry,
            unpack: UnpackOptions::from_config(config),
            force: opts.force,
            shell,
        };

        let mut outcome = Ok(());
        for dep in manifest.dependencies() {
            match acquirer.acquire(dep) {
                Ok((downloaded, unpacked)) => {
                    if downloaded {
                        result.downloaded.push(dep.name.clone());
                    }
                    if unpacked {
                        result.unpacked.push(dep.name.clone());
                    }
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        // keep metadata for whatever finished, even if a later dependency failed
        if !result.downloaded.is_empty() {
            store.save().context("failed to save download metadata")?;
        }
        outcome?;
    }

    let probe_opts = ProbeOptions::from_settings(manifest.probe());
    if probe_opts.any() && !opts.skip_probes {
        let report = probe(gctx, &probe_opts, shell)?;
        let path = manifest.output_dir().join(FLAGS_FILE);
        write_report(&report, &path)?;
        result.flags_file = Some(path);
        result.probes = Some(report);
    }

    Ok(result)
}

fn write_report(report: &ProbeReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    write_string(path, &json)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
