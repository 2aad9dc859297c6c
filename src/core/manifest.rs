//! Berth.toml manifest parsing and schema.
//!
//! The manifest lists the third-party archives a project bootstraps and the
//! compiler probes to run before building it:
//!
//! ```toml
//! [probe]
//! c99 = true
//! cxx11 = true
//! pthreads = true
//!
//! [[dependency]]
//! name = "tinycbor"
//! url = "https://github.com/01org/tinycbor/archive/v0.2.1.zip"
//! archive = "extlibs/tinycbor/v0.2.1.zip"
//! extract-dir = "extlibs/tinycbor"
//! target = "extlibs/tinycbor/tinycbor-0.2.1"
//! ```
//!
//! All paths are relative to the directory containing the manifest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Berth.toml";

/// Raw manifest as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    probe: ProbeSettings,

    #[serde(default, rename = "dependency")]
    dependencies: Vec<RawDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawDependency {
    name: String,
    url: Option<String>,
    archive: PathBuf,
    extract_dir: Option<PathBuf>,
    target: PathBuf,
    sha256: Option<String>,
}

/// Which compiler probes `prepare` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    pub c99: bool,
    pub cxx11: bool,
    pub pthreads: bool,
}

/// A third-party archive with all paths resolved against the manifest root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Where to download the archive from; `None` means it is vendored.
    pub url: Option<Url>,
    /// Local archive path (download destination / extraction source).
    pub archive: PathBuf,
    /// Directory the archive is extracted into.
    pub extract_dir: PathBuf,
    /// Path that exists once the archive has been unpacked.
    pub target: PathBuf,
    /// Expected SHA256 of the archive, lowercase hex.
    pub sha256: Option<String>,
}

/// A parsed Berth.toml.
#[derive(Debug, Clone)]
pub struct Manifest {
    root: PathBuf,
    probe: ProbeSettings,
    dependencies: Vec<Dependency>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::parse(&contents, &root)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest text whose relative paths are anchored at `root`.
    pub fn parse(contents: &str, root: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(contents)?;

        let mut seen = HashSet::new();
        let mut dependencies = Vec::with_capacity(raw.dependencies.len());

        for dep in raw.dependencies {
            if dep.name.trim().is_empty() {
                bail!("dependency name must not be empty");
            }
            if !seen.insert(dep.name.clone()) {
                bail!("dependency `{}` is listed more than once", dep.name);
            }
            if dep.archive.as_os_str().is_empty() || dep.target.as_os_str().is_empty() {
                bail!("dependency `{}` needs both `archive` and `target`", dep.name);
            }

            let url = dep
                .url
                .as_deref()
                .map(Url::parse)
                .transpose()
                .with_context(|| format!("invalid url for dependency `{}`", dep.name))?;

            let sha256 = match dep.sha256 {
                Some(hash) => {
                    let hash = hash.to_ascii_lowercase();
                    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                        bail!("dependency `{}` has a malformed sha256", dep.name);
                    }
                    Some(hash)
                }
                None => None,
            };

            let archive = root.join(&dep.archive);
            let extract_dir = match dep.extract_dir {
                Some(dir) => root.join(dir),
                None => archive
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf()),
            };

            dependencies.push(Dependency {
                name: dep.name,
                url,
                archive,
                extract_dir,
                target: root.join(dep.target),
                sha256,
            });
        }

        Ok(Manifest {
            root: root.to_path_buf(),
            probe: raw.probe,
            dependencies,
        })
    }

    pub fn probe(&self) -> ProbeSettings {
        self.probe
    }

    /// Dependencies in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Directory for generated reports (`<root>/target/berth`).
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("target").join("berth")
    }
}
