//! Global context for Berth operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;

use crate::core::manifest::MANIFEST_NAME;
use crate::util::config::{
    global_config_dir, load_config, load_toolchain_config, project_config_dir, Config,
    ToolchainConfig,
};

/// Environment variable overriding the download metadata cache location.
pub const CACHE_DIR_ENV: &str = "BERTH_CACHE_DIR";

/// Project directories for Berth
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "berth", "berth"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Berth data (~/.berth/)
    home: PathBuf,

    /// Cache directory for download metadata
    cache_dir: PathBuf,

    /// Merged global + project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(".berth"));

        let cache_dir = match std::env::var_os(CACHE_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => PROJECT_DIRS
                .as_ref()
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .unwrap_or_else(|| home.join("cache")),
        };

        let config = load_config(
            &home.join("config.toml"),
            &project_config_dir(&cwd).join("config.toml"),
        );

        Ok(GlobalContext {
            cwd,
            home,
            cache_dir,
            config,
        })
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the cache directory used for download metadata.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the merged toolchain overrides (project beats global).
    pub fn toolchain_config(&self) -> ToolchainConfig {
        load_toolchain_config(
            &self.home.join("toolchain.toml"),
            &project_config_dir(&self.cwd).join("toolchain.toml"),
        )
    }

    /// Find `Berth.toml` starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                bail!(
                    "could not find `{}` in `{}` or any parent directory",
                    MANIFEST_NAME,
                    self.cwd.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest_searches_upward() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&manifest, "").unwrap();
        let nested = tmp.path().join("resource/csdk");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_manifest().unwrap(), manifest);
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        // a Berth.toml above the temp dir is found first
        if let Err(e) = ctx.find_manifest() {
            assert!(e.to_string().contains(MANIFEST_NAME));
        }
    }

    #[test]
    fn test_project_config_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".berth");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[unpack]\nshow-output = true\n").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert!(ctx.config().unpack.show_output());
    }
}
