//! Configuration file support for Berth.
//!
//! Berth supports two configuration file locations:
//! - Global: `~/.berth/config.toml` - User-wide defaults
//! - Project: `.berth/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! Toolchain overrides are stored separately:
//! - Global: `~/.berth/toolchain.toml`
//! - Project: `.berth/toolchain.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default time allowed to establish a connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Berth configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network settings
    pub net: NetConfig,

    /// Archive extraction settings
    pub unpack: UnpackConfig,

    /// Compiler probe settings
    pub probe: ProbeConfig,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NetConfig {
    /// Connect timeout in seconds
    pub connect_timeout: Option<u64>,

    /// Limit on a whole request, body included, in seconds (default: none)
    pub timeout: Option<u64>,

    /// User-Agent header sent with downloads
    pub user_agent: Option<String>,

    /// Offline mode (never download, use what is on disk)
    pub offline: bool,
}

impl NetConfig {
    /// Effective connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    /// Total request timeout, body included. Unset or `0` means no limit.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|&secs| secs > 0).map(Duration::from_secs)
    }

    /// Effective User-Agent.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("berth/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Archive extraction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UnpackConfig {
    /// Show the extraction tool's own output (default: false)
    pub show_output: Option<bool>,

    /// Refuse to extract zero-byte archives (default: true)
    pub stop_on_empty_file: Option<bool>,
}

impl UnpackConfig {
    pub fn show_output(&self) -> bool {
        self.show_output.unwrap_or(false)
    }

    pub fn stop_on_empty_file(&self) -> bool {
        self.stop_on_empty_file.unwrap_or(true)
    }
}

/// Compiler probe configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// Skip the GCC strict-mode header check after a C++ standard probe
    pub skip_gcc_advisory: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.net.connect_timeout.is_some() {
            self.net.connect_timeout = other.net.connect_timeout;
        }
        if other.net.timeout.is_some() {
            self.net.timeout = other.net.timeout;
        }
        if other.net.user_agent.is_some() {
            self.net.user_agent = other.net.user_agent;
        }
        if other.net.offline {
            self.net.offline = true;
        }

        if other.unpack.show_output.is_some() {
            self.unpack.show_output = other.unpack.show_output;
        }
        if other.unpack.stop_on_empty_file.is_some() {
            self.unpack.stop_on_empty_file = other.unpack.stop_on_empty_file;
        }

        if other.probe.skip_gcc_advisory {
            self.probe.skip_gcc_advisory = true;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.berth/config.toml)
/// 2. Global config (~/.berth/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Toolchain configuration for compiler overrides.
///
/// This is stored in a separate file (`toolchain.toml`) from the main config
/// to allow easy toolchain switching without modifying other settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,

    /// Initial C compiler flags
    pub cflags: Vec<String>,

    /// Initial C++ compiler flags
    pub cxxflags: Vec<String>,

    /// Initial linker flags
    pub ldflags: Vec<String>,
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load toolchain config from {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Check if a compiler is pinned by the config.
    pub fn has_compiler_override(&self) -> bool {
        self.toolchain.cc.is_some() || self.toolchain.cxx.is_some()
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainConfig) {
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }
        if !other.toolchain.cxxflags.is_empty() {
            self.toolchain.cxxflags = other.toolchain.cxxflags;
        }
        if !other.toolchain.ldflags.is_empty() {
            self.toolchain.ldflags = other.toolchain.ldflags;
        }
    }
}

/// Load merged toolchain configuration from global and project locations.
pub fn load_toolchain_config(global_path: &Path, project_path: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();

    if global_path.exists() {
        config.merge(ToolchainConfig::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(ToolchainConfig::load_or_default(project_path));
    }

    config
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}

/// Get the project config directory (.berth).
pub fn project_config_dir(project_root: &Path) -> PathBuf {
    project_root.join(".berth")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.unpack.show_output());
        assert!(config.unpack.stop_on_empty_file());
        assert_eq!(
            config.net.connect_timeout(),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
        );
        assert_eq!(config.net.timeout(), None);
        assert!(config.net.user_agent().starts_with("berth/"));
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[net]
connect-timeout = 5
timeout = 3600
user-agent = "ci-bootstrap"

[unpack]
show-output = true
stop-on-empty-file = false
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.net.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.net.timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.net.user_agent(), "ci-bootstrap");
        assert!(config.unpack.show_output());
        assert!(!config.unpack.stop_on_empty_file());
    }

    #[test]
    fn test_project_config_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(&global, "[net]\ntimeout = 10\nuser-agent = \"global\"\n").unwrap();
        std::fs::write(&project, "[net]\ntimeout = 99\n").unwrap();

        let config = load_config(&global, &project);
        assert_eq!(config.net.timeout, Some(99));
        assert_eq!(config.net.user_agent.as_deref(), Some("global"));
    }

    #[test]
    fn test_zero_timeout_means_unlimited() {
        let config: Config = toml::from_str("[net]\ntimeout = 0\n").unwrap();
        assert_eq!(config.net.timeout(), None);
        assert_eq!(
            config.net.connect_timeout(),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_toolchain_config_merge() {
        let mut base = ToolchainConfig::default();
        base.toolchain.cc = Some(PathBuf::from("/usr/bin/gcc"));
        base.toolchain.cflags = vec!["-O2".to_string()];

        let mut project = ToolchainConfig::default();
        project.toolchain.cc = Some(PathBuf::from("/opt/clang/bin/clang"));

        base.merge(project);

        assert_eq!(base.toolchain.cc, Some(PathBuf::from("/opt/clang/bin/clang")));
        assert_eq!(base.toolchain.cflags, vec!["-O2".to_string()]);
        assert!(base.has_compiler_override());
    }
}
