//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agentdeck/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agentdeck/` (~/.config/agentdeck/)
//! - Data: `$XDG_DATA_HOME/agentdeck/` (~/.local/share/agentdeck/)
//! - State/Logs: `$XDG_STATE_HOME/agentdeck/` (~/.local/state/agentdeck/)

use crate::error::{Error, Result};
use crate::merge::ArrayStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand a leading `~` against the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Scanner roots, exclusions and limits
    #[serde(default)]
    pub scan: ScanConfig,

    /// Settings merge behavior
    #[serde(default)]
    pub merge: MergeConfig,

    /// System detection rule overrides
    #[serde(default)]
    pub systems: SystemsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Deserialize)]
pub struct ScanConfig {
    /// Extra roots to scan in addition to the home directory
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Directory names never descended into (replaces the default set)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Maximum traversal depth below each root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Roots whose resources are shipped read-only
    #[serde(default)]
    pub builtin_roots: Vec<PathBuf>,

    /// Descend into symlinked directories such as a dotfiles-managed `~/.claude`
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: vec![],
            exclude: default_exclude(),
            max_depth: default_max_depth(),
            builtin_roots: vec![],
            follow_links: default_follow_links(),
        }
    }
}

impl ScanConfig {
    /// Configured roots with `~` expanded.
    pub fn expanded_roots(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|p| expand_tilde(p)).collect()
    }

    /// Configured builtin roots with `~` expanded.
    pub fn expanded_builtin_roots(&self) -> Vec<PathBuf> {
        self.builtin_roots.iter().map(|p| expand_tilde(p)).collect()
    }
}

/// Default directory names excluded from traversal.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".cache",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".gradle",
    ".idea",
    "Library",
    "System",
    "proc",
    "sys",
    "dev",
    ".Trash",
    // package and toolchain caches under home
    ".cargo",
    ".rustup",
    ".npm",
    ".nvm",
    ".pnpm-store",
    ".m2",
    "go",
];

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()
}

fn default_max_depth() -> usize {
    10
}

fn default_follow_links() -> bool {
    true
}

/// Settings merge configuration
#[derive(Debug, Deserialize, Default)]
pub struct MergeConfig {
    /// Default array strategy for effective settings
    #[serde(default)]
    pub array_strategy: ArrayStrategy,
}

/// System detection configuration
#[derive(Debug, Deserialize, Default)]
pub struct SystemsConfig {
    /// Replace the built-in rule table with this TOML file
    pub rules_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.scan.max_depth == 0 {
            return Err(Error::Config(
                "scan.max_depth must be at least 1".to_string(),
            ));
        }
        if self.scan.max_depth > 64 {
            return Err(Error::Config(
                "scan.max_depth must not exceed 64".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agentdeck/config.toml` (~/.config/agentdeck/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agentdeck").join("config.toml")
    }

    /// Returns the data directory path (for the change log database)
    ///
    /// `$XDG_DATA_HOME/agentdeck/` (~/.local/share/agentdeck/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("agentdeck")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agentdeck/` (~/.local/state/agentdeck/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agentdeck")
    }

    /// Returns the change log database path
    ///
    /// `$XDG_DATA_HOME/agentdeck/changes.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("changes.db")
    }
}
