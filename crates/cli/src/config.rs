//! Configuration loading from sierra-rules.toml.

use std::path::{Path, PathBuf};

use rules::Ruleset;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Audit trail settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Collection rules. Empty means the built-in rules apply.
    #[serde(flatten)]
    pub rules: Ruleset,
}

/// Audit trail configuration.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Record every evaluated request.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Database location; defaults to the user data directory.
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.rules.collections.is_empty() {
            config.rules = Ruleset::sierra();
        }
        config.rules.validate()?;
        Ok(config)
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            audit: AuditConfig::default(),
            rules: Ruleset::sierra(),
        }
    }

    /// Resolve where the audit database lives.
    pub fn audit_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.audit.path {
            Some(path) => Ok(path.clone()),
            None => dirs_data_dir()
                .map(|dir| dir.join("audit.db"))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/sierra-rules"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("sierra-rules"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("sierra-rules"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error(transparent)]
    Rules(#[from] rules::Error),

    #[error("no data directory available: set audit.path")]
    NoDataDir,
}
