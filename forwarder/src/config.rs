//! rdpfwd configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/rdpfwd/config.toml";
const CONFIG_ENV: &str = "RDPFWD_CONFIG";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct RdpfwdConfig {
    #[serde(default)]
    pub firewall: FirewallConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// File the settings came from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct FirewallConfig {
    /// firewalld control front end
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_zone")]
    pub zone: String,
    /// Internal port every new forward points at (RDP)
    #[serde(default = "default_target_port")]
    pub target_port: u16,
    /// Apply changes to the permanent configuration instead of runtime
    #[serde(default)]
    pub permanent: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            zone: default_zone(),
            target_port: default_target_port(),
            permanent: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_command() -> String { "firewall-cmd".into() }
fn default_zone() -> String { "external".into() }
fn default_target_port() -> u16 { 3389 }
fn default_log_level() -> String { "warn".into() }

/// Resolve the config path: explicit flag, then `$RDPFWD_CONFIG`, then /etc.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration, falling back to defaults when the file is absent.
///
/// Runs before logging is up, so a defaults fallback is reported through
/// `source` rather than logged here.
pub fn load_config(explicit: Option<&Path>) -> Result<RdpfwdConfig> {
    load_config_at(&config_path(explicit), explicit.is_some())
}

/// Load from `path`; a missing file is an error only when `required`.
pub fn load_config_at(path: &Path, required: bool) -> Result<RdpfwdConfig> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let mut config: RdpfwdConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    } else if required {
        anyhow::bail!("Config file not found at {}", path.display());
    } else {
        Ok(RdpfwdConfig::default())
    }
}
