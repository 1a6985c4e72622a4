//! Runtime configuration, loaded from `<data-dir>/config.json` when present.
//!
//! Every field has a default so a missing or partial config file always
//! yields a usable configuration.

use crate::session_guard::GuardConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    /// Optional override for where records are stored.
    /// Defaults to `~/.avs-attendance/`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Idle-timeout settings for the interactive shell.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Total idle budget before forced logout. Default: 30 minutes.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long before expiry the warning appears. Default: 5 minutes.
    #[serde(default = "default_warning_secs")]
    pub warning_secs: u64,
    /// Countdown update granularity. Default: 1 second.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

fn default_warning_secs() -> u64 {
    5 * 60
}

fn default_tick_secs() -> u64 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            warning_secs: default_warning_secs(),
            tick_secs: default_tick_secs(),
        }
    }
}

impl SessionConfig {
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            session_timeout: Duration::from_secs(self.timeout_secs),
            warning_lead: Duration::from_secs(self.warning_secs),
            tick_interval: Duration::from_secs(self.tick_secs),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `path`, falling back to defaults if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the session settings are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .session
            .guard_config()
            .validate()
            .with_context(|| format!("Invalid session settings in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(&dir.path().join("config.json")).expect("load");
        assert_eq!(config.session.timeout_secs, 30 * 60);
        assert_eq!(config.session.warning_secs, 5 * 60);
        assert_eq!(config.session.tick_secs, 1);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"session": {"timeout_secs": 600}}"#).expect("write");

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.session.timeout_secs, 600);
        assert_eq!(config.session.warning_secs, 5 * 60);
    }

    #[test]
    fn rejects_warning_longer_than_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"session": {"timeout_secs": 60, "warning_secs": 120}}"#,
        )
        .expect("write");

        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").expect("write");
        assert!(AppConfig::load(&path).is_err());
    }
}
