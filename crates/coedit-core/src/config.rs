//! Configuration loading
//!
//! # Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Global config: `<config dir>/coedit/config.toml`
//! 3. Project config: `.coedit/config.toml`
//! 4. Environment variables: `COEDIT_*`
//! 5. CLI flags (applied by the binary)
//!
//! # Example Config
//!
//! ```toml
//! heartbeat_interval_secs = 30
//! poll_interval_secs = 30
//! stale_threshold_secs = 300
//! database_path = "/var/lib/coedit/sessions.db"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default heartbeat cadence.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
/// Default conflict poll cadence.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// Default age after which a silent session stops counting as active.
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 300;

/// Effective configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoeditConfig {
    pub heartbeat_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub database_path: String,
    pub user_agent: String,
}

/// A config file: every key optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub heartbeat_interval_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub stale_threshold_secs: Option<u64>,
    pub database_path: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for CoeditConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
            database_path: default_database_path(),
            user_agent: default_user_agent(),
        }
    }
}

impl CoeditConfig {
    /// Overlay a layer; keys present in `layer` win.
    #[must_use]
    pub fn merge(self, layer: ConfigLayer) -> Self {
        Self {
            heartbeat_interval_secs: layer
                .heartbeat_interval_secs
                .unwrap_or(self.heartbeat_interval_secs),
            poll_interval_secs: layer.poll_interval_secs.unwrap_or(self.poll_interval_secs),
            stale_threshold_secs: layer
                .stale_threshold_secs
                .unwrap_or(self.stale_threshold_secs),
            database_path: layer.database_path.unwrap_or(self.database_path),
            user_agent: layer.user_agent.unwrap_or(self.user_agent),
        }
    }

    /// Apply `COEDIT_*` environment overrides.
    pub fn apply_env_vars(self) -> Result<Self> {
        let layer = ConfigLayer {
            heartbeat_interval_secs: env_u64("COEDIT_HEARTBEAT_INTERVAL_SECS")?,
            poll_interval_secs: env_u64("COEDIT_POLL_INTERVAL_SECS")?,
            stale_threshold_secs: env_u64("COEDIT_STALE_THRESHOLD_SECS")?,
            database_path: std::env::var("COEDIT_DATABASE").ok(),
            user_agent: std::env::var("COEDIT_USER_AGENT").ok(),
        };
        Ok(self.merge(layer))
    }

    /// Check interval relationships.
    ///
    /// Heartbeat and poll intervals must be non-zero and strictly shorter
    /// than the stale threshold, or a live session would read as stale.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_interval_secs must be greater than 0".into(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.heartbeat_interval_secs >= self.stale_threshold_secs {
            return Err(Error::InvalidConfig(format!(
                "heartbeat_interval_secs ({}) must be less than stale_threshold_secs ({})",
                self.heartbeat_interval_secs, self.stale_threshold_secs
            )));
        }
        if self.poll_interval_secs >= self.stale_threshold_secs {
            return Err(Error::InvalidConfig(format!(
                "poll_interval_secs ({}) must be less than stale_threshold_secs ({})",
                self.poll_interval_secs, self.stale_threshold_secs
            )));
        }
        if self.database_path.trim().is_empty() {
            return Err(Error::InvalidConfig("database_path cannot be empty".into()));
        }
        Ok(())
    }

    /// Heartbeat cadence.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Conflict poll cadence.
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Staleness threshold.
    #[must_use]
    pub fn stale_threshold(&self) -> chrono::Duration {
        i64::try_from(self.stale_threshold_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to render config: {e}")))
    }
}

/// Load configuration from all sources.
pub fn load_config() -> Result<CoeditConfig> {
    load_config_with(ConfigLayer::default())
}

/// Load configuration from all sources, with `overrides` (command-line
/// flags) applied last, before validation.
pub fn load_config_with(overrides: ConfigLayer) -> Result<CoeditConfig> {
    let project = project_config_path()?;
    load_layers(global_config_path().as_deref(), Some(&project), overrides)
}

/// Load configuration from explicit file locations, then env.
///
/// Missing files are skipped.
pub fn load_config_from(global: Option<&Path>, project: Option<&Path>) -> Result<CoeditConfig> {
    load_layers(global, project, ConfigLayer::default())
}

fn load_layers(
    global: Option<&Path>,
    project: Option<&Path>,
    overrides: ConfigLayer,
) -> Result<CoeditConfig> {
    let config = [global, project]
        .into_iter()
        .flatten()
        .filter(|path| path.exists())
        .try_fold(CoeditConfig::default(), |config, path| {
            load_toml_file(path).map(|layer| config.merge(layer))
        })?;

    let config = config.apply_env_vars()?.merge(overrides);
    config.validate()?;
    Ok(config)
}

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "coedit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path to the project config file.
pub fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join(".coedit/config.toml"))
        .map_err(|e| Error::IoError(format!("Failed to get current directory: {e}")))
}

/// Parse one config file.
pub fn load_toml_file(path: &Path) -> Result<ConfigLayer> {
    if path.is_dir() {
        return Err(Error::IoError(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::ParseError(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    std::env::var(key)
        .ok()
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("Invalid {key} value '{value}': {e}")))
        })
        .transpose()
}

fn default_database_path() -> String {
    directories::ProjectDirs::from("", "", "coedit")
        .map(|dirs| dirs.data_dir().join("sessions.db"))
        .unwrap_or_else(|| PathBuf::from(".coedit/sessions.db"))
        .display()
        .to_string()
}

fn default_user_agent() -> String {
    format!(
        "coedit/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for key in [
            "COEDIT_HEARTBEAT_INTERVAL_SECS",
            "COEDIT_POLL_INTERVAL_SECS",
            "COEDIT_STALE_THRESHOLD_SECS",
            "COEDIT_DATABASE",
            "COEDIT_USER_AGENT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CoeditConfig::default();
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.stale_threshold_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_layer_overrides_only_present_keys() {
        let config = CoeditConfig::default().merge(ConfigLayer {
            poll_interval_secs: Some(10),
            ..ConfigLayer::default()
        });
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.heartbeat_interval_secs, 30);
    }

    #[test]
    fn test_validate_rejects_heartbeat_at_threshold() {
        let config = CoeditConfig {
            heartbeat_interval_secs: 300,
            ..CoeditConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_poll() {
        let config = CoeditConfig {
            poll_interval_secs: 0,
            ..CoeditConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_project_overrides_global() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        std::fs::write(&global, "poll_interval_secs = 20\nheartbeat_interval_secs = 15\n").unwrap();
        std::fs::write(&project, "poll_interval_secs = 10\n").unwrap();

        let config = load_config_from(Some(&global), Some(&project)).unwrap();
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.heartbeat_interval_secs, 15);
    }

    #[test]
    #[serial]
    fn test_missing_files_give_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config =
            load_config_from(Some(&dir.path().join("nope.toml")), None).unwrap();
        assert_eq!(config.stale_threshold_secs, DEFAULT_STALE_THRESHOLD_SECS);
    }

    #[test]
    #[serial]
    fn test_env_overrides_files() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.toml");
        std::fs::write(&project, "database_path = \"/tmp/a.db\"\n").unwrap();
        std::env::set_var("COEDIT_DATABASE", "/tmp/b.db");
        std::env::set_var("COEDIT_STALE_THRESHOLD_SECS", "600");

        let config = load_config_from(None, Some(&project));
        clear_env();
        let config = config.unwrap();
        assert_eq!(config.database_path, "/tmp/b.db");
        assert_eq!(config.stale_threshold_secs, 600);
    }

    #[test]
    #[serial]
    fn test_override_layer_replaces_invalid_env() {
        clear_env();
        std::env::set_var("COEDIT_DATABASE", "");
        let overrides = ConfigLayer {
            database_path: Some("/tmp/flag.db".to_string()),
            ..ConfigLayer::default()
        };

        let config = load_layers(None, None, overrides);
        let without_flag = load_config_from(None, None);
        clear_env();
        assert_eq!(config.unwrap().database_path, "/tmp/flag.db");
        assert!(without_flag.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_env_number_rejected() {
        clear_env();
        std::env::set_var("COEDIT_POLL_INTERVAL_SECS", "soon");
        let result = CoeditConfig::default().apply_env_vars();
        clear_env();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    #[serial]
    fn test_malformed_toml_is_parse_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.toml");
        std::fs::write(&project, "poll_interval_secs = [").unwrap();
        let result = load_config_from(None, Some(&project));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    #[serial]
    fn test_unknown_key_rejected() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.toml");
        std::fs::write(&project, "heartbeat = 5\n").unwrap();
        assert!(load_config_from(None, Some(&project)).is_err());
    }

    #[test]
    fn test_directory_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_toml_file(dir.path()),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrips() {
        let config = CoeditConfig::default();
        let rendered = config.to_toml().unwrap();
        let layer: ConfigLayer = toml::from_str(&rendered).unwrap();
        assert_eq!(CoeditConfig::default().merge(layer), config);
    }
}
