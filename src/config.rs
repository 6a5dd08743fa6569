//! Application configuration
//!
//! Stored as TOML. Every section and field has a default, so a partial (or
//! missing) file still yields a usable configuration. The file lives at
//! `$MODEPILOT_CONFIG`, or `<config dir>/modepilot/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::{AttentionSettings, ConfigurationHandle};
use crate::mode::Mode;
use crate::scheduler::Tick;

pub const CONFIG_ENV: &str = "MODEPILOT_CONFIG";
/// Overrides `logging.level` when set to a level name
pub const LOG_LEVEL_ENV: &str = "RUST_LOG";
const CONFIG_DIR: &str = "modepilot";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub runtime: RuntimeConfig,
    pub attention: AttentionSettings,
    pub notification: NotificationConfig,
    pub platform: PlatformConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet frames required before a requested mode recompute runs
    pub debounce_ticks: Tick,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { debounce_ticks: 10 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub frame_interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            poll_interval_ms: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub duration_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformBackend {
    #[default]
    Gilrs,
    Simulated,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    pub backend: PlatformBackend,
    /// Mode identifier → configuration handle
    pub configurations: BTreeMap<String, u64>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: PlatformBackend::default(),
            configurations: Mode::ALL
                .iter()
                .zip(1u64..)
                .map(|(mode, id)| (mode.id().to_string(), id))
                .collect(),
        }
    }
}

impl PlatformConfig {
    pub fn configuration_handles(&self) -> HashMap<String, ConfigurationHandle> {
        self.configurations
            .iter()
            .map(|(id, handle)| (id.clone(), ConfigurationHandle(*handle)))
            .collect()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> tracing::Level {
        match self.level.parse::<tracing::Level>() {
            Ok(level) => level,
            Err(_) => {
                warn!("Unknown log level '{}', using info", self.level);
                tracing::Level::INFO
            }
        }
    }

    /// `override_level` (the value of [`LOG_LEVEL_ENV`]) wins when it names a level.
    pub fn effective_level(&self, override_level: Option<&str>) -> tracing::Level {
        match override_level.map(|value| value.trim().parse::<tracing::Level>()) {
            Some(Ok(level)) => level,
            Some(Err(_)) => {
                warn!(
                    "Ignoring {}={:?}, not a level name",
                    LOG_LEVEL_ENV,
                    override_level.unwrap_or_default()
                );
                self.max_level()
            }
            None => self.max_level(),
        }
    }
}

/// What a controller session needs from the configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub debounce_ticks: Tick,
    pub attention: AttentionSettings,
    pub notification_duration: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Config::default().session_settings()
    }
}

impl Config {
    /// `$MODEPILOT_CONFIG` if set, otherwise the per-user config directory.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content, path)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(io_error)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    /// Loads `path`, writing the default configuration there first if it is missing.
    pub async fn ensure_default(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            info!("Creating default configuration at {}", path.display());
            let config = Config::default();
            config.save(path).await?;
            return Ok(config);
        }
        Self::load(path).await
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.debounce_ticks == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.debounce_ticks must be at least 1".to_string(),
            ));
        }
        if self.runtime.frame_interval_ms == 0 || self.runtime.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "runtime intervals must be greater than zero".to_string(),
            ));
        }
        if self.runtime.frame_interval_ms > self.runtime.poll_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "runtime.frame_interval_ms ({}) exceeds runtime.poll_interval_ms ({})",
                self.runtime.frame_interval_ms, self.runtime.poll_interval_ms
            )));
        }
        for mode in Mode::ALL {
            if !self.platform.configurations.contains_key(mode.id()) {
                warn!("No configuration handle configured for {}", mode.id());
            }
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            debounce_ticks: self.scheduler.debounce_ticks,
            attention: self.attention.clone(),
            notification_duration: Duration::from_secs(self.notification.duration_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.scheduler.debounce_ticks, 10);
        assert_eq!(config.runtime.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.attention.cycles, 4);
        assert_eq!(config.platform.backend, PlatformBackend::Gilrs);
        assert_eq!(config.platform.configurations.len(), 6);
        assert_eq!(config.platform.configurations.get("EVAControls"), Some(&5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let content = r#"
            [scheduler]
            debounce_ticks = 4

            [platform]
            backend = "simulated"
        "#;

        let config = Config::from_toml(content, Path::new("test.toml")).expect("valid config");

        assert_eq!(config.scheduler.debounce_ticks, 4);
        assert_eq!(config.platform.backend, PlatformBackend::Simulated);
        assert_eq!(config.runtime, RuntimeConfig::default());
        assert_eq!(config.platform.configurations, PlatformConfig::default().configurations);
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let result = Config::from_toml("[scheduler]\ndebounce_ticks = 0\n", Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_frame_slower_than_poll() {
        let content = "[runtime]\nframe_interval_ms = 2000\npoll_interval_ms = 1000\n";
        let result = Config::from_toml(content, Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_names_file() {
        let result = Config::from_toml("[scheduler\n", Path::new("broken.toml"));
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, PathBuf::from("broken.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
        };
        assert_eq!(logging.max_level(), tracing::Level::INFO);
        let logging = LoggingConfig {
            level: "debug".to_string(),
        };
        assert_eq!(logging.max_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_log_level_override_wins_over_config() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
        };

        assert_eq!(logging.effective_level(None), tracing::Level::WARN);
        assert_eq!(logging.effective_level(Some("trace")), tracing::Level::TRACE);
        assert_eq!(logging.effective_level(Some("DEBUG")), tracing::Level::DEBUG);
        assert_eq!(
            logging.effective_level(Some("modepilot=debug")),
            tracing::Level::WARN
        );
    }

    #[tokio::test]
    async fn test_ensure_default_creates_then_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::ensure_default(&path).await.expect("create default");
        assert!(path.exists());

        let reloaded = Config::ensure_default(&path).await.expect("reload");
        assert_eq!(created, reloaded);
    }
}
