//! Configuration management.
//!
//! flowgate configuration can come from:
//! - Environment variables (FLOWGATE_*)
//! - Config file (~/.config/flowgate/config.toml)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::ExecutorConfig;

/// flowgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote n8n connection
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Execution engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Remote n8n connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the n8n instance
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as X-N8N-API-KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5678".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Engine settings as stored in the config file (durations in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,

    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_seconds: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    #[serde(default = "default_true")]
    pub enable_monitoring: bool,

    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_seconds: u64,

    #[serde(default = "default_cleanup_after")]
    pub cleanup_completed_after_seconds: u64,

    #[serde(default = "default_max_history")]
    pub max_execution_history: usize,

    #[serde(default)]
    pub cancel_on_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: default_max_concurrent(),
            execution_timeout_seconds: default_execution_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay(),
            poll_interval_seconds: default_poll_interval(),
            enable_monitoring: true,
            monitor_interval_seconds: default_monitor_interval(),
            cleanup_completed_after_seconds: default_cleanup_after(),
            max_execution_history: default_max_history(),
            cancel_on_timeout: false,
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}

fn default_execution_timeout() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    2
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_cleanup_after() -> u64 {
    3600
}

fn default_max_history() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Convert file-level seconds into an [`ExecutorConfig`].
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_executions: self.max_concurrent_executions.max(1),
            execution_timeout: Duration::from_secs(self.execution_timeout_seconds.max(1)),
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_seconds),
            poll_interval: Duration::from_secs(self.poll_interval_seconds.max(1)),
            enable_monitoring: self.enable_monitoring,
            monitor_interval: Duration::from_secs(self.monitor_interval_seconds.max(1)),
            cleanup_completed_after: Duration::from_secs(self.cleanup_completed_after_seconds),
            max_execution_history: self.max_execution_history.max(1),
            cancel_on_timeout: self.cancel_on_timeout,
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Load configuration from an explicit file, then apply env overrides.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Invalid config file: {}", e)))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("flowgate"))
            .unwrap_or_else(|| PathBuf::from(".flowgate"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLOWGATE_N8N_URL") {
            self.remote.base_url = url;
        }
        if let Ok(key) = std::env::var("FLOWGATE_N8N_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Ok(raw) = std::env::var("FLOWGATE_MAX_CONCURRENT_EXECUTIONS") {
            if let Ok(parsed) = raw.parse::<usize>() {
                self.engine.max_concurrent_executions = parsed;
            }
        }
        if let Ok(raw) = std::env::var("FLOWGATE_EXECUTION_TIMEOUT_SECONDS") {
            if let Ok(parsed) = raw.parse::<u64>() {
                self.engine.execution_timeout_seconds = parsed;
            }
        }
        if let Ok(raw) = std::env::var("FLOWGATE_RETRY_ATTEMPTS") {
            if let Ok(parsed) = raw.parse::<u32>() {
                self.engine.retry_attempts = parsed;
            }
        }
        if let Ok(raw) = std::env::var("FLOWGATE_RETRY_DELAY_SECONDS") {
            if let Ok(parsed) = raw.parse::<u64>() {
                self.engine.retry_delay_seconds = parsed;
            }
        }
        if let Ok(raw) = std::env::var("FLOWGATE_MONITOR_INTERVAL_SECONDS") {
            if let Ok(parsed) = raw.parse::<u64>() {
                self.engine.monitor_interval_seconds = parsed;
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<Config, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: Config) {
        *self = partial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.remote.base_url, "http://localhost:5678");
        assert_eq!(config.engine.max_concurrent_executions, 10);
        assert_eq!(config.engine.retry_attempts, 3);
        assert!(config.engine.enable_monitoring);
    }

    #[test]
    fn test_parse_partial_file() {
        let parsed: Config = toml::from_str(
            r#"
            [remote]
            base_url = "http://n8n.internal:5678"

            [engine]
            max_concurrent_executions = 4
            retry_delay_seconds = 1
            "#,
        )
        .unwrap();

        assert_eq!(parsed.remote.base_url, "http://n8n.internal:5678");
        assert_eq!(parsed.engine.max_concurrent_executions, 4);
        assert_eq!(parsed.engine.retry_delay_seconds, 1);
        // Unspecified fields keep their defaults
        assert_eq!(parsed.engine.execution_timeout_seconds, 300);
    }

    #[test]
    fn test_to_executor_config_clamps_zeroes() {
        let engine = EngineConfig {
            max_concurrent_executions: 0,
            poll_interval_seconds: 0,
            ..EngineConfig::default()
        };
        let config = engine.to_executor_config();
        assert_eq!(config.max_concurrent_executions, 1);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\nretry_attempts = 7\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.engine.retry_attempts, 7);
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [[[").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
