//! Configuration management for adminctl.
//!
//! Loads settings from `<config dir>/adminctl/config.toml` or uses defaults.
//! Every field has a default, so a partial file is fine.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory under the user config dir
pub const APP_DIR: &str = "adminctl";

/// Config file name
pub const CONFIG_FILE: &str = "config.toml";

/// Which backend implementation serves the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Live,
    Simulated,
}

/// Live backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,

    /// Base URL of the device, e.g. `https://device.local`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Devices serve self-signed certificates
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_base_url() -> String {
    "https://localhost".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Simulated backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Delay before every simulated reply
    #[serde(default = "default_latency")]
    pub latency_ms: u64,
}

fn default_latency() -> u64 {
    2000
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency(),
        }
    }
}

impl SimulatedConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Job polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Pause between two job status polls
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// Polls before a job is declared stalled
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    150 // 5 minutes at the default interval
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Full console configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub simulated: SimulatedConfig,

    #[serde(default)]
    pub polling: PollingConfig,
}

impl AdminConfig {
    /// Default config location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load config from the default location, or return defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load config from a path; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: AdminConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the console misbehave
    ///
    /// `backend.base_url` is only checked in live mode; the simulated device
    /// never reads it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.mode == BackendMode::Live
            && !(self.backend.base_url.starts_with("http://")
                || self.backend.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must start with http:// or https://, got '{}'",
                self.backend.base_url
            )));
        }
        if self.polling.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert_eq!(config.backend.mode, BackendMode::Live);
        assert_eq!(config.simulated.latency(), Duration::from_millis(2000));
        assert_eq!(config.polling.interval(), Duration::from_secs(2));
        assert_eq!(config.polling.max_attempts, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[backend]
mode = "simulated"
base_url = "https://device.local"

[polling]
max_attempts = 10
"#;
        let config: AdminConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.mode, BackendMode::Simulated);
        assert_eq!(config.backend.base_url, "https://device.local");
        assert_eq!(config.polling.max_attempts, 10);
        // Defaults for missing fields
        assert_eq!(config.polling.interval_ms, 2000);
        assert_eq!(config.backend.request_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AdminConfig::default();
        config.backend.base_url = "device.local".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_skips_url_in_simulated_mode() {
        let mut config = AdminConfig::default();
        config.backend.base_url = "device.local".to_string();
        config.backend.mode = BackendMode::Simulated;
        assert!(config.validate().is_ok());

        config.polling.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AdminConfig::default();
        config.polling.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
