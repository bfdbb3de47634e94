//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/herald/config.toml`
//!
//! Paths follow the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/herald/` (~/.config/herald/)
//! - State/Logs: `$XDG_STATE_HOME/herald/` (~/.local/state/herald/)
//!
//! ```toml
//! [client]
//! application_token = "your-application-token"
//! timeout_secs = 45
//!
//! [client.endpoint]
//! type = "tcp"
//! hostname = "application-srv.herald.tech"
//! port = 7005
//!
//! [identity]
//! device_name = "build-agent-3"
//! body_prefix = "[ci] "
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::{Error, Result};
use crate::transport::{Endpoint, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Service connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Overrides for the discovered host identity
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to reach the service
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Token issued for the sending application
    pub application_token: Option<String>,

    /// Service endpoint (defaults to production)
    #[serde(default)]
    pub endpoint: Endpoint,

    /// Connect and call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_token: None,
            endpoint: Endpoint::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl ClientConfig {
    /// Check if a client can be built from this config
    pub fn is_ready(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.application_token.as_deref() {
            None | Some("") => {
                return Err(Error::Config(
                    "client.application_token is required".to_string(),
                ))
            }
            Some(_) => {}
        }

        match &self.endpoint {
            Endpoint::Tcp { hostname, port } => {
                if hostname.is_empty() {
                    return Err(Error::Config(
                        "client.endpoint.hostname cannot be empty".to_string(),
                    ));
                }
                if *port == 0 {
                    return Err(Error::Config(
                        "client.endpoint.port must be between 1 and 65535".to_string(),
                    ));
                }
            }
            Endpoint::HttpThrift { url } | Endpoint::HttpRest { url } => {
                if url.is_empty() {
                    return Err(Error::Config(
                        "client.endpoint.url cannot be empty".to_string(),
                    ));
                }
            }
        }

        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "client.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identity overrides; unset fields keep the discovered value
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    pub hostname: Option<String>,
    pub device_name: Option<String>,
    pub body_prefix: Option<String>,
    pub body_suffix: Option<String>,
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

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/herald/config.toml` (~/.config/herald/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("herald").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/herald/` (~/.local/state/herald/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("herald")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/herald/herald.log` (~/.local/state/herald/herald.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("herald.log")
    }
}
