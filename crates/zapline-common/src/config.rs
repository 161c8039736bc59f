//! Configuration for Zapline

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Media signing configuration
    #[serde(default)]
    pub media: MediaConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// WhatsApp gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Default API key sent in the `apikey` header.
    /// Instances may carry their own key, which takes precedence.
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    30
}

/// Media signing service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base URL of the storage service that issues signed URLs
    #[serde(default = "default_media_url")]
    pub base_url: String,

    /// API key for the storage service
    #[serde(default)]
    pub api_key: String,

    /// Signed URL lifetime in seconds (clamped to at least one hour)
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_media_timeout")]
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: default_media_url(),
            api_key: String::new(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            timeout_secs: default_media_timeout(),
        }
    }
}

impl MediaConfig {
    /// Effective TTL. Gateways fetch media lazily, so links must stay
    /// valid for at least one hour.
    pub fn effective_ttl_secs(&self) -> u64 {
        self.signed_url_ttl_secs.max(3600)
    }
}

fn default_media_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

fn default_media_timeout() -> u64 {
    15
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum targets claimed per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Seconds between dispatch ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Claim lease lifetime; `sending` rows older than this are requeued
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_secs: u64,

    /// Seconds between stale-lease sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            lease_timeout_secs: default_lease_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_batch_size() -> i64 {
    20
}

fn default_poll_interval() -> u64 {
    60
}

fn default_lease_timeout() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/zapline/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}
