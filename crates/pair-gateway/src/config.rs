//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionTiming;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// WhatsApp gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Remote storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Branding shown in delivered messages
    #[serde(default)]
    pub branding: BrandingConfig,

    /// Pairing session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Process-supervisor restart configuration
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// WhatsApp gateway REST API URL
    #[serde(default = "default_gateway_api_url")]
    pub api_url: String,

    /// Poll interval for session events
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage service API URL
    #[serde(default = "default_storage_api_url")]
    pub api_url: String,

    /// Storage account email
    #[serde(default)]
    pub email: String,

    /// Storage account password
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandingConfig {
    /// Display name embedded in the delivery caption
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Image attached to the delivery message
    #[serde(default = "default_image_url")]
    pub image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Base directory for per-session credential state
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,

    /// Settle time between connecting and requesting a pairing code
    #[serde(default = "default_pair_delay", with = "humantime_serde")]
    pub pair_delay: Duration,

    /// Grace period for trailing credential updates before upload
    #[serde(default = "default_flush_grace", with = "humantime_serde")]
    pub flush_grace: Duration,

    /// Pause between flagging cleanup and removing local state
    #[serde(default = "default_cleanup_delay", with = "humantime_serde")]
    pub cleanup_delay: Duration,

    /// Wait after a transient disconnect before handling further events
    #[serde(default = "default_reconnect_backoff", with = "humantime_serde")]
    pub reconnect_backoff: Duration,
}

impl SessionConfig {
    /// The delay set consumed by the pairing controller.
    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            pair_delay: self.pair_delay,
            flush_grace: self.flush_grace,
            cleanup_delay: self.cleanup_delay,
            reconnect_backoff: self.reconnect_backoff,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorConfig {
    /// Process restarted when credential delivery fails after linking
    #[serde(default)]
    pub delivery_process: Option<String>,

    /// Process restarted when session setup fails before a code is issued
    #[serde(default)]
    pub fallback_process: Option<String>,

    /// Process restarted by the last-resort fault handler
    #[serde(default)]
    pub guard_process: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: default_gateway_api_url(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_url: default_storage_api_url(),
            email: String::new(),
            password: String::new(),
        }
    }
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            image_url: default_image_url(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
            pair_delay: default_pair_delay(),
            flush_grace: default_flush_grace(),
            cleanup_delay: default_cleanup_delay(),
            reconnect_backoff: default_reconnect_backoff(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

fn default_gateway_api_url() -> String {
    "http://wa-gateway:8080".into()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_storage_api_url() -> String {
    "http://mega-api:8090".into()
}

fn default_bot_name() -> String {
    "WA PAIR".into()
}

fn default_image_url() -> String {
    "https://raw.githubusercontent.com/wapair/pair-gateway/main/assets/banner.jpg".into()
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("./sessions")
}

fn default_pair_delay() -> Duration {
    Duration::from_millis(1500)
}

fn default_flush_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_cleanup_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_reconnect_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_global_rpm() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Note: try_parsing(true) would parse a digits-only phone
                    // number as an integer. Keep strings as strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.session.pair_delay, Duration::from_millis(1500));
        assert_eq!(config.session.reconnect_backoff, Duration::from_secs(10));
        assert_eq!(config.session.cleanup_delay, Duration::from_millis(100));
        assert!(config.supervisor.delivery_process.is_none());
    }

    #[test]
    fn test_timing_mirrors_session_config() {
        let session = SessionConfig::default();
        let timing = session.timing();
        assert_eq!(timing.flush_grace, session.flush_grace);
        assert_eq!(timing.pair_delay, session.pair_delay);
    }
}
