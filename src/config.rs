//! Configuration management for wipdbg

use crate::protocol::profile::ProfileSelection;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Debugger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote-inspection HTTP endpoint of the browser
    pub endpoint: String,

    /// Backend profile ("auto", "dev" or "1.0")
    pub profile: ProfileSelection,

    /// Timeout for establishing the transport, in milliseconds
    pub connect_timeout_ms: u64,

    /// Buffer size of the session event broadcast channel
    pub event_capacity: usize,

    /// Request the innermost frame's scope variables as soon as a pause arrives
    pub prefetch_top_frame: bool,

    /// Element count above which array previews are considered truncated
    pub array_page_size: usize,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9222".to_string(),
            profile: ProfileSelection::Auto,
            connect_timeout_ms: 10000,
            event_capacity: 256,
            prefetch_top_frame: true,
            array_page_size: 100,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = env::var("WIPDBG_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(profile) = env::var("WIPDBG_PROFILE") {
            config.profile = profile
                .parse()
                .map_err(|_| Error::configuration("Invalid WIPDBG_PROFILE"))?;
        }

        if let Ok(timeout) = env::var("WIPDBG_CONNECT_TIMEOUT") {
            config.connect_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid WIPDBG_CONNECT_TIMEOUT"))?;
        }

        if let Ok(capacity) = env::var("WIPDBG_EVENT_CAPACITY") {
            config.event_capacity = capacity
                .parse()
                .map_err(|_| Error::configuration("Invalid WIPDBG_EVENT_CAPACITY"))?;
        }

        if let Ok(prefetch) = env::var("WIPDBG_PREFETCH") {
            config.prefetch_top_frame = prefetch
                .parse()
                .map_err(|_| Error::configuration("Invalid WIPDBG_PREFETCH"))?;
        }

        if let Ok(page_size) = env::var("WIPDBG_ARRAY_PAGE_SIZE") {
            config.array_page_size = page_size
                .parse()
                .map_err(|_| Error::configuration("Invalid WIPDBG_ARRAY_PAGE_SIZE"))?;
        }

        if let Ok(log_level) = env::var("WIPDBG_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        if config.event_capacity == 0 {
            return Err(Error::configuration("event_capacity must be positive"));
        }

        Ok(config)
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.connect_timeout_ms)
    }
}
