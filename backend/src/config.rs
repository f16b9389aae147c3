//! Configuration management for the Optica inventory ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with OPTICA_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::services::retry::RetryConfig;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Ledger engine tuning
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify HS256 tokens issued by the auth service
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Extra attempts for a transaction that hit a transient storage fault
    pub retry_max_attempts: u32,

    /// Backoff before the first retry, in milliseconds
    pub retry_initial_delay_ms: u64,

    /// Backoff ceiling, in milliseconds
    pub retry_max_delay_ms: u64,

    /// Alerts returned per page when the caller gives no limit
    pub alert_page_size: u32,

    /// Upper bound on a caller-supplied alert page size
    pub alert_page_size_max: u32,
}

impl LedgerConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.retry_max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    /// Clamp a requested page size into the configured bounds
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.alert_page_size)
            .clamp(1, self.alert_page_size_max.max(1))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_initial_delay_ms: 20,
            retry_max_delay_ms: 1000,
            alert_page_size: 50,
            alert_page_size_max: 500,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("OPTICA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("ledger.retry_max_attempts", 3)?
            .set_default("ledger.retry_initial_delay_ms", 20)?
            .set_default("ledger.retry_max_delay_ms", 1000)?
            .set_default("ledger.alert_page_size", 50)?
            .set_default("ledger.alert_page_size_max", 500)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (OPTICA_ prefix)
            .add_source(
                Environment::with_prefix("OPTICA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_clamped() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.page_size(None), 50);
        assert_eq!(ledger.page_size(Some(0)), 1);
        assert_eq!(ledger.page_size(Some(10_000)), 500);
        assert_eq!(ledger.page_size(Some(25)), 25);
    }
}
