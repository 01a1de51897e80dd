//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SHOPKART_DATA_DIR` - Directory holding the flat and indexed data (default: ./shopkart-data)
//! - `SHOPKART_FLAT_QUOTA_BYTES` - Byte quota of the flat medium (default: 5242880)
//! - `SHOPKART_INDEXED_MAX_CONNECTIONS` - Connections per indexed database (default: 4)
//! - `SHOPKART_REFRESH_INTERVAL_SECS` - Period of view refresh loops (default: 5)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default flat medium quota: 5 MiB.
pub const DEFAULT_FLAT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

const DEFAULT_DATA_DIR: &str = "./shopkart-data";
const DEFAULT_MAX_CONNECTIONS: &str = "4";
const DEFAULT_REFRESH_SECS: &str = "5";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where the stores keep their data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Flat collections as `<key>.json` files under `flat/`, one `SQLite`
    /// database per entity type under `indexed/`.
    Directory(PathBuf),
    /// Everything in memory; lost when the handle is dropped.
    InMemory,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Data location.
    pub location: StoreLocation,
    /// Byte quota of the flat medium.
    pub flat_quota_bytes: u64,
    /// Pool size of each indexed database.
    pub indexed_max_connections: u32,
    /// Period of view refresh loops.
    pub refresh_interval: Duration,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let data_dir = get_env_or_default("SHOPKART_DATA_DIR", DEFAULT_DATA_DIR);
        let flat_quota_bytes = parse_env::<u64>(
            "SHOPKART_FLAT_QUOTA_BYTES",
            &DEFAULT_FLAT_QUOTA_BYTES.to_string(),
        )?;
        let indexed_max_connections =
            parse_env::<u32>("SHOPKART_INDEXED_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if indexed_max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPKART_INDEXED_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let refresh_secs = parse_env::<u64>("SHOPKART_REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_SECS)?;
        if refresh_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPKART_REFRESH_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            location: StoreLocation::Directory(PathBuf::from(data_dir)),
            flat_quota_bytes,
            indexed_max_connections,
            refresh_interval: Duration::from_secs(refresh_secs),
        })
    }

    /// In-memory configuration with default limits.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            location: StoreLocation::InMemory,
            flat_quota_bytes: DEFAULT_FLAT_QUOTA_BYTES,
            indexed_max_connections: 1,
            refresh_interval: Duration::from_secs(5),
        }
    }

    /// On-disk configuration rooted at `dir` with default limits.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::Directory(dir.into()),
            flat_quota_bytes: DEFAULT_FLAT_QUOTA_BYTES,
            indexed_max_connections: 4,
            refresh_interval: Duration::from_secs(5),
        }
    }

    /// Override the flat quota.
    #[must_use]
    pub const fn with_flat_quota(mut self, bytes: u64) -> Self {
        self.flat_quota_bytes = bytes;
        self
    }

    /// Override the refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
