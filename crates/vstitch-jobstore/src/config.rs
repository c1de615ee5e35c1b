//! Job store configuration.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Connection URL
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
}

impl JobStoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::config_error("DATABASE_URL not set"))?;

        Ok(Self {
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            ..Self::new(database_url)
        })
    }
}
