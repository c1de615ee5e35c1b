//! Storage error types.

use thiserror::Error;

use crate::object_store::BackendError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Failed to download {path}: {source}")]
    DownloadFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    #[error("No data received for {0}")]
    EmptyPayload(String),

    #[error("Failed to upload {local} to {path} after {attempts} attempts: {source}")]
    UploadFailed {
        local: String,
        path: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Number of upload attempts made, for upload failures.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            StorageError::UploadFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
