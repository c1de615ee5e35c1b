//! Bucket abstraction consumed by the gateway.

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an object store backend.
///
/// `message` holds the full error chain as text so that transient-error
/// signatures buried in a cause are still visible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Whether the failure matches the connection-reset signature the store
    /// is known to produce intermittently on large payloads.
    pub fn is_connection_reset(&self) -> bool {
        if self.code.as_deref() == Some("ECONNRESET") {
            return true;
        }
        let msg = self.message.to_lowercase();
        msg.contains("econnreset") || msg.contains("connection reset")
    }
}

/// A single bucket of objects addressed by path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. `Ok(None)` means the store answered without data.
    async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Write an object. With `upsert` an existing object is overwritten.
    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), BackendError>;

    /// Delete objects, returning how many were removed.
    async fn delete_objects(&self, paths: &[String]) -> Result<u32, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_reset_signatures() {
        assert!(BackendError::new("request failed: ECONNRESET").is_connection_reset());
        assert!(BackendError::new("io error: Connection reset by peer (os error 104)")
            .is_connection_reset());
        assert!(BackendError::with_code("socket hang up", "ECONNRESET").is_connection_reset());
    }

    #[test]
    fn test_other_errors_are_not_transient() {
        assert!(!BackendError::new("AccessDenied: bucket policy").is_connection_reset());
        assert!(!BackendError::with_code("timeout", "ETIMEDOUT").is_connection_reset());
    }
}
