//! Transcription client error types.

use thiserror::Error;

pub type TranscribeResult<T> = Result<T, TranscribeError>;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Transcription is not configured: {0}")]
    ConfigError(String),

    #[error("Function '{function}' failed with {status}: {body}")]
    FunctionFailed {
        function: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl TranscribeError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
