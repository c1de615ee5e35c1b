//! Worker error types.

use thiserror::Error;
use vstitch_jobstore::StoreError;
use vstitch_media::MediaError;
use vstitch_models::ValidationError;
use vstitch_storage::StorageError;
use vstitch_transcribe::TranscribeError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Anything that can end a job in FAILED.
///
/// The display text is what lands in the job's error detail, so errors from
/// the collaborator crates are passed through unchanged.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transcribe(#[from] TranscribeError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job timed out after {0}s")]
    Timeout(u64),

    #[error("Job exceeded maximum attempts ({0})")]
    AttemptsExceeded(u32),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_messages_pass_through() {
        let err = WorkerError::from(ValidationError::Empty);
        assert_eq!(err.to_string(), "Invalid or empty input file array.");

        let err = WorkerError::from(MediaError::ffmpeg_failed("exit status: 1", None, Some(1)));
        assert_eq!(err.to_string(), "ffmpeg execution failed: exit status: 1");
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            WorkerError::Timeout(90).to_string(),
            "Job timed out after 90s"
        );
    }
}
