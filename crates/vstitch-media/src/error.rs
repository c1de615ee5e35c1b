//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("{message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("No input files to concatenate")]
    NoInputs,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    ///
    /// The message carries stderr verbatim when ffmpeg wrote any, falling
    /// back to `fallback` (usually the exit status).
    pub fn ffmpeg_failed(
        fallback: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        let detail = match stderr.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => fallback.into(),
        };
        Self::FfmpegFailed {
            message: format!("ffmpeg execution failed: {}", detail),
            stderr,
            exit_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_failed_prefers_stderr() {
        let err = MediaError::ffmpeg_failed(
            "exit status: 1",
            Some("filelist.txt: Invalid data found when processing input\n".into()),
            Some(1),
        );
        assert_eq!(
            err.to_string(),
            "ffmpeg execution failed: filelist.txt: Invalid data found when processing input"
        );
    }

    #[test]
    fn test_ffmpeg_failed_falls_back_to_status() {
        let err = MediaError::ffmpeg_failed("exit status: 234", Some("  ".into()), Some(234));
        assert_eq!(err.to_string(), "ffmpeg execution failed: exit status: 234");
    }
}
