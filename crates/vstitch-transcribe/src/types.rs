//! Transcription function request types.

use serde::{Deserialize, Serialize};

/// Name of the text field in the function's response body.
pub const TRANSCRIPTION_FIELD: &str = "transcription";

/// Body sent to the transcription function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRequest {
    /// Store path of the media to transcribe
    pub storage_path: String,
}
