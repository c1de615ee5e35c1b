//! Job definitions shared by the job store and the worker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::input::{InputDescriptor, ValidationError};
use crate::job_status::JobStatus;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Concatenate the ordered inputs into one video
    Stitch,
    /// Transcribe the first input into text
    Transcribe,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Stitch => "STITCH",
            JobKind::Transcribe => "TRANSCRIBE",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STITCH" => Ok(JobKind::Stitch),
            "TRANSCRIBE" => Ok(JobKind::Transcribe),
            other => Err(ValidationError::UnsupportedKind(other.to_string())),
        }
    }
}

/// A job as persisted in the job store.
///
/// `kind` and `input_descriptor` are kept exactly as stored; they are parsed
/// by [`JobRecord::validate`] at the start of execution so that a corrupt row
/// fails its own job instead of the read that fetched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub owner_id: String,
    pub kind: String,
    pub status: JobStatus,
    /// JSON array of store paths
    pub input_descriptor: Option<String>,
    /// Store path (stitch) or inline text (transcribe), set on completion
    pub output_descriptor: Option<String>,
    /// Error text, set on failure
    pub error_detail: Option<String>,
    /// Number of times the job has been claimed
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Parse the kind and input descriptor into an executable job.
    pub fn validate(&self) -> Result<ValidatedJob, ValidationError> {
        let kind = JobKind::from_str(&self.kind)?;
        let inputs = InputDescriptor::parse(self.input_descriptor.as_deref())?;

        Ok(ValidatedJob {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            kind,
            inputs,
        })
    }

    /// Parsed kind, if the stored value is one we know.
    pub fn parsed_kind(&self) -> Option<JobKind> {
        self.kind.parse().ok()
    }
}

/// A job whose kind and inputs passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedJob {
    pub id: JobId,
    pub owner_id: String,
    pub kind: JobKind,
    pub inputs: InputDescriptor,
}

impl ValidatedJob {
    /// Where the output of a stitch job with the given basename is stored.
    pub fn output_path(&self, basename: &str) -> String {
        output_storage_path(&self.owner_id, basename)
    }
}

/// Derive the store path for an output file owned by `owner_id`.
pub fn output_storage_path(owner_id: &str, basename: &str) -> String {
    format!("user-{}/outputs/{}", owner_id, basename)
}

/// Payload for submitting a new job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    #[validate(length(min = 1))]
    pub owner_id: String,

    pub kind: JobKind,

    /// Ordered store paths
    #[validate(length(min = 1))]
    pub inputs: Vec<String>,
}

impl NewJob {
    pub fn new(owner_id: impl Into<String>, kind: JobKind, inputs: Vec<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind,
            inputs,
        }
    }

    /// Validate the payload and return the descriptor to persist.
    pub fn descriptor(&self) -> Result<InputDescriptor, ValidationError> {
        if self.inputs.is_empty() {
            return Err(ValidationError::Empty);
        }
        self.validate()
            .map_err(|e| ValidationError::InvalidJob(e.to_string()))?;
        InputDescriptor::from_paths(self.inputs.clone())
    }
}

/// Result of a successfully executed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobOutput {
    /// Store path of the uploaded stitched video
    StoragePath(String),
    /// Inline transcription text
    Text(String),
}

impl JobOutput {
    /// Value written to the job's output descriptor.
    pub fn into_descriptor(self) -> String {
        match self {
            JobOutput::StoragePath(path) => path,
            JobOutput::Text(text) => text,
        }
    }

    pub fn as_descriptor(&self) -> &str {
        match self {
            JobOutput::StoragePath(path) => path,
            JobOutput::Text(text) => text,
        }
    }
}
