//! Input descriptor parsing and validation.
//!
//! The input descriptor is persisted as a JSON array of object-store paths.
//! It is parsed once at the start of job execution; anything malformed is a
//! terminal validation failure.

use serde_json::Value;
use thiserror::Error;

/// Validation failures detected before any side effect of job execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No input files specified for the job.")]
    MissingDescriptor,

    #[error("Failed to parse input descriptor JSON: {0}")]
    Malformed(String),

    #[error("Invalid or empty input file array.")]
    Empty,

    #[error("Input file at position {0} is blank.")]
    BlankPath(usize),

    #[error("Unsupported job kind: {0}")]
    UnsupportedKind(String),

    #[error("Unsupported job status: {0}")]
    UnsupportedStatus(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

/// Ordered list of object-store paths a job consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor(Vec<String>);

impl InputDescriptor {
    /// Parse the persisted descriptor.
    ///
    /// A missing descriptor, invalid JSON, a non-array value, an empty array,
    /// a non-string entry or a blank path are all rejected.
    pub fn parse(raw: Option<&str>) -> Result<Self, ValidationError> {
        let raw = raw.ok_or(ValidationError::MissingDescriptor)?;

        let value: Value =
            serde_json::from_str(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;

        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => return Err(ValidationError::Empty),
        };

        let mut paths = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            match item {
                Value::String(path) if path.trim().is_empty() => {
                    return Err(ValidationError::BlankPath(idx))
                }
                Value::String(path) => paths.push(path),
                other => {
                    return Err(ValidationError::Malformed(format!(
                        "entry {} is not a string: {}",
                        idx, other
                    )))
                }
            }
        }

        Ok(Self(paths))
    }

    /// Build a descriptor from already-validated paths.
    pub fn from_paths(paths: Vec<String>) -> Result<Self, ValidationError> {
        if paths.is_empty() {
            return Err(ValidationError::Empty);
        }
        if let Some(idx) = paths.iter().position(|p| p.trim().is_empty()) {
            return Err(ValidationError::BlankPath(idx));
        }
        Ok(Self(paths))
    }

    /// Encode as the persisted JSON array.
    pub fn encode(&self) -> String {
        Value::Array(self.0.iter().cloned().map(Value::String).collect()).to_string()
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> &str {
        // Non-empty by construction.
        &self.0[0]
    }
}
