//! Shared data models for the VStitch job pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job kinds and the persisted job record
//! - The job status lifecycle and its legal transitions
//! - Input descriptor parsing and validation

pub mod input;
pub mod job;
pub mod job_status;

// Re-export common types
pub use input::{InputDescriptor, ValidationError};
pub use job::{output_storage_path, JobId, JobKind, JobOutput, JobRecord, NewJob, ValidatedJob};
pub use job_status::JobStatus;
