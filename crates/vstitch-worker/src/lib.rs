//! Stitch/transcribe job worker.
//!
//! This crate provides:
//! - Polling scheduler with a bounded number of concurrent jobs
//! - Per-job pipeline: validate, stage, download, invoke, upload, record
//! - Crash-safe shutdown that requeues interrupted jobs
//! - Submission, transcript editing and deletion operations

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod scheduler;
pub mod staging;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use lifecycle::{delete_job, edit_transcript, list_jobs, submit_job, LifecycleError};
pub use logging::{init_tracing, JobLogger};
pub use processor::{JobOutcome, JobProcessor};
pub use scheduler::{Scheduler, TickOutcome};
pub use staging::StagingArea;
