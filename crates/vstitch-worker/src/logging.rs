//! Structured logging for the worker.
//!
//! `init_tracing` sets up the global subscriber for the binaries;
//! `JobLogger` keeps per-job lifecycle messages consistent.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vstitch_models::JobId;

/// Initialize tracing with ANSI output, or JSON when `LOG_FORMAT=json`.
///
/// `RUST_LOG` overrides the default `vstitch=info` directive.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vstitch=info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if use_json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job id and the job kind.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    kind: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, kind: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn log_start(&self, attempt: i32) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            attempt,
            "Job started"
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            kind = %self.kind,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            kind = %self.kind,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Span covering the whole execution of the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, kind = %self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "STITCH");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.kind(), "STITCH");
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
