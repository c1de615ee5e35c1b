//! Worker metrics.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "vstitch_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vstitch_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vstitch_jobs_failed_total";
    pub const JOBS_REQUEUED_TOTAL: &str = "vstitch_jobs_requeued_total";
    pub const JOBS_IN_FLIGHT: &str = "vstitch_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "vstitch_job_duration_seconds";
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn install_exporter(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

pub fn record_completed(kind: &str, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "kind" => kind.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.to_string()).record(duration_secs);
}

pub fn record_failed(kind: &str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.to_string()).record(duration_secs);
}

pub fn record_requeued(count: u64) {
    counter!(names::JOBS_REQUEUED_TOTAL).increment(count);
}

pub fn set_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}
