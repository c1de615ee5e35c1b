//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vstitch_storage::UploadOptions;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Delay between scheduler ticks
    pub poll_interval: Duration,
    /// Maximum jobs in PROCESSING at once for this process
    pub max_concurrent_jobs: usize,
    /// Base directory for per-job staging directories
    pub staging_dir: PathBuf,
    /// Optional per-job deadline
    pub job_timeout: Option<Duration>,
    /// Optional cap on how many times a job may be claimed
    pub max_attempts: Option<u32>,
    /// How long shutdown waits for cancelled jobs to unwind
    pub shutdown_timeout: Duration,
    /// Upload retry policy
    pub upload: UploadOptions,
    /// Prometheus listener address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            max_concurrent_jobs: 1,
            staging_dir: PathBuf::from("/tmp/vstitch"),
            job_timeout: None,
            max_attempts: None,
            shutdown_timeout: Duration::from_secs(30),
            upload: UploadOptions::default(),
            metrics_addr: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            poll_interval: env_parse("WORKER_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_concurrent_jobs: env_parse::<usize>("WORKER_MAX_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            staging_dir: std::env::var("WORKER_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            job_timeout: env_parse::<u64>("WORKER_JOB_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_attempts: env_parse::<u32>("WORKER_MAX_ATTEMPTS").filter(|n| *n > 0),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            upload: UploadOptions::new(
                env_parse("WORKER_UPLOAD_MAX_RETRIES").unwrap_or(defaults.upload.max_retries),
                env_parse("WORKER_UPLOAD_RETRY_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.upload.retry_delay),
            ),
            metrics_addr: env_parse("WORKER_METRICS_ADDR"),
        }
    }
}
