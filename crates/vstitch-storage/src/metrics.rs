//! Storage metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Upload attempts that were retried after a transient failure.
    pub const UPLOAD_RETRIES_TOTAL: &str = "vstitch_storage_upload_retries_total";

    /// Objects downloaded into staging directories.
    pub const DOWNLOADS_TOTAL: &str = "vstitch_storage_downloads_total";

    /// Best-effort deletions that failed and were swallowed.
    pub const DELETE_FAILURES_TOTAL: &str = "vstitch_storage_delete_failures_total";
}

pub fn record_upload_retry() {
    counter!(names::UPLOAD_RETRIES_TOTAL).increment(1);
}

pub fn record_download() {
    counter!(names::DOWNLOADS_TOTAL).increment(1);
}

pub fn record_delete_failure() {
    counter!(names::DELETE_FAILURES_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::UPLOAD_RETRIES_TOTAL.contains("retries"));
        assert!(names::DOWNLOADS_TOTAL.starts_with("vstitch_"));
    }
}
