//! The job store contract.

use async_trait::async_trait;
use vstitch_models::{JobId, JobOutput, JobRecord, JobStatus, NewJob};

use crate::error::StoreResult;

/// A status write requested by the pipeline.
///
/// Each variant carries exactly the fields that accompany its target status,
/// so a completion always records its output and a failure its error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Processing,
    Completed { output: String },
    Failed { error: String },
}

impl StatusUpdate {
    pub fn completed(output: JobOutput) -> Self {
        Self::Completed {
            output: output.into_descriptor(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Status the job ends up in.
    pub fn target(&self) -> JobStatus {
        match self {
            StatusUpdate::Processing => JobStatus::Processing,
            StatusUpdate::Completed { .. } => JobStatus::Completed,
            StatusUpdate::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Status the job must currently be in for the write to apply.
    pub fn expected_current(&self) -> JobStatus {
        match self {
            StatusUpdate::Processing => JobStatus::Queued,
            StatusUpdate::Completed { .. } | StatusUpdate::Failed { .. } => JobStatus::Processing,
        }
    }
}

/// Persisted job records.
///
/// Every status write is conditional on the current status, so two writers
/// can never both move the same job out of a given state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically pick the oldest QUEUED job, mark it PROCESSING and return it.
    ///
    /// Returns `None` when nothing is queued. Concurrent callers never receive
    /// the same job. Each claim increments the job's attempt counter.
    async fn claim_next(&self) -> StoreResult<Option<JobRecord>>;

    /// Apply a status transition, failing if the job is not in the expected
    /// prior state.
    async fn set_status(&self, id: &JobId, update: StatusUpdate) -> StoreResult<JobRecord>;

    /// Move every PROCESSING job back to QUEUED. Returns the number moved.
    async fn requeue_all_processing(&self) -> StoreResult<u64>;

    /// Persist a new QUEUED job.
    async fn insert(&self, job: NewJob) -> StoreResult<JobRecord>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Jobs owned by `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<JobRecord>>;

    /// Replace the text output of a COMPLETED TRANSCRIBE job.
    async fn update_output_text(&self, id: &JobId, text: &str) -> StoreResult<JobRecord>;

    /// Delete a job that is not PROCESSING. Returns the deleted record.
    async fn delete(&self, id: &JobId) -> StoreResult<JobRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_targets() {
        assert_eq!(StatusUpdate::Processing.target(), JobStatus::Processing);
        assert_eq!(
            StatusUpdate::completed(JobOutput::Text("hi".into())),
            StatusUpdate::Completed {
                output: "hi".into()
            }
        );
        assert_eq!(StatusUpdate::failed("boom").target(), JobStatus::Failed);
    }

    #[test]
    fn test_expected_current_is_a_legal_edge() {
        for update in [
            StatusUpdate::Processing,
            StatusUpdate::failed("x"),
            StatusUpdate::Completed { output: "y".into() },
        ] {
            assert!(update.expected_current().can_transition_to(update.target()));
        }
    }
}
