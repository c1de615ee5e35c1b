//! Job submission, transcript editing and deletion.
//!
//! These run outside the scheduler (an API layer or admin tooling calls
//! them) and talk to the same job store. Jobs owned by someone else are
//! reported as not found.

use thiserror::Error;
use tracing::info;
use vstitch_jobstore::{JobStore, StoreError};
use vstitch_models::{JobId, JobKind, JobRecord, JobStatus, NewJob, ValidationError};
use vstitch_storage::StorageGateway;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("Job store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LifecycleError::NotFound(id),
            StoreError::Validation(e) => LifecycleError::Validation(e),
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::InvalidTransition { id, from, to } => LifecycleError::Conflict(format!(
                "Job {} cannot move from {} to {}",
                id, from, to
            )),
            other => LifecycleError::Store(other),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Validate and persist a new QUEUED job.
pub async fn submit_job(store: &dyn JobStore, job: NewJob) -> LifecycleResult<JobRecord> {
    job.descriptor()?;

    let record = store.insert(job).await?;
    info!(
        job_id = %record.id,
        kind = %record.kind,
        owner_id = %record.owner_id,
        "Job submitted"
    );
    Ok(record)
}

/// Jobs belonging to `owner_id`, newest first.
pub async fn list_jobs(store: &dyn JobStore, owner_id: &str) -> LifecycleResult<Vec<JobRecord>> {
    Ok(store.list_for_owner(owner_id).await?)
}

/// Replace the text of a completed transcription.
pub async fn edit_transcript(
    store: &dyn JobStore,
    id: &JobId,
    owner_id: &str,
    text: &str,
) -> LifecycleResult<JobRecord> {
    let job = owned_job(store, id, owner_id).await?;

    if job.parsed_kind() != Some(JobKind::Transcribe) {
        return Err(LifecycleError::Conflict(
            "Only transcription jobs can be edited".to_string(),
        ));
    }
    if job.status != JobStatus::Completed {
        return Err(LifecycleError::Conflict(format!(
            "Job {} is {}; only completed transcriptions can be edited",
            id, job.status
        )));
    }

    let updated = store.update_output_text(id, text).await?;
    info!(job_id = %id, "Transcript edited");
    Ok(updated)
}

/// Delete a job and, for a completed stitch, its output object.
///
/// Output removal is best-effort; the row is deleted even if the object
/// store refuses.
pub async fn delete_job(
    store: &dyn JobStore,
    gateway: &StorageGateway,
    id: &JobId,
    owner_id: &str,
) -> LifecycleResult<JobRecord> {
    let job = owned_job(store, id, owner_id).await?;

    if job.status == JobStatus::Processing {
        return Err(LifecycleError::Conflict(format!(
            "Job {} is processing and cannot be deleted",
            id
        )));
    }

    if let Some(output) = owned_output(&job) {
        let removed = gateway.delete_objects(&[output]).await;
        info!(job_id = %id, removed, "Removed job outputs");
    }

    let deleted = store.delete(id).await?;
    info!(job_id = %id, "Job deleted");
    Ok(deleted)
}

/// Object-store path produced by the job, if it owns one.
fn owned_output(job: &JobRecord) -> Option<String> {
    match (job.parsed_kind(), job.status) {
        (Some(JobKind::Stitch), JobStatus::Completed) => job.output_descriptor.clone(),
        _ => None,
    }
}

async fn owned_job(store: &dyn JobStore, id: &JobId, owner_id: &str) -> LifecycleResult<JobRecord> {
    match store.get(id).await? {
        Some(job) if job.owner_id == owner_id => Ok(job),
        _ => Err(LifecycleError::NotFound(id.clone())),
    }
}
