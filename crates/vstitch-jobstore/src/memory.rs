//! In-memory job store.
//!
//! Holds jobs in insertion order behind a mutex. Suitable for a
//! single-process worker and for exercising the pipeline in tests; every
//! status a job passes through is recorded in its history.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use vstitch_models::{JobId, JobKind, JobRecord, JobStatus, NewJob};

use crate::error::{StoreError, StoreResult};
use crate::store::{JobStore, StatusUpdate};

#[derive(Default)]
struct State {
    jobs: Vec<JobRecord>,
    history: HashMap<JobId, Vec<JobStatus>>,
}

impl State {
    fn position(&self, id: &JobId) -> Option<usize> {
        self.jobs.iter().position(|j| &j.id == id)
    }

    fn record(&mut self, id: &JobId, status: JobStatus) {
        self.history.entry(id.clone()).or_default().push(status);
    }
}

/// Job store backed by process memory.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record exactly as given, bypassing submission validation.
    pub fn insert_raw(&self, record: JobRecord) {
        let mut state = self.lock();
        state.record(&record.id, record.status);
        state.jobs.push(record);
    }

    /// Every status the job has been in, oldest first.
    pub fn status_history(&self, id: &JobId) -> Vec<JobStatus> {
        self.lock().history.get(id).cloned().unwrap_or_default()
    }

    /// Snapshot of every job in insertion order.
    pub fn all(&self) -> Vec<JobRecord> {
        self.lock().jobs.clone()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.lock().jobs.iter().filter(|j| j.status == status).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn claim_next(&self) -> StoreResult<Option<JobRecord>> {
        let mut state = self.lock();

        let next = state
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued)
            .min_by_key(|(idx, j)| (j.created_at, *idx))
            .map(|(idx, _)| idx);

        let Some(idx) = next else {
            return Ok(None);
        };

        let job = &mut state.jobs[idx];
        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.updated_at = Utc::now();
        let claimed = job.clone();

        state.record(&claimed.id, JobStatus::Processing);
        Ok(Some(claimed))
    }

    async fn set_status(&self, id: &JobId, update: StatusUpdate) -> StoreResult<JobRecord> {
        let mut state = self.lock();
        let idx = state
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let job = &mut state.jobs[idx];
        if job.status != update.expected_current() {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: job.status,
                to: update.target(),
            });
        }

        job.status = update.target();
        match update {
            StatusUpdate::Processing => {}
            StatusUpdate::Completed { output } => {
                job.output_descriptor = Some(output);
                job.error_detail = None;
            }
            StatusUpdate::Failed { error } => {
                job.error_detail = Some(error);
            }
        }
        job.updated_at = Utc::now();
        let updated = job.clone();

        state.record(id, updated.status);
        Ok(updated)
    }

    async fn requeue_all_processing(&self) -> StoreResult<u64> {
        let mut state = self.lock();
        let now = Utc::now();

        let mut moved = Vec::new();
        for job in state
            .jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Processing)
        {
            job.status = JobStatus::Queued;
            job.updated_at = now;
            moved.push(job.id.clone());
        }

        for id in &moved {
            state.record(id, JobStatus::Queued);
        }
        Ok(moved.len() as u64)
    }

    async fn insert(&self, job: NewJob) -> StoreResult<JobRecord> {
        let descriptor = job.descriptor()?;
        let now = Utc::now();

        let record = JobRecord {
            id: JobId::new(),
            owner_id: job.owner_id,
            kind: job.kind.as_str().to_string(),
            status: JobStatus::Queued,
            input_descriptor: Some(descriptor.encode()),
            output_descriptor: None,
            error_detail: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        };

        self.insert_raw(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        Ok(self.lock().jobs.iter().find(|j| &j.id == id).cloned())
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<JobRecord>> {
        let state = self.lock();
        let mut jobs: Vec<(usize, JobRecord)> = state
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.owner_id == owner_id)
            .map(|(idx, j)| (idx, j.clone()))
            .collect();

        jobs.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(jobs.into_iter().map(|(_, j)| j).collect())
    }

    async fn update_output_text(&self, id: &JobId, text: &str) -> StoreResult<JobRecord> {
        let mut state = self.lock();
        let idx = state
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let job = &mut state.jobs[idx];
        if job.parsed_kind() != Some(JobKind::Transcribe) || job.status != JobStatus::Completed {
            return Err(StoreError::conflict(format!(
                "job {} is not a completed transcription",
                id
            )));
        }

        job.output_descriptor = Some(text.to_string());
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn delete(&self, id: &JobId) -> StoreResult<JobRecord> {
        let mut state = self.lock();
        let idx = state
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if state.jobs[idx].status == JobStatus::Processing {
            return Err(StoreError::conflict(format!("job {} is processing", id)));
        }

        state.history.remove(id);
        Ok(state.jobs.remove(idx))
    }
}
