//! Per-job pipeline.
//!
//! A claimed job is validated, given a staging directory, has its inputs
//! downloaded, is dispatched to the invoker for its kind, and ends with a
//! single terminal status write. The staging directory is removed on every
//! path out of [`JobProcessor::process`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::sync::watch;
use tracing::{debug, error, Instrument};
use vstitch_jobstore::{JobStore, StatusUpdate};
use vstitch_media::{Concatenator, MediaError};
use vstitch_models::{JobKind, JobOutput, JobRecord, ValidatedJob};
use vstitch_storage::{StorageGateway, UploadOptions};
use vstitch_transcribe::Transcriber;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::staging::StagingArea;

/// How a job left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Ran to completion; COMPLETED was requested with this output.
    Completed(JobOutput),
    /// Failed; FAILED was requested with this error text.
    Failed(String),
    /// Interrupted by shutdown; no status was written.
    Abandoned,
}

/// Executes claimed jobs.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    gateway: StorageGateway,
    concatenator: Arc<dyn Concatenator>,
    transcriber: Arc<dyn Transcriber>,
    staging: StagingArea,
    upload: UploadOptions,
    job_timeout: Option<Duration>,
    max_attempts: Option<u32>,
}

impl JobProcessor {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<dyn JobStore>,
        gateway: StorageGateway,
        concatenator: Arc<dyn Concatenator>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            store,
            gateway,
            concatenator,
            transcriber,
            staging: StagingArea::new(&config.staging_dir),
            upload: config.upload,
            job_timeout: config.job_timeout,
            max_attempts: config.max_attempts,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run a claimed job to a terminal status.
    ///
    /// Failures never escape: they are recorded on the job. When `cancel`
    /// flips to true the in-progress work is dropped, the staging directory
    /// is removed and the job is left PROCESSING for the shutdown requeue.
    pub async fn process(&self, job: JobRecord, cancel: watch::Receiver<bool>) -> JobOutcome {
        let logger = JobLogger::new(&job.id, &job.kind);
        let span = logger.create_span();

        self.process_inner(job, cancel, logger).instrument(span).await
    }

    async fn process_inner(
        &self,
        job: JobRecord,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) -> JobOutcome {
        let started = Instant::now();
        let kind_label = job
            .parsed_kind()
            .map(|k| k.as_str())
            .unwrap_or("UNKNOWN");
        logger.log_start(job.attempts);

        // Checks that need no side effects come first: a rejected job never
        // gets a staging directory or touches the object store.
        let validated = match self.admit(&job) {
            Ok(validated) => validated,
            Err(e) => return self.finish(&job, Err(e), &logger, kind_label, started).await,
        };

        let dir = match self.staging.create(&job.id).await {
            Ok(dir) => dir,
            Err(e) => {
                return self
                    .finish(&job, Err(e.into()), &logger, kind_label, started)
                    .await
            }
        };

        let result = tokio::select! {
            result = self.run_with_deadline(&validated, &dir, &logger) => Some(result),
            _ = cancelled(cancel) => None,
        };

        self.staging.cleanup(&job.id).await;

        match result {
            Some(result) => self.finish(&job, result, &logger, kind_label, started).await,
            None => {
                logger.log_warning("abandoned by shutdown");
                JobOutcome::Abandoned
            }
        }
    }

    fn admit(&self, job: &JobRecord) -> WorkerResult<ValidatedJob> {
        if let Some(max) = self.max_attempts {
            if i64::from(job.attempts) > i64::from(max) {
                return Err(WorkerError::AttemptsExceeded(max));
            }
        }
        Ok(job.validate()?)
    }

    async fn run_with_deadline(
        &self,
        job: &ValidatedJob,
        dir: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutput> {
        let work = self.execute(job, dir, logger);
        match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Timeout(limit.as_secs())),
            },
            None => work.await,
        }
    }

    async fn execute(
        &self,
        job: &ValidatedJob,
        dir: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutput> {
        let downloads = job
            .inputs
            .paths()
            .iter()
            .map(|path| self.gateway.download(path, dir));
        let local_inputs: Vec<PathBuf> = try_join_all(downloads).await?;
        logger.log_progress(&format!("downloaded {} input(s)", local_inputs.len()));

        match job.kind {
            JobKind::Stitch => {
                let local_output = self
                    .concatenator
                    .concat(&job.id, &local_inputs, dir)
                    .await?;

                let basename = local_output
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| MediaError::FileNotFound(local_output.clone()))?;
                let storage_path = job.output_path(basename);

                self.gateway
                    .upload(&local_output, &storage_path, self.upload)
                    .await?;
                Ok(JobOutput::StoragePath(storage_path))
            }
            JobKind::Transcribe => {
                let text = self.transcriber.transcribe(job.inputs.first()).await?;
                Ok(JobOutput::Text(text))
            }
        }
    }

    /// Record the terminal status.
    async fn finish(
        &self,
        job: &JobRecord,
        result: WorkerResult<JobOutput>,
        logger: &JobLogger,
        kind_label: &str,
        started: Instant,
    ) -> JobOutcome {
        let elapsed = started.elapsed().as_secs_f64();

        let (update, outcome) = match result {
            Ok(output) => {
                match &output {
                    JobOutput::StoragePath(path) => logger.log_completion(path),
                    JobOutput::Text(text) => {
                        logger.log_completion(&format!("{} characters transcribed", text.len()))
                    }
                }
                metrics::record_completed(kind_label, elapsed);
                (
                    StatusUpdate::completed(output.clone()),
                    JobOutcome::Completed(output),
                )
            }
            Err(e) => {
                let detail = e.to_string();
                logger.log_error(&detail);
                metrics::record_failed(kind_label, elapsed);
                (
                    StatusUpdate::failed(detail.clone()),
                    JobOutcome::Failed(detail),
                )
            }
        };

        match self.store.set_status(&job.id, update).await {
            Ok(record) => debug!(job_id = %job.id, status = %record.status, "Recorded job status"),
            Err(e) => error!(job_id = %job.id, "Failed to record job status: {}", e),
        }

        outcome
    }
}

/// Resolve once `cancel` is true. Never resolves if the sender is gone.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    let sender_gone = cancel.wait_for(|c| *c).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}
