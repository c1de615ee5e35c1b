//! Polling scheduler.
//!
//! Each tick takes a concurrency slot, claims the oldest queued job and
//! spawns its execution without waiting for it. Shutdown stops ticking,
//! cancels in-flight jobs and requeues whatever is still PROCESSING.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use vstitch_jobstore::{JobStore, StatusUpdate};
use vstitch_models::JobId;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::JobProcessor;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every slot is busy; nothing was claimed.
    Saturated,
    /// No job was claimed.
    Idle,
    /// A job was claimed and its execution spawned.
    Dispatched(JobId),
}

/// Job scheduler owning the concurrency slots and in-flight tasks.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    processor: Arc<JobProcessor>,
    slots: Arc<Semaphore>,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    tasks: JoinSet<(JobId, Option<String>)>,
    running: HashMap<JobId, AbortHandle>,
    cancel: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(config: &WorkerConfig, processor: Arc<JobProcessor>) -> Self {
        let (cancel, _) = watch::channel(false);

        Self {
            store: Arc::clone(processor.store()),
            processor,
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            poll_interval: config.poll_interval,
            shutdown_timeout: config.shutdown_timeout,
            tasks: JoinSet::new(),
            running: HashMap::new(),
            cancel,
        }
    }

    /// Number of jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Poll once.
    ///
    /// Never fails: store errors are logged and reported as `Idle`.
    pub async fn tick(&mut self) -> TickOutcome {
        self.reap_finished().await;

        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(in_flight = self.in_flight(), "All job slots busy");
                return TickOutcome::Saturated;
            }
        };

        let job = match self.store.claim_next().await {
            Ok(Some(job)) => job,
            Ok(None) => return TickOutcome::Idle,
            Err(e) => {
                error!("Failed to claim next job: {}", e);
                return TickOutcome::Idle;
            }
        };

        let job_id = job.id.clone();
        info!(job_id = %job_id, kind = %job.kind, attempt = job.attempts, "Claimed job");
        metrics::record_claimed();

        let processor = Arc::clone(&self.processor);
        let cancel = self.cancel.subscribe();
        let task_job_id = job_id.clone();
        let handle = self.tasks.spawn(async move {
            // Held until the task ends, whichever way it ends.
            let _permit = permit;
            let panicked = AssertUnwindSafe(processor.process(job, cancel))
                .catch_unwind()
                .await
                .err()
                .map(panic_message);
            (task_job_id, panicked)
        });

        self.running.insert(job_id.clone(), handle);
        metrics::set_in_flight(self.running.len());

        TickOutcome::Dispatched(job_id)
    }

    /// Tick on the poll interval until `shutdown` turns true, then shut down.
    ///
    /// Returns the number of jobs requeued.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<u64> {
        info!(
            "Starting scheduler with {} slot(s), polling every {:?}",
            self.slots.available_permits(),
            self.poll_interval
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping scheduler");
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        self.shutdown().await
    }

    /// Cancel in-flight jobs, wait for them to unwind, then requeue every
    /// PROCESSING job.
    pub async fn shutdown(&mut self) -> WorkerResult<u64> {
        info!(in_flight = self.in_flight(), "Scheduler shutting down");
        // Receivers may all be gone already; that is fine.
        let _ = self.cancel.send(true);

        let drained = tokio::time::timeout(self.shutdown_timeout, self.drain()).await;
        if drained.is_err() {
            warn!(
                remaining = self.in_flight(),
                "In-flight jobs did not stop within {:?}, aborting",
                self.shutdown_timeout
            );
            let stranded: Vec<JobId> = self.running.keys().cloned().collect();
            self.tasks.abort_all();
            self.drain().await;

            for job_id in &stranded {
                self.processor.staging().cleanup(job_id).await;
            }
        }
        metrics::set_in_flight(0);

        let requeued = self.store.requeue_all_processing().await.map_err(WorkerError::from)?;
        metrics::record_requeued(requeued);
        info!(requeued, "Requeued interrupted jobs");

        Ok(requeued)
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.handle_joined(joined).await;
        }
    }

    async fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.handle_joined(joined).await;
        }
    }

    async fn handle_joined(&mut self, joined: Result<(JobId, Option<String>), JoinError>) {
        match joined {
            Ok((job_id, panicked)) => {
                self.running.remove(&job_id);
                if let Some(message) = panicked {
                    self.fail_panicked(&job_id, message).await;
                }
            }
            // Panics are caught inside the task, so only aborted tasks end
            // here and the id is lost with the output.
            Err(e) => {
                debug!("Job task ended without a result: {}", e);
                self.running.retain(|_, handle| !handle.is_finished());
            }
        }
        metrics::set_in_flight(self.running.len());
    }

    async fn fail_panicked(&self, job_id: &JobId, message: String) {
        let err = WorkerError::Panicked(message);
        error!(job_id = %job_id, "Job task panicked: {}", err);

        self.processor.staging().cleanup(job_id).await;
        if let Err(e) = self
            .store
            .set_status(job_id, StatusUpdate::failed(err.to_string()))
            .await
        {
            error!(job_id = %job_id, "Failed to record panicked job: {}", e);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
