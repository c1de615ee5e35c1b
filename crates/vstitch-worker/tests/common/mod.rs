//! Fakes shared by the worker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::{watch, Notify};
use vstitch_jobstore::{InMemoryJobStore, JobStore};
use vstitch_media::{output_file_name, Concatenator, MediaError, MediaResult};
use vstitch_models::{JobId, JobRecord, JobStatus};
use vstitch_storage::{BackendError, ObjectStore, StorageGateway, UploadOptions};
use vstitch_transcribe::{TranscribeResult, Transcriber};
use vstitch_worker::{JobProcessor, WorkerConfig};

/// Bucket kept in memory, counting every call.
#[derive(Default)]
pub struct MemoryBucket {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl MemoryBucket {
    pub fn with_objects(objects: &[(&str, &[u8])]) -> Self {
        let bucket = Self::default();
        {
            let mut map = bucket.objects.lock().unwrap();
            for (path, data) in objects {
                map.insert(path.to_string(), data.to_vec());
            }
        }
        bucket
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn insert(&self, path: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryBucket {
    async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(path).cloned())
    }

    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        _content_type: &str,
        _upsert: bool,
    ) -> Result<(), BackendError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    async fn delete_objects(&self, paths: &[String]) -> Result<u32, BackendError> {
        let mut objects = self.objects.lock().unwrap();
        let mut removed = 0;
        for path in paths {
            if objects.remove(path).is_some() {
                removed += 1;
            }
            self.deleted.lock().unwrap().push(path.clone());
        }
        Ok(removed)
    }
}

/// How the fake concatenator behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    Succeed,
    /// Wait for `release()` before succeeding.
    Gated,
    Fail,
    Panic,
}

/// Concatenator that joins input bytes in order.
pub struct FakeConcat {
    mode: ConcatMode,
    gate: Notify,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeConcat {
    pub fn new(mode: ConcatMode) -> Self {
        Self {
            mode,
            gate: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Let one gated call proceed.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// File names of the inputs of each call, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Concatenator for FakeConcat {
    async fn concat(
        &self,
        job_id: &JobId,
        inputs: &[PathBuf],
        target_dir: &Path,
    ) -> MediaResult<PathBuf> {
        self.calls.lock().unwrap().push(
            inputs
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect(),
        );

        match self.mode {
            ConcatMode::Succeed => {}
            ConcatMode::Gated => self.gate.notified().await,
            ConcatMode::Fail => {
                return Err(MediaError::ffmpeg_failed(
                    "exit status: 1",
                    Some("filelist.txt: Invalid data found when processing input".into()),
                    Some(1),
                ))
            }
            ConcatMode::Panic => panic!("concat exploded"),
        }

        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(tokio::fs::read(input).await?);
        }
        let output = target_dir.join(output_file_name(job_id));
        tokio::fs::write(&output, joined).await?;
        Ok(output)
    }
}

/// Transcriber returning a fixed text and recording the paths it was given.
#[derive(Default)]
pub struct StaticTranscriber {
    text: String,
    calls: Mutex<Vec<String>>,
}

impl StaticTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, storage_path: &str) -> TranscribeResult<String> {
        self.calls.lock().unwrap().push(storage_path.to_string());
        Ok(self.text.clone())
    }
}

/// Everything a processor needs, wired to in-memory fakes.
pub struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub bucket: Arc<MemoryBucket>,
    pub concat: Arc<FakeConcat>,
    pub staging: TempDir,
    pub config: WorkerConfig,
}

impl Harness {
    pub fn new(bucket: MemoryBucket, mode: ConcatMode) -> Self {
        let staging = TempDir::new().unwrap();
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(10),
            staging_dir: staging.path().to_path_buf(),
            shutdown_timeout: Duration::from_secs(5),
            upload: UploadOptions::new(3, Duration::from_millis(1)),
            ..WorkerConfig::default()
        };

        Self {
            store: Arc::new(InMemoryJobStore::new()),
            bucket: Arc::new(bucket),
            concat: Arc::new(FakeConcat::new(mode)),
            staging,
            config,
        }
    }

    pub fn gateway(&self) -> StorageGateway {
        StorageGateway::new(self.bucket.clone())
    }

    pub fn processor(&self, transcriber: Arc<dyn Transcriber>) -> Arc<JobProcessor> {
        Arc::new(JobProcessor::new(
            &self.config,
            self.store.clone(),
            self.gateway(),
            self.concat.clone(),
            transcriber,
        ))
    }

    pub fn staging_dir(&self, id: &JobId) -> PathBuf {
        self.staging.path().join(id.as_str())
    }

    pub async fn record(&self, id: &JobId) -> JobRecord {
        self.store.get(id).await.unwrap().expect("job exists")
    }

    /// Poll the store until the job reaches `status`.
    pub async fn wait_for_status(&self, id: &JobId, status: JobStatus) -> JobRecord {
        for _ in 0..500 {
            let record = self.record(id).await;
            if record.status == status {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", id, status);
    }
}

/// A raw QUEUED row, bypassing submission validation.
pub fn raw_job(owner: &str, kind: &str, descriptor: Option<&str>) -> JobRecord {
    let now = Utc::now();
    JobRecord {
        id: JobId::new(),
        owner_id: owner.to_string(),
        kind: kind.to_string(),
        status: JobStatus::Queued,
        input_descriptor: descriptor.map(str::to_string),
        output_descriptor: None,
        error_detail: None,
        attempts: 0,
        created_at: now,
        updated_at: now,
    }
}

/// A cancellation channel that never fires.
pub fn never_cancelled() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}
