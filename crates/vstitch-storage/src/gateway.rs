//! Storage gateway used by the job pipeline.
//!
//! Downloads fail fast. Uploads are retried a bounded number of times, but
//! only when the store resets the connection; every other failure surfaces
//! after the first attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::metrics::{record_delete_failure, record_download, record_upload_retry};
use crate::object_store::ObjectStore;

/// Upload retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Maximum number of attempts, including the first one.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl UploadOptions {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

/// Content type for an object, derived from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Gateway between local staging directories and the object store.
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Download `storage_path` into `destination_dir`, naming the local file
    /// after the basename of the store path.
    pub async fn download(
        &self,
        storage_path: &str,
        destination_dir: impl AsRef<Path>,
    ) -> StorageResult<PathBuf> {
        let file_name = Path::new(storage_path)
            .file_name()
            .ok_or_else(|| StorageError::InvalidKey(storage_path.to_string()))?;
        let local_path = destination_dir.as_ref().join(file_name);

        debug!("Downloading {} to {}", storage_path, local_path.display());

        let data = self
            .store
            .get_object(storage_path)
            .await
            .map_err(|source| StorageError::DownloadFailed {
                path: storage_path.to_string(),
                source,
            })?
            .ok_or_else(|| StorageError::EmptyPayload(storage_path.to_string()))?;

        tokio::fs::write(&local_path, data).await?;
        record_download();

        info!("Downloaded {} to {}", storage_path, local_path.display());
        Ok(local_path)
    }

    /// Upload a local file with upsert semantics.
    ///
    /// The file is read fully into memory once; each attempt sends the same
    /// buffer.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        storage_path: &str,
        options: UploadOptions,
    ) -> StorageResult<()> {
        let local_path = local_path.as_ref();
        let max_attempts = options.max_retries.max(1);
        let content_type = content_type_for(storage_path);

        info!("Uploading {} to {}", local_path.display(), storage_path);
        let data = tokio::fs::read(local_path).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("Upload attempt {}/{} for {}", attempt, max_attempts, storage_path);

            match self
                .store
                .put_object(storage_path, data.clone(), content_type, true)
                .await
            {
                Ok(()) => {
                    info!(
                        "Uploaded {} to {} on attempt {}",
                        local_path.display(),
                        storage_path,
                        attempt
                    );
                    return Ok(());
                }
                Err(e) if e.is_connection_reset() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = options.retry_delay.as_millis() as u64,
                        "Upload of {} reset by store, retrying: {}",
                        storage_path,
                        e
                    );
                    record_upload_retry();
                    tokio::time::sleep(options.retry_delay).await;
                }
                Err(source) => {
                    error!(
                        attempt,
                        "Upload of {} failed: {}", storage_path, source
                    );
                    return Err(StorageError::UploadFailed {
                        local: local_path.display().to_string(),
                        path: storage_path.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    /// Delete objects without letting storage errors escape.
    ///
    /// Returns the number of objects the store reported as removed, or 0 if
    /// the delete failed.
    pub async fn delete_objects(&self, paths: &[String]) -> u32 {
        if paths.is_empty() {
            return 0;
        }

        match self.store.delete_objects(paths).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Best-effort delete of {} objects failed: {}", paths.len(), e);
                record_delete_failure();
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::BackendError;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Store whose puts fail with scripted errors before succeeding.
    #[derive(Default)]
    struct ScriptedStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        put_failures: Mutex<VecDeque<BackendError>>,
        put_attempts: Mutex<u32>,
        fail_deletes: bool,
    }

    impl ScriptedStore {
        fn failing_puts(errors: Vec<BackendError>) -> Self {
            Self {
                put_failures: Mutex::new(errors.into()),
                ..Default::default()
            }
        }

        fn attempts(&self) -> u32 {
            *self.put_attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError> {
            match path {
                "missing.mp4" => Err(BackendError::with_code("NoSuchKey", "NoSuchKey")),
                "hollow.mp4" => Ok(None),
                _ => Ok(self.objects.lock().unwrap().get(path).cloned()),
            }
        }

        async fn put_object(
            &self,
            path: &str,
            data: Vec<u8>,
            _content_type: &str,
            _upsert: bool,
        ) -> Result<(), BackendError> {
            *self.put_attempts.lock().unwrap() += 1;
            if let Some(err) = self.put_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.objects.lock().unwrap().insert(path.to_string(), data);
            Ok(())
        }

        async fn delete_objects(&self, paths: &[String]) -> Result<u32, BackendError> {
            if self.fail_deletes {
                return Err(BackendError::new("AccessDenied"));
            }
            let mut objects = self.objects.lock().unwrap();
            Ok(paths.iter().filter(|p| objects.remove(*p).is_some()).count() as u32)
        }
    }

    fn fast_options() -> UploadOptions {
        UploadOptions::new(3, Duration::from_millis(1))
    }

    async fn local_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("output-job-1.mp4");
        tokio::fs::write(&path, b"stitched").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_retries_connection_reset_then_succeeds() {
        let store = Arc::new(ScriptedStore::failing_puts(vec![
            BackendError::new("read ECONNRESET"),
            BackendError::new("Connection reset by peer"),
        ]));
        let gateway = StorageGateway::new(store.clone());
        let dir = tempfile::tempdir().unwrap();
        let file = local_file(&dir).await;

        gateway
            .upload(&file, "user-1/outputs/output-job-1.mp4", fast_options())
            .await
            .unwrap();

        assert_eq!(store.attempts(), 3);
        assert_eq!(
            store.objects.lock().unwrap()["user-1/outputs/output-job-1.mp4"],
            b"stitched".to_vec()
        );
    }

    #[tokio::test]
    async fn test_upload_non_retryable_fails_after_one_attempt() {
        let store = Arc::new(ScriptedStore::failing_puts(vec![BackendError::new(
            "Payload too large",
        )]));
        let gateway = StorageGateway::new(store.clone());
        let dir = tempfile::tempdir().unwrap();
        let file = local_file(&dir).await;

        let err = gateway
            .upload(&file, "user-1/outputs/x.mp4", fast_options())
            .await
            .unwrap_err();

        assert_eq!(store.attempts(), 1);
        assert_eq!(err.attempts(), Some(1));
        assert!(err.to_string().contains("after 1 attempts: Payload too large"));
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_max_attempts() {
        let store = Arc::new(ScriptedStore::failing_puts(vec![
            BackendError::new("ECONNRESET"),
            BackendError::new("ECONNRESET"),
            BackendError::new("ECONNRESET"),
            BackendError::new("ECONNRESET"),
        ]));
        let gateway = StorageGateway::new(store.clone());
        let dir = tempfile::tempdir().unwrap();
        let file = local_file(&dir).await;

        let err = gateway
            .upload(&file, "user-1/outputs/x.mp4", fast_options())
            .await
            .unwrap_err();

        assert_eq!(store.attempts(), 3);
        assert_eq!(err.attempts(), Some(3));
    }

    #[tokio::test]
    async fn test_download_writes_basename() {
        let store = Arc::new(ScriptedStore::default());
        store
            .objects
            .lock()
            .unwrap()
            .insert("user-1/uploads/a.mp4".into(), b"clip-a".to_vec());
        let gateway = StorageGateway::new(store);
        let dir = tempfile::tempdir().unwrap();

        let local = gateway.download("user-1/uploads/a.mp4", dir.path()).await.unwrap();

        assert_eq!(local, dir.path().join("a.mp4"));
        assert_eq!(tokio::fs::read(&local).await.unwrap(), b"clip-a");
    }

    #[tokio::test]
    async fn test_download_errors() {
        let gateway = StorageGateway::new(Arc::new(ScriptedStore::default()));
        let dir = tempfile::tempdir().unwrap();

        let err = gateway.download("missing.mp4", dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::DownloadFailed { .. }));
        assert_eq!(err.to_string(), "Failed to download missing.mp4: NoSuchKey");

        let err = gateway.download("hollow.mp4", dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "No data received for hollow.mp4");
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let store = Arc::new(ScriptedStore {
            fail_deletes: true,
            ..Default::default()
        });
        let gateway = StorageGateway::new(store);
        assert_eq!(gateway.delete_objects(&["a.mp4".to_string()]).await, 0);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("user-1/outputs/output-1.mp4"), "video/mp4");
        assert_eq!(content_type_for("notes.TXT"), "text/plain");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
