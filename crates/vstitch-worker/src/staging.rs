//! Per-job staging directories.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vstitch_models::JobId;

/// Scratch space for in-flight jobs, one directory per job id under a
/// fixed base path.
#[derive(Debug, Clone)]
pub struct StagingArea {
    base: PathBuf,
}

impl StagingArea {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory used by `job_id`.
    pub fn dir_for(&self, job_id: &JobId) -> io::Result<PathBuf> {
        let id = job_id.as_str();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("job id {:?} is not usable as a directory name", id),
            ));
        }
        Ok(self.base.join(id))
    }

    /// Create the job's directory, including missing parents. Creating an
    /// existing directory succeeds.
    pub async fn create(&self, job_id: &JobId) -> io::Result<PathBuf> {
        let dir = self.dir_for(job_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(job_id = %job_id, "Created staging directory {}", dir.display());
        Ok(dir)
    }

    /// Remove the job's directory and everything in it.
    ///
    /// Never fails: a missing directory is a no-op and other errors are only
    /// logged.
    pub async fn cleanup(&self, job_id: &JobId) {
        let dir = match self.dir_for(job_id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(job_id = %job_id, "Skipping staging cleanup: {}", e);
                return;
            }
        };

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job_id, "Removed staging directory {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %job_id,
                "Failed to remove staging directory {}: {}",
                dir.display(),
                e
            ),
        }
    }
}
