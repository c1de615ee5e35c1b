//! Lossless concatenation via the ffmpeg concat demuxer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;
use vstitch_models::JobId;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Name of the manifest written next to the inputs.
pub const MANIFEST_FILE_NAME: &str = "filelist.txt";

/// Produces one video out of an ordered list of local inputs.
#[async_trait]
pub trait Concatenator: Send + Sync {
    /// Concatenate `inputs` in order into a file inside `target_dir` and
    /// return its path.
    async fn concat(
        &self,
        job_id: &JobId,
        inputs: &[PathBuf],
        target_dir: &Path,
    ) -> MediaResult<PathBuf>;
}

/// File name of the stitched output for a job.
pub fn output_file_name(job_id: &JobId) -> String {
    format!("output-{}.mp4", job_id)
}

/// Render the concat demuxer manifest for `inputs`, preserving order.
pub fn concat_manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let path = p.to_string_lossy().replace('\\', "/");
            // Inside single quotes a quote is written as '\''
            format!("file '{}'", path.replace('\'', r"'\''"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenator backed by the ffmpeg CLI, copying streams without
/// re-encoding.
#[derive(Debug, Clone, Default)]
pub struct FfmpegConcat {
    runner: FfmpegRunner,
}

impl FfmpegConcat {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &FfmpegRunner {
        &self.runner
    }
}

#[async_trait]
impl Concatenator for FfmpegConcat {
    async fn concat(
        &self,
        job_id: &JobId,
        inputs: &[PathBuf],
        target_dir: &Path,
    ) -> MediaResult<PathBuf> {
        if inputs.is_empty() {
            return Err(MediaError::NoInputs);
        }

        let output = target_dir.join(output_file_name(job_id));
        let manifest = target_dir.join(MANIFEST_FILE_NAME);
        tokio::fs::write(&manifest, concat_manifest(inputs)).await?;

        info!(
            job_id = %job_id,
            inputs = inputs.len(),
            "Starting ffmpeg concat into {}",
            output.display()
        );

        let cmd = FfmpegCommand::new(&manifest, &output)
            .format("concat")
            .input_args(["-safe", "0"])
            .stream_copy();
        self.runner.run(&cmd).await?;

        if !tokio::fs::try_exists(&output).await? {
            return Err(MediaError::FileNotFound(output));
        }

        info!(job_id = %job_id, "ffmpeg concat completed");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_preserves_order() {
        let manifest = concat_manifest(&[
            PathBuf::from("/tmp/vstitch/job/b.mp4"),
            PathBuf::from("/tmp/vstitch/job/a.mp4"),
        ]);
        assert_eq!(
            manifest,
            "file '/tmp/vstitch/job/b.mp4'\nfile '/tmp/vstitch/job/a.mp4'"
        );
    }

    #[test]
    fn test_manifest_escapes_quotes_and_backslashes() {
        let manifest = concat_manifest(&[PathBuf::from(r"C:\clips\it's.mp4")]);
        assert_eq!(manifest, r"file 'C:/clips/it'\''s.mp4'");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(&JobId::from_string("abc")),
            "output-abc.mp4"
        );
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FfmpegConcat::default()
            .concat(&JobId::from_string("j"), &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoInputs));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concat_writes_manifest_and_output() {
        let bin_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        // Touch the last argument, which is the output path.
        let bin = fake_ffmpeg(bin_dir.path(), r#"for last; do :; done; : > "$last""#);
        let concat = FfmpegConcat::new(FfmpegRunner::new(bin.to_string_lossy()));

        let inputs = vec![work.path().join("a.mp4"), work.path().join("b.mp4")];
        let output = concat
            .concat(&JobId::from_string("job-9"), &inputs, work.path())
            .await
            .unwrap();

        assert_eq!(output, work.path().join("output-job-9.mp4"));
        assert!(output.exists());
        let manifest = std::fs::read_to_string(work.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest.lines().count(), 2);
        assert!(manifest.lines().next().unwrap().ends_with("a.mp4'"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concat_surfaces_stderr_verbatim() {
        let bin_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let bin = fake_ffmpeg(
            bin_dir.path(),
            "echo 'Unsafe file name in concat list' >&2; exit 1",
        );
        let concat = FfmpegConcat::new(FfmpegRunner::new(bin.to_string_lossy()));

        let err = concat
            .concat(
                &JobId::from_string("job-9"),
                &[work.path().join("a.mp4")],
                work.path(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "ffmpeg execution failed: Unsafe file name in concat list"
        );
    }
}
