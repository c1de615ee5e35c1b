//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Read the input through the given demuxer.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Copy all streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Build the command arguments. The output is always overwritten and
    /// only errors are logged, so stderr holds nothing but the failure.
    pub fn build_args(&self) -> Vec<String> {
        ["-y", "-v", "error"]
            .into_iter()
            .map(String::from)
            .chain(self.input_args.iter().cloned())
            .chain(["-i".to_string(), self.input.to_string_lossy().into_owned()])
            .chain(self.output_args.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }
}

/// Runner for FFmpeg commands.
///
/// The child process is killed if the future running it is dropped, so a
/// cancelled or timed-out job does not leave ffmpeg behind.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Binary name or path
    binary: String,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    /// Create a new runner for the given binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Create from the `FFMPEG_BIN` environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()))
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Resolve the binary on `PATH`.
    pub fn locate(&self) -> MediaResult<PathBuf> {
        which::which(&self.binary)
            .map_err(|e| MediaError::FfmpegNotFound(format!("{}: {}", self.binary, e)))
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let binary = self.locate()?;
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = child.wait_with_output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("FFmpeg output: {}", stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!("FFmpeg error: {}", stderr.trim());
            Err(MediaError::ffmpeg_failed(
                output.status.to_string(),
                Some(stderr),
                output.status.code(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_concat_args() {
        let cmd = FfmpegCommand::new("/tmp/job/filelist.txt", "/tmp/job/output-1.mp4")
            .format("concat")
            .input_args(["-safe", "0"])
            .stream_copy();

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y",
                "-v",
                "error",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "/tmp/job/filelist.txt",
                "-c",
                "copy",
                "/tmp/job/output-1.mp4",
            ]
        );
    }

    #[test]
    fn test_plain_command_args() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4").build_args();
        assert_eq!(args, vec!["-y", "-v", "error", "-i", "in.mp4", "out.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = FfmpegRunner::new("definitely-not-ffmpeg-vstitch");
        let err = runner
            .run(&FfmpegCommand::new("in.mp4", "out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }
}
