//! FFmpeg CLI wrapper for video concatenation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner that surfaces ffmpeg's stderr verbatim on failure
//! - Lossless concat-demuxer stitching behind the `Concatenator` trait

pub mod command;
pub mod concat;
pub mod error;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use concat::{concat_manifest, output_file_name, Concatenator, FfmpegConcat, MANIFEST_FILE_NAME};
pub use error::{MediaError, MediaResult};
