//! Client for the remote transcription function.
//!
//! The transcription runs as a function-as-a-service endpoint that takes a
//! store path and answers with the transcript text. Calls are never retried.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Transcriber, TranscriptionClient, TranscriptionConfig};
pub use error::{TranscribeError, TranscribeResult};
pub use types::{TranscriptionRequest, TRANSCRIPTION_FIELD};
