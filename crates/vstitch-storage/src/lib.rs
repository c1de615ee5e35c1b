//! Object store gateway.
//!
//! This crate provides:
//! - An `ObjectStore` abstraction over a single bucket
//! - An S3-compatible implementation (R2, Supabase Storage, MinIO)
//! - `StorageGateway`: download to a staging directory, upload with bounded
//!   retry on connection resets, best-effort deletion

pub mod client;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod object_store;

pub use client::{S3Config, S3ObjectStore};
pub use error::{StorageError, StorageResult};
pub use gateway::{content_type_for, StorageGateway, UploadOptions};
pub use object_store::{BackendError, ObjectStore};
