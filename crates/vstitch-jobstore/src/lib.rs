//! Job store: the single source of truth for job lifecycle.
//!
//! This crate provides:
//! - The `JobStore` contract consumed by the scheduler and the
//!   submission/editing/deletion paths
//! - A PostgreSQL implementation with a race-safe claim
//! - An in-memory implementation for single-process use and tests

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::JobStoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;
pub use store::{JobStore, StatusUpdate};
