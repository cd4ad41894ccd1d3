//! Ordered key-value datastore over S3-compatible object storage.
//!
//! Keys map to object paths under a configurable root directory. Single-key
//! operations are one remote call each; queries page through the bucket
//! listing lazily; batches stage puts and deletes locally and commit them
//! concurrently on a bounded worker pool.
//!
//! # Components
//!
//! - [`PathMapper`] -- key <-> object path translation
//! - [`translate()`] -- remote fault codes -> [`DatastoreError`]
//! - [`S3Datastore`] -- put / get / has / get_size / delete / query
//! - [`QueryResults`] -- lazy, paginated query sequence driven by a [`QueryCursor`]
//! - [`S3Batch`] -- staged operations, job planning and commit
//! - [`WorkerPool`] -- fixed-size executor pool for commit jobs
//!
//! The remote API is the [`ObjectClient`] trait. [`InMemoryObjectClient`]
//! implements it for tests and embedding.
//!
//! # Guarantees
//!
//! 1. A missing key is always reported as [`DatastoreError::NotFound`].
//! 2. Backend faults are propagated, never swallowed.
//! 3. Batches are best-effort: every job runs, failures are aggregated, and
//!    nothing is rolled back.
//! 4. No worker task outlives the commit that spawned it.

pub mod batch;
pub mod client;
pub mod config;
pub mod datastore;
pub mod error;
pub mod memory;
pub mod path;
pub mod pool;
pub mod query;
pub mod traits;
pub mod translate;

// Re-export primary types at crate root for ergonomic imports.
pub use batch::{S3Batch, StagedOp};
pub use client::{
    DeleteFault, ListPage, ListRequest, ObjectBody, ObjectClient, ObjectMeta, ObjectSummary,
    RemoteError, RemoteResult, DELETE_MAX_OBJECTS, LIST_MAX_KEYS,
};
pub use config::{S3Config, DEFAULT_WORKERS};
pub use datastore::S3Datastore;
pub use error::{BatchFailure, DatastoreError, DatastoreResult};
pub use memory::{CallCounts, InMemoryObjectClient};
pub use path::PathMapper;
pub use pool::{Job, WorkerPool};
pub use query::{CursorStep, QueryCursor, QueryResults};
pub use traits::{Batch, Batching, Datastore, ResultSet};
pub use translate::translate;
