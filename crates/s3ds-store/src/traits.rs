use async_trait::async_trait;
use s3ds_types::{Entry, Key, Query};

use crate::error::DatastoreResult;

/// Generic ordered key-value datastore.
///
/// All implementations must satisfy these invariants:
/// - `get`, `get_size` report a missing key as `DatastoreError::NotFound`.
/// - `has` never reports a missing key as an error.
/// - `delete` of a missing key succeeds.
/// - Backend faults are propagated, never silently ignored.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Lazy result sequence produced by [`Datastore::query`].
    type Results: ResultSet;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()>;

    async fn get(&self, key: &Key) -> DatastoreResult<Vec<u8>>;

    async fn has(&self, key: &Key) -> DatastoreResult<bool>;

    /// Size in bytes of the stored value, without fetching it.
    async fn get_size(&self, key: &Key) -> DatastoreResult<u64>;

    async fn delete(&self, key: &Key) -> DatastoreResult<()>;

    async fn query(&self, query: Query) -> DatastoreResult<Self::Results>;

    async fn close(&self) -> DatastoreResult<()> {
        Ok(())
    }
}

/// A lazily produced sequence of query entries.
///
/// After the first `Err` the sequence is finished and `next` returns `None`.
#[async_trait]
pub trait ResultSet: Send {
    async fn next(&mut self) -> Option<DatastoreResult<Entry>>;

    /// Release the sequence. Safe to call more than once.
    fn close(&mut self) -> DatastoreResult<()>;
}

/// Staged puts and deletes applied together on `commit`.
///
/// Staging never touches the backend. The last operation staged for a key
/// is the one applied.
#[async_trait]
pub trait Batch: Send {
    fn put(&mut self, key: Key, value: Vec<u8>) -> DatastoreResult<()>;

    fn delete(&mut self, key: Key) -> DatastoreResult<()>;

    /// Apply every staged operation. The staged set is consumed whether or
    /// not the commit succeeds.
    async fn commit(&mut self) -> DatastoreResult<()>;
}

/// A datastore that supports batched writes.
#[async_trait]
pub trait Batching: Datastore {
    type Batch: Batch;

    async fn batch(&self) -> DatastoreResult<Self::Batch>;
}
