use std::collections::HashMap;

use async_trait::async_trait;
use s3ds_types::Key;
use tracing::{debug, warn};

use crate::client::DELETE_MAX_OBJECTS;
use crate::datastore::S3Datastore;
use crate::error::{BatchFailure, DatastoreResult};
use crate::path::PathMapper;
use crate::pool::{Job, WorkerPool};
use crate::traits::Batch;

/// An operation waiting for commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StagedOp {
    Put(Vec<u8>),
    Delete,
}

/// Number of jobs for `puts` puts and `deletes` deletes: one per put plus
/// one per chunk of at most `delete_limit` deletes.
pub fn job_count(puts: usize, deletes: usize, delete_limit: usize) -> usize {
    puts + deletes.div_ceil(delete_limit.max(1))
}

/// Turn staged operations into jobs.
///
/// Each put becomes its own job; deletes are mapped to object paths and
/// grouped into chunks of at most `delete_limit`. Job order follows the
/// map's iteration order and carries no meaning.
pub fn plan_jobs(
    paths: &PathMapper,
    ops: HashMap<Key, StagedOp>,
    delete_limit: usize,
) -> Vec<Job> {
    let mut puts = Vec::new();
    let mut deletes = Vec::new();
    for (key, op) in ops {
        match op {
            StagedOp::Put(value) => puts.push(Job::Put { key, value }),
            StagedOp::Delete => deletes.push(paths.path_of(&key)),
        }
    }
    let mut jobs = puts;
    jobs.extend(
        deletes
            .chunks(delete_limit.max(1))
            .map(|chunk| Job::Delete {
                paths: chunk.to_vec(),
            }),
    );
    jobs
}

/// Best-effort batch of puts and deletes for an [`S3Datastore`].
///
/// Staging is local. `commit` runs every job on a bounded worker pool and
/// waits for all of them; failures are aggregated, nothing is rolled back.
pub struct S3Batch {
    store: S3Datastore,
    ops: HashMap<Key, StagedOp>,
    delete_limit: usize,
}

impl S3Batch {
    pub fn new(store: S3Datastore) -> Self {
        Self {
            store,
            ops: HashMap::new(),
            delete_limit: DELETE_MAX_OBJECTS,
        }
    }

    /// Number of staged operations (one per distinct key).
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operation currently staged for `key`.
    pub fn staged(&self, key: &Key) -> Option<&StagedOp> {
        self.ops.get(key)
    }
}

#[async_trait]
impl Batch for S3Batch {
    fn put(&mut self, key: Key, value: Vec<u8>) -> DatastoreResult<()> {
        self.ops.insert(key, StagedOp::Put(value));
        Ok(())
    }

    fn delete(&mut self, key: Key) -> DatastoreResult<()> {
        self.ops.insert(key, StagedOp::Delete);
        Ok(())
    }

    async fn commit(&mut self) -> DatastoreResult<()> {
        let ops = std::mem::take(&mut self.ops);
        let puts = ops.values().filter(|op| matches!(op, StagedOp::Put(_))).count();
        let deletes = ops.len() - puts;
        let jobs = plan_jobs(self.store.paths(), ops, self.delete_limit);
        debug_assert_eq!(jobs.len(), job_count(puts, deletes, self.delete_limit));
        let pool = WorkerPool::sized_for(self.store.workers(), jobs.len());
        debug!(
            puts,
            deletes,
            jobs = jobs.len(),
            workers = pool.size(),
            "committing batch"
        );

        let failures = pool.run(&self.store, jobs).await;
        if failures.is_empty() {
            return Ok(());
        }
        warn!(failed = failures.len(), "batch commit finished with failures");
        Err(BatchFailure { failures }.into())
    }
}

impl std::fmt::Debug for S3Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Batch")
            .field("staged", &self.ops.len())
            .field("delete_limit", &self.delete_limit)
            .finish()
    }
}
