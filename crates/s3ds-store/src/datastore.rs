use std::sync::Arc;

use async_trait::async_trait;
use s3ds_types::{Key, Query};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::batch::S3Batch;
use crate::client::{ListRequest, ObjectClient};
use crate::config::S3Config;
use crate::error::{DatastoreError, DatastoreResult};
use crate::path::PathMapper;
use crate::query::{page_size, QueryResults};
use crate::traits::{Batching, Datastore};
use crate::translate::translate;

struct Shared {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    paths: PathMapper,
    workers: usize,
}

/// Key-value datastore backed by one bucket of an S3-compatible store.
///
/// Cheap to clone; clones share the client. Single-object operations issue
/// exactly one remote call and never retry.
#[derive(Clone)]
pub struct S3Datastore {
    shared: Arc<Shared>,
}

impl S3Datastore {
    /// Create a datastore over `client` using the bucket and layout in `config`.
    pub fn new(config: S3Config, client: Arc<dyn ObjectClient>) -> DatastoreResult<Self> {
        config.validate()?;
        let workers = config.effective_workers();
        let paths = PathMapper::new(&config.root_directory);
        info!(
            bucket = %config.bucket,
            root = %paths.root(),
            workers,
            "s3 datastore ready"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                bucket: config.bucket,
                paths,
                workers,
            }),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.shared.bucket
    }

    pub fn paths(&self) -> &PathMapper {
        &self.shared.paths
    }

    /// Worker pool bound for batch commits.
    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    pub(crate) fn client(&self) -> &dyn ObjectClient {
        self.shared.client.as_ref()
    }

    /// Download the object at `path`. The body is dropped, and the response
    /// released, on every return path.
    pub(crate) async fn fetch(&self, path: &str) -> DatastoreResult<Vec<u8>> {
        let mut body = self
            .client()
            .get_object(self.bucket(), path)
            .await
            .map_err(translate)?;
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| DatastoreError::Backend(format!("reading {path}: {e}")))?;
        Ok(data)
    }

    /// Delete one chunk of object paths with a single multi-object request.
    pub(crate) async fn delete_paths(&self, paths: &[String]) -> DatastoreResult<()> {
        let faults = self
            .client()
            .delete_objects(self.bucket(), paths)
            .await
            .map_err(translate)?;
        let failed: Vec<String> = faults
            .iter()
            .filter(|fault| !fault.is_not_found())
            .map(ToString::to_string)
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DatastoreError::Backend(format!(
                "failed to delete objects: [{}]",
                failed.join(", ")
            )))
        }
    }
}

#[async_trait]
impl Datastore for S3Datastore {
    type Results = QueryResults;

    async fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
        let path = self.paths().path_of(key);
        self.client()
            .put_object(self.bucket(), &path, value.to_vec())
            .await
            .map_err(translate)
    }

    async fn get(&self, key: &Key) -> DatastoreResult<Vec<u8>> {
        self.fetch(&self.paths().path_of(key)).await
    }

    async fn has(&self, key: &Key) -> DatastoreResult<bool> {
        match self.get_size(key).await {
            Ok(_) => Ok(true),
            Err(DatastoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_size(&self, key: &Key) -> DatastoreResult<u64> {
        let path = self.paths().path_of(key);
        let meta = self
            .client()
            .head_object(self.bucket(), &path)
            .await
            .map_err(translate)?;
        Ok(meta.content_length)
    }

    async fn delete(&self, key: &Key) -> DatastoreResult<()> {
        let path = self.paths().path_of(key);
        match self.client().delete_object(self.bucket(), &path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(translate(e)),
        }
    }

    async fn query(&self, query: Query) -> DatastoreResult<QueryResults> {
        if query.is_refined() {
            return Err(DatastoreError::UnsupportedQuery(
                "filters or orders are not supported".into(),
            ));
        }
        let request = ListRequest {
            bucket: self.bucket().to_string(),
            prefix: self.paths().list_prefix(&query.prefix),
            max_keys: page_size(&query),
            continuation_token: None,
        };
        debug!(prefix = %request.prefix, max_keys = request.max_keys, "listing first page");
        let first = self
            .client()
            .list_objects_v2(&request)
            .await
            .map_err(translate)?;
        Ok(QueryResults::new(self.clone(), request, &query, first))
    }
}

#[async_trait]
impl Batching for S3Datastore {
    type Batch = S3Batch;

    async fn batch(&self) -> DatastoreResult<S3Batch> {
        Ok(S3Batch::new(self.clone()))
    }
}

impl std::fmt::Debug for S3Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Datastore")
            .field("bucket", &self.shared.bucket)
            .field("root", &self.shared.paths.root())
            .field("workers", &self.shared.workers)
            .finish()
    }
}
