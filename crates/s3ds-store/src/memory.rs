use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{
    DeleteFault, ListPage, ListRequest, ObjectBody, ObjectClient, ObjectMeta, ObjectSummary,
    RemoteError, RemoteResult, DELETE_MAX_OBJECTS, LIST_MAX_KEYS,
};

/// Snapshot of how many calls of each kind a client has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub put: usize,
    pub get: usize,
    pub head: usize,
    pub delete: usize,
    pub delete_many: usize,
    pub list: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.put + self.get + self.head + self.delete + self.delete_many + self.list
    }
}

#[derive(Default)]
struct Counters {
    put: AtomicUsize,
    get: AtomicUsize,
    head: AtomicUsize,
    delete: AtomicUsize,
    delete_many: AtomicUsize,
    list: AtomicUsize,
}

/// Decrements the in-flight gauge when a call finishes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory, map-based object store speaking the [`ObjectClient`] API.
///
/// Intended for tests and embedding. Buckets are created on first write.
/// Listing follows S3 semantics: lexicographic order, at most
/// [`LIST_MAX_KEYS`] per page, continuation tokens resuming after the last
/// returned object. Faults can be injected per object path or for listings,
/// and every call is counted.
#[derive(Default)]
pub struct InMemoryObjectClient {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    faults: RwLock<HashMap<String, RemoteError>>,
    list_fault: RwLock<Option<(usize, RemoteError)>>,
    latency: Option<Duration>,
    counters: Counters,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryObjectClient {
    /// Create a new empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` while it is counted as in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store an object directly, bypassing call accounting.
    pub fn insert(&self, bucket: &str, path: &str, data: impl Into<Vec<u8>>) {
        self.buckets
            .write()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string(), data.into());
    }

    /// Read an object directly, bypassing call accounting.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .and_then(|objects| objects.get(path).cloned())
    }

    /// Sorted object paths in a bucket.
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of objects in a bucket.
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map_or(0, BTreeMap::len)
    }

    /// Make every call touching `path` fail with `err`.
    pub fn inject_fault(&self, path: &str, err: RemoteError) {
        self.faults
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), err);
    }

    pub fn clear_fault(&self, path: &str) {
        self.faults.write().expect("lock poisoned").remove(path);
    }

    /// Let `successes` listing calls through, then fail every later one.
    pub fn fail_list_after(&self, successes: usize, err: RemoteError) {
        *self.list_fault.write().expect("lock poisoned") = Some((successes, err));
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            put: c.put.load(Ordering::SeqCst),
            get: c.get.load(Ordering::SeqCst),
            head: c.head.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            delete_many: c.delete_many.load(Ordering::SeqCst),
            list: c.list.load(Ordering::SeqCst),
        }
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin(&self, counter: &AtomicUsize) -> InFlight<'_> {
        counter.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }

    fn check(&self, path: &str) -> RemoteResult<()> {
        match self.faults.read().expect("lock poisoned").get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn put_object(&self, bucket: &str, path: &str, body: Vec<u8>) -> RemoteResult<()> {
        let _call = self.begin(&self.counters.put).await;
        self.check(path)?;
        self.insert(bucket, path, body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectBody> {
        let _call = self.begin(&self.counters.get).await;
        self.check(path)?;
        let data = self
            .object(bucket, path)
            .ok_or_else(|| RemoteError::no_such_key(path))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn head_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectMeta> {
        let _call = self.begin(&self.counters.head).await;
        self.check(path)?;
        let data = self
            .object(bucket, path)
            .ok_or_else(|| RemoteError::not_found(path))?;
        Ok(ObjectMeta {
            content_length: data.len() as u64,
        })
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> RemoteResult<()> {
        let _call = self.begin(&self.counters.delete).await;
        self.check(path)?;
        if let Some(objects) = self.buckets.write().expect("lock poisoned").get_mut(bucket) {
            objects.remove(path);
        }
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, paths: &[String]) -> RemoteResult<Vec<DeleteFault>> {
        let _call = self.begin(&self.counters.delete_many).await;
        if paths.len() > DELETE_MAX_OBJECTS {
            return Err(RemoteError::new(
                "MalformedXML",
                format!("{} objects exceeds the limit of {DELETE_MAX_OBJECTS}", paths.len()),
            ));
        }
        let mut faults = Vec::new();
        for path in paths {
            if let Err(err) = self.check(path) {
                faults.push(DeleteFault {
                    path: path.clone(),
                    code: err.code,
                    message: err.message,
                });
                continue;
            }
            if let Some(objects) = self.buckets.write().expect("lock poisoned").get_mut(bucket) {
                objects.remove(path);
            }
        }
        Ok(faults)
    }

    async fn list_objects_v2(&self, request: &ListRequest) -> RemoteResult<ListPage> {
        let _call = self.begin(&self.counters.list).await;
        let served = self.counters.list.load(Ordering::SeqCst);
        if let Some((successes, err)) = self.list_fault.read().expect("lock poisoned").as_ref() {
            if served > *successes {
                return Err(err.clone());
            }
        }

        let max_keys = request.max_keys.clamp(1, LIST_MAX_KEYS);
        let buckets = self.buckets.read().expect("lock poisoned");
        let Some(objects) = buckets.get(&request.bucket) else {
            return Ok(ListPage::default());
        };

        let mut matching = objects
            .iter()
            .filter(|(path, _)| path.starts_with(&request.prefix))
            .filter(|(path, _)| match &request.continuation_token {
                Some(after) => path.as_str() > after.as_str(),
                None => true,
            })
            .map(|(path, data)| ObjectSummary {
                path: path.clone(),
                size: Some(data.len() as u64),
            });

        let page: Vec<ObjectSummary> = matching.by_ref().take(max_keys).collect();
        let truncated = matching.next().is_some();
        let next_continuation_token = if truncated {
            page.last().map(|obj| obj.path.clone())
        } else {
            None
        };
        Ok(ListPage {
            objects: page,
            truncated,
            next_continuation_token,
        })
    }
}

impl std::fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket_count = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryObjectClient")
            .field("bucket_count", &bucket_count)
            .field("calls", &self.calls())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn list(bucket: &str, prefix: &str, max_keys: usize, token: Option<String>) -> ListRequest {
        ListRequest {
            bucket: bucket.into(),
            prefix: prefix.into(),
            max_keys,
            continuation_token: token,
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let client = InMemoryObjectClient::new();
        client.put_object("b", "k", b"value".to_vec()).await.unwrap();
        let mut body = client.get_object("b", "k").await.unwrap();
        let mut data = Vec::new();
        body.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"value");
    }

    #[tokio::test]
    async fn missing_object_codes() {
        let client = InMemoryObjectClient::new();
        let err = client.get_object("b", "nope").await.err().unwrap();
        assert_eq!(err.code, RemoteError::NO_SUCH_KEY);
        let err = client.head_object("b", "nope").await.unwrap_err();
        assert_eq!(err.code, RemoteError::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let client = InMemoryObjectClient::new();
        client.insert("b", "k", "v");
        client.delete_object("b", "k").await.unwrap();
        client.delete_object("b", "k").await.unwrap();
        assert_eq!(client.len("b"), 0);
    }

    #[tokio::test]
    async fn listing_pages_in_order() {
        let client = InMemoryObjectClient::new();
        for name in ["p/c", "p/a", "p/b", "q/z"] {
            client.insert("b", name, "x");
        }
        let first = client.list_objects_v2(&list("b", "p/", 2, None)).await.unwrap();
        let paths: Vec<_> = first.objects.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["p/a", "p/b"]);
        assert!(first.truncated);

        let second = client
            .list_objects_v2(&list("b", "p/", 2, first.next_continuation_token))
            .await
            .unwrap();
        let paths: Vec<_> = second.objects.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["p/c"]);
        assert!(!second.truncated);
        assert!(second.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn exact_page_is_not_truncated() {
        let client = InMemoryObjectClient::new();
        client.insert("b", "a", "1");
        client.insert("b", "b", "2");
        let page = client.list_objects_v2(&list("b", "", 2, None)).await.unwrap();
        assert_eq!(page.objects.len(), 2);
        assert!(!page.truncated);
    }

    #[tokio::test]
    async fn delete_objects_enforces_limit() {
        let client = InMemoryObjectClient::new();
        let paths: Vec<String> = (0..=DELETE_MAX_OBJECTS).map(|i| format!("k{i}")).collect();
        let err = client.delete_objects("b", &paths).await.unwrap_err();
        assert_eq!(err.code, "MalformedXML");
    }

    #[tokio::test]
    async fn delete_objects_reports_per_object_faults() {
        let client = InMemoryObjectClient::new();
        client.insert("b", "ok", "1");
        client.insert("b", "locked", "2");
        client.inject_fault("locked", RemoteError::new("AccessDenied", "locked"));
        let faults = client
            .delete_objects("b", &["ok".to_string(), "locked".to_string()])
            .await
            .unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].path, "locked");
        assert_eq!(client.paths("b"), vec!["locked".to_string()]);
    }

    #[tokio::test]
    async fn injected_faults_and_counters() {
        let client = InMemoryObjectClient::new();
        client.inject_fault("bad", RemoteError::new("InternalError", "boom"));
        assert!(client.put_object("b", "bad", vec![]).await.is_err());
        client.clear_fault("bad");
        client.put_object("b", "bad", vec![]).await.unwrap();
        let calls = client.calls();
        assert_eq!(calls.put, 2);
        assert_eq!(calls.total(), 2);
    }

    #[tokio::test]
    async fn list_fault_after_successes() {
        let client = InMemoryObjectClient::new();
        client.fail_list_after(1, RemoteError::new("SlowDown", "busy"));
        assert!(client.list_objects_v2(&list("b", "", 10, None)).await.is_ok());
        assert!(client.list_objects_v2(&list("b", "", 10, None)).await.is_err());
    }

    #[tokio::test]
    async fn tracks_concurrency_high_water_mark() {
        let client = Arc::new(InMemoryObjectClient::new().with_latency(Duration::from_millis(20)));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client.put_object("b", &format!("k{i}"), vec![]).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.expect("task should not panic");
        }
        assert!(client.max_in_flight() >= 2);
        assert!(client.max_in_flight() <= 4);
        assert_eq!(client.len("b"), 4);
    }

    #[test]
    fn debug_format() {
        let client = InMemoryObjectClient::new();
        client.insert("b", "k", "v");
        let debug = format!("{client:?}");
        assert!(debug.contains("InMemoryObjectClient"));
        assert!(debug.contains("bucket_count"));
    }
}
