use async_trait::async_trait;
use s3ds_types::{Entry, Query};
use tracing::{debug, warn};

use crate::client::{ListPage, ListRequest, ObjectSummary, LIST_MAX_KEYS};
use crate::datastore::S3Datastore;
use crate::error::DatastoreResult;
use crate::traits::ResultSet;
use crate::translate::translate;

/// Page size for the first listing request of `query`.
///
/// Only `offset + limit` entries can ever be returned, so small queries ask
/// for no more than that. Unbounded or oversized queries use the remote
/// maximum.
pub fn page_size(query: &Query) -> usize {
    let wanted = query.limit.saturating_add(query.offset);
    if wanted == 0 || wanted > LIST_MAX_KEYS {
        LIST_MAX_KEYS
    } else {
        wanted
    }
}

/// What the cursor needs next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorStep {
    /// The next listed object.
    Yield(ObjectSummary),
    /// The page is used up; fetch the continuation page for this token.
    Fetch(String),
    /// No more objects.
    Done,
}

/// Position within a paginated listing.
///
/// The cursor never performs I/O: [`QueryCursor::step`] says whether an
/// object is available or a page must be fetched, and
/// [`QueryCursor::load`] installs the fetched page. The index is carried
/// across pages, so an offset larger than a page skips into later pages.
#[derive(Clone, Debug)]
pub struct QueryCursor {
    page: Vec<ObjectSummary>,
    index: usize,
    continuation: Option<String>,
    truncated: bool,
    exhausted: bool,
}

impl QueryCursor {
    /// Start at `offset` within the first page.
    pub fn new(first: ListPage, offset: usize) -> Self {
        Self {
            page: first.objects,
            index: offset,
            continuation: first.next_continuation_token,
            truncated: first.truncated,
            exhausted: false,
        }
    }

    pub fn step(&mut self) -> CursorStep {
        if self.exhausted {
            return CursorStep::Done;
        }
        if let Some(object) = self.page.get(self.index) {
            self.index += 1;
            return CursorStep::Yield(object.clone());
        }
        if !self.truncated {
            self.finish();
            return CursorStep::Done;
        }
        match &self.continuation {
            Some(token) => CursorStep::Fetch(token.clone()),
            None => {
                warn!("listing truncated without a continuation token, ending query");
                self.finish();
                CursorStep::Done
            }
        }
    }

    /// Replace the used-up page with its continuation.
    pub fn load(&mut self, next: ListPage) {
        self.index = self.index.saturating_sub(self.page.len());
        self.page = next.objects;
        self.truncated = next.truncated;
        self.continuation = next.next_continuation_token;
    }

    /// Drop all state; every later step is [`CursorStep::Done`].
    pub fn finish(&mut self) {
        self.exhausted = true;
        self.page.clear();
        self.continuation = None;
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Lazy entry sequence over a prefix listing.
///
/// Continuation pages are fetched on demand. Unless the query is keys-only,
/// each entry's value is downloaded when the entry is produced. The first
/// fault ends the sequence.
pub struct QueryResults {
    store: S3Datastore,
    request: ListRequest,
    keys_only: bool,
    limit: usize,
    returned: usize,
    cursor: QueryCursor,
}

impl QueryResults {
    pub(crate) fn new(store: S3Datastore, request: ListRequest, query: &Query, first: ListPage) -> Self {
        Self {
            store,
            request,
            keys_only: query.keys_only,
            limit: query.limit,
            returned: 0,
            cursor: QueryCursor::new(first, query.offset),
        }
    }

    /// Collect the remaining entries, failing on the first fault.
    pub async fn rest(mut self) -> DatastoreResult<Vec<Entry>> {
        let mut entries = Vec::new();
        while let Some(entry) = ResultSet::next(&mut self).await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    async fn fetch_page(&mut self, token: String) -> DatastoreResult<()> {
        let request = ListRequest {
            max_keys: LIST_MAX_KEYS,
            continuation_token: Some(token),
            ..self.request.clone()
        };
        debug!(prefix = %request.prefix, "fetching continuation page");
        let page = self
            .store
            .client()
            .list_objects_v2(&request)
            .await
            .map_err(translate)?;
        self.cursor.load(page);
        Ok(())
    }
}

#[async_trait]
impl ResultSet for QueryResults {
    async fn next(&mut self) -> Option<DatastoreResult<Entry>> {
        if self.limit > 0 && self.returned >= self.limit {
            self.cursor.finish();
            return None;
        }
        loop {
            match self.cursor.step() {
                CursorStep::Done => return None,
                CursorStep::Fetch(token) => {
                    if let Err(e) = self.fetch_page(token).await {
                        warn!(error = %e, "query listing failed");
                        self.cursor.finish();
                        return Some(Err(e));
                    }
                }
                CursorStep::Yield(object) => {
                    let key = self.store.paths().to_key(&object.path);
                    let value = if self.keys_only {
                        None
                    } else {
                        match self.store.fetch(&object.path).await {
                            Ok(value) => Some(value),
                            Err(e) => {
                                warn!(key = %key, error = %e, "query value fetch failed");
                                self.cursor.finish();
                                return Some(Err(e));
                            }
                        }
                    };
                    self.returned += 1;
                    return Some(Ok(Entry {
                        key,
                        value,
                        size: object.size,
                    }));
                }
            }
        }
    }

    fn close(&mut self) -> DatastoreResult<()> {
        self.cursor.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::RemoteError;
    use crate::config::S3Config;
    use crate::error::DatastoreError;
    use crate::memory::InMemoryObjectClient;
    use crate::traits::Datastore;
    use s3ds_types::{Filter, Key, Order};

    const BUCKET: &str = "q";

    fn summary(path: &str) -> ObjectSummary {
        ObjectSummary {
            path: path.into(),
            size: None,
        }
    }

    fn page(paths: &[&str], token: Option<&str>) -> ListPage {
        ListPage {
            objects: paths.iter().map(|p| summary(p)).collect(),
            truncated: token.is_some(),
            next_continuation_token: token.map(String::from),
        }
    }

    fn setup(count: usize) -> (Arc<InMemoryObjectClient>, S3Datastore) {
        let client = Arc::new(InMemoryObjectClient::new());
        for i in 0..count {
            client.insert(BUCKET, &format!("root/item/{i:05}"), format!("v{i}"));
        }
        client.insert(BUCKET, "elsewhere/x", "outside");
        let config = S3Config::new(BUCKET).with_root_directory("root");
        let store = S3Datastore::new(config, client.clone()).unwrap();
        (client, store)
    }

    // -----------------------------------------------------------------------
    // Page sizing
    // -----------------------------------------------------------------------

    #[test]
    fn page_size_bounds() {
        assert_eq!(page_size(&Query::new("")), LIST_MAX_KEYS);
        assert_eq!(page_size(&Query::new("").with_limit(10).with_offset(5)), 15);
        assert_eq!(page_size(&Query::new("").with_offset(3)), 3);
        assert_eq!(page_size(&Query::new("").with_limit(5000)), LIST_MAX_KEYS);
        assert_eq!(page_size(&Query::new("").with_limit(usize::MAX).with_offset(1)), LIST_MAX_KEYS);
    }

    // -----------------------------------------------------------------------
    // Cursor state machine
    // -----------------------------------------------------------------------

    #[test]
    fn cursor_walks_pages() {
        let mut cursor = QueryCursor::new(page(&["a", "b"], Some("t1")), 0);
        assert_eq!(cursor.step(), CursorStep::Yield(summary("a")));
        assert_eq!(cursor.step(), CursorStep::Yield(summary("b")));
        assert_eq!(cursor.step(), CursorStep::Fetch("t1".into()));
        cursor.load(page(&["c"], None));
        assert_eq!(cursor.step(), CursorStep::Yield(summary("c")));
        assert_eq!(cursor.step(), CursorStep::Done);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.step(), CursorStep::Done);
    }

    #[test]
    fn cursor_offset_spans_pages() {
        let mut cursor = QueryCursor::new(page(&["a", "b"], Some("t1")), 3);
        assert_eq!(cursor.step(), CursorStep::Fetch("t1".into()));
        cursor.load(page(&["c", "d"], None));
        assert_eq!(cursor.step(), CursorStep::Yield(summary("d")));
        assert_eq!(cursor.step(), CursorStep::Done);
    }

    #[test]
    fn cursor_empty_first_page() {
        let mut cursor = QueryCursor::new(ListPage::default(), 0);
        assert_eq!(cursor.step(), CursorStep::Done);
    }

    #[test]
    fn cursor_truncated_without_token_ends() {
        let first = ListPage {
            objects: vec![summary("a")],
            truncated: true,
            next_continuation_token: None,
        };
        let mut cursor = QueryCursor::new(first, 0);
        assert_eq!(cursor.step(), CursorStep::Yield(summary("a")));
        assert_eq!(cursor.step(), CursorStep::Done);
    }

    #[test]
    fn cursor_skips_empty_continuation_pages() {
        let mut cursor = QueryCursor::new(page(&[], Some("t1")), 0);
        assert_eq!(cursor.step(), CursorStep::Fetch("t1".into()));
        cursor.load(page(&[], Some("t2")));
        assert_eq!(cursor.step(), CursorStep::Fetch("t2".into()));
        cursor.load(page(&["z"], None));
        assert_eq!(cursor.step(), CursorStep::Yield(summary("z")));
    }

    // -----------------------------------------------------------------------
    // Query results against a store
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn returns_every_entry_across_pages() {
        let (client, store) = setup(2 * LIST_MAX_KEYS + 5);
        let entries = store.query(Query::new("/item")).await.unwrap().rest().await.unwrap();
        assert_eq!(entries.len(), 2 * LIST_MAX_KEYS + 5);
        assert_eq!(entries[0].key, Key::new("/item/00000"));
        assert_eq!(entries[0].value.as_deref(), Some(&b"v0"[..]));
        let last = &entries[2 * LIST_MAX_KEYS + 4];
        assert_eq!(last.key, Key::new(format!("/item/{:05}", 2 * LIST_MAX_KEYS + 4)));
        assert_eq!(last.value.as_deref(), Some(format!("v{}", 2 * LIST_MAX_KEYS + 4).as_bytes()));
        assert_eq!(client.calls().list, 3);
        assert_eq!(client.calls().get, 2 * LIST_MAX_KEYS + 5);
    }

    #[tokio::test]
    async fn keys_only_skips_downloads() {
        let (client, store) = setup(3);
        let entries = store
            .query(Query::new("").keys_only())
            .await
            .unwrap()
            .rest()
            .await
            .unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str().to_string()).collect();
        assert_eq!(keys, vec!["/item/00000", "/item/00001", "/item/00002"]);
        assert!(entries.iter().all(|e| e.value.is_none()));
        assert_eq!(entries[0].size, Some(2));
        assert_eq!(client.calls().get, 0);
    }

    #[tokio::test]
    async fn listed_keys_resolve_with_get() {
        let (_, store) = setup(2);
        let entries = store.query(Query::new("").keys_only()).await.unwrap().rest().await.unwrap();
        for entry in entries {
            assert!(store.has(&entry.key).await.unwrap());
        }
    }

    #[tokio::test]
    async fn limit_and_offset() {
        let (client, store) = setup(10);
        let entries = store
            .query(Query::new("").with_offset(2).with_limit(3))
            .await
            .unwrap()
            .rest()
            .await
            .unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.name().to_string()).collect();
        assert_eq!(keys, vec!["00002", "00003", "00004"]);
        assert_eq!(client.calls().list, 1);
    }

    #[tokio::test]
    async fn limit_stops_before_next_page() {
        let (client, store) = setup(LIST_MAX_KEYS + 10);
        let entries = store
            .query(Query::new("").keys_only().with_limit(LIST_MAX_KEYS))
            .await
            .unwrap()
            .rest()
            .await
            .unwrap();
        assert_eq!(entries.len(), LIST_MAX_KEYS);
        assert_eq!(client.calls().list, 1);
    }

    #[tokio::test]
    async fn offset_past_first_page() {
        let (_, store) = setup(LIST_MAX_KEYS + 3);
        let entries = store
            .query(Query::new("").keys_only().with_offset(LIST_MAX_KEYS + 1))
            .await
            .unwrap()
            .rest()
            .await
            .unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.name().to_string()).collect();
        assert_eq!(keys, vec![format!("{:05}", LIST_MAX_KEYS + 1), format!("{:05}", LIST_MAX_KEYS + 2)]);
    }

    #[tokio::test]
    async fn empty_prefix_stays_inside_root() {
        let (_, store) = setup(1);
        let entries = store.query(Query::new("")).await.unwrap().rest().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.iter().all(|e| e.value.as_deref() != Some(&b"outside"[..])));
    }

    #[tokio::test]
    async fn orders_and_filters_rejected_without_remote_calls() {
        let (client, store) = setup(1);
        let ordered = store.query(Query::new("").with_order(Order::KeyAscending)).await;
        assert!(matches!(ordered, Err(DatastoreError::UnsupportedQuery(_))));
        let filtered = store
            .query(Query::new("").with_filter(Filter::KeyPrefix("/a".into())))
            .await;
        assert!(matches!(filtered, Err(DatastoreError::UnsupportedQuery(_))));
        assert_eq!(client.calls().total(), 0);
    }

    #[tokio::test]
    async fn first_page_fault_fails_query() {
        let (client, store) = setup(1);
        client.fail_list_after(0, RemoteError::new("AccessDenied", "no list"));
        let err = store.query(Query::new("")).await.err().unwrap();
        assert!(matches!(err, DatastoreError::Backend(_)));
    }

    #[tokio::test]
    async fn continuation_fault_surfaces_once() {
        let (client, store) = setup(LIST_MAX_KEYS + 1);
        client.fail_list_after(1, RemoteError::new("SlowDown", "busy"));
        let mut results = store.query(Query::new("").keys_only()).await.unwrap();
        for _ in 0..LIST_MAX_KEYS {
            assert!(results.next().await.unwrap().is_ok());
        }
        let err = results.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("SlowDown"));
        assert!(results.next().await.is_none());
    }

    #[tokio::test]
    async fn value_fetch_fault_aborts_sequence() {
        let (client, store) = setup(3);
        client.inject_fault("root/item/00001", RemoteError::new("InternalError", "boom"));
        let mut results = store.query(Query::new("")).await.unwrap();
        assert!(results.next().await.unwrap().is_ok());
        assert!(results.next().await.unwrap().is_err());
        assert!(results.next().await.is_none());
    }

    #[tokio::test]
    async fn close_is_repeatable() {
        let (_, store) = setup(3);
        let mut results = store.query(Query::new("")).await.unwrap();
        results.close().unwrap();
        results.close().unwrap();
        assert!(results.next().await.is_none());
    }
}
