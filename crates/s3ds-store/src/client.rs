use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Largest number of keys a single listing call returns.
pub const LIST_MAX_KEYS: usize = 1000;

/// Largest number of objects a single multi-object delete accepts.
pub const DELETE_MAX_OBJECTS: usize = 1000;

/// A fault reported by the remote object store.
///
/// `code` is the machine-readable error code (`NoSuchKey`, `NotFound`,
/// `AccessDenied`, ...). Transport failures that never reached the service
/// use a synthetic code chosen by the client implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    /// Code returned when fetching an object that does not exist.
    pub const NO_SUCH_KEY: &'static str = "NoSuchKey";
    /// Code returned by metadata requests for a missing object.
    pub const NOT_FOUND: &'static str = "NotFound";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn no_such_key(path: &str) -> Self {
        Self::new(Self::NO_SUCH_KEY, format!("the specified key does not exist: {path}"))
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(Self::NOT_FOUND, format!("not found: {path}"))
    }

    /// Returns `true` for either flavour of "object absent".
    pub fn is_not_found(&self) -> bool {
        self.code == Self::NO_SUCH_KEY || self.code == Self::NOT_FOUND
    }
}

/// Result alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Streaming object content. Dropping it releases the response.
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata returned by a HEAD request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_length: u64,
}

/// One object in a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub path: String,
    pub size: Option<u64>,
}

/// A listing request (list-objects v2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    pub max_keys: usize,
    pub continuation_token: Option<String>,
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// More objects exist beyond this page.
    pub truncated: bool,
    /// Token that resumes the listing after this page.
    pub next_continuation_token: Option<String>,
}

/// Per-object failure inside a multi-object delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFault {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl DeleteFault {
    pub fn is_not_found(&self) -> bool {
        self.code == RemoteError::NO_SUCH_KEY || self.code == RemoteError::NOT_FOUND
    }
}

impl fmt::Display for DeleteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.code, self.message)
    }
}

/// The remote object-storage API the datastore is built on.
///
/// Every method is one network round-trip. Implementations never retry and
/// report faults with the service's own error codes.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(&self, bucket: &str, path: &str, body: Vec<u8>) -> RemoteResult<()>;
    async fn get_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectBody>;
    async fn head_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectMeta>;
    async fn delete_object(&self, bucket: &str, path: &str) -> RemoteResult<()>;

    /// Delete up to [`DELETE_MAX_OBJECTS`] objects. Returns the objects that
    /// could not be deleted; an `Err` means the request as a whole failed.
    async fn delete_objects(&self, bucket: &str, paths: &[String]) -> RemoteResult<Vec<DeleteFault>>;

    async fn list_objects_v2(&self, request: &ListRequest) -> RemoteResult<ListPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        assert!(RemoteError::no_such_key("a").is_not_found());
        assert!(RemoteError::not_found("a").is_not_found());
        assert!(!RemoteError::new("AccessDenied", "nope").is_not_found());
    }

    #[test]
    fn remote_error_display() {
        let err = RemoteError::new("SlowDown", "reduce your request rate");
        assert_eq!(err.to_string(), "SlowDown: reduce your request rate");
    }

    #[test]
    fn delete_fault_display() {
        let fault = DeleteFault {
            path: "data/x".into(),
            code: "AccessDenied".into(),
            message: "denied".into(),
        };
        assert_eq!(fault.to_string(), "data/x: AccessDenied: denied");
        assert!(!fault.is_not_found());
    }
}
