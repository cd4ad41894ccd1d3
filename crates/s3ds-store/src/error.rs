/// Errors from datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    /// The requested key has no stored value.
    #[error("datastore: key not found")]
    NotFound,

    /// The query asked for something this backend cannot do.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Any other fault reported by the remote store, message preserved.
    #[error("backend error: {0}")]
    Backend(String),

    /// One or more jobs of a batch commit failed.
    #[error(transparent)]
    Batch(#[from] BatchFailure),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O failure (configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatastoreError {
    /// Returns `true` for the canonical "no such key" fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Aggregated failure of a batch commit: one message per failed job.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed batch operation:\n{}", .failures.join("\n"))]
pub struct BatchFailure {
    pub failures: Vec<String>,
}

impl BatchFailure {
    /// Number of failed jobs.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result alias for datastore operations.
pub type DatastoreResult<T> = Result<T, DatastoreError>;
