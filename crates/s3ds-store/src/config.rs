use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatastoreError, DatastoreResult};

/// Worker pool size used when `workers` is unset or zero.
pub const DEFAULT_WORKERS: usize = 100;

/// Connection and layout settings for an S3-backed datastore.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...).
    pub endpoint: Option<String>,
    /// Prefix applied to every key.
    pub root_directory: String,
    /// Concurrent workers per batch commit. Zero means [`DEFAULT_WORKERS`].
    pub workers: usize,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_root_directory(mut self, root: impl Into<String>) -> Self {
        self.root_directory = root.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Worker count with the default applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            DEFAULT_WORKERS
        } else {
            self.workers
        }
    }

    /// Returns `true` if static credentials were supplied.
    pub fn has_static_credentials(&self) -> bool {
        !self.access_key.is_empty()
    }

    pub fn validate(&self) -> DatastoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(DatastoreError::Config("bucket name is required".into()));
        }
        if self.access_key.is_empty() != self.secret_key.is_empty() {
            return Err(DatastoreError::Config(
                "access_key and secret_key must be set together".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> DatastoreResult<Self> {
        toml::from_str(content).map_err(|e| DatastoreError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> DatastoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| DatastoreError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> DatastoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("S3Config")
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &self.session_token.as_deref().map(redact))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("root_directory", &self.root_directory)
            .field("workers", &self.workers)
            .finish()
    }
}
