use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("key has no parent: {0}")]
    NoParent(String),

    #[error("invalid key segment: {0:?}")]
    InvalidSegment(String),
}
