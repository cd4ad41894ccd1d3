//! Foundation types for the S3 datastore.
//!
//! This crate provides the value types shared by the datastore contract and
//! its S3 implementation. Every other s3ds crate depends on `s3ds-types`.
//!
//! # Key Types
//!
//! - [`Key`] -- Hierarchical, path-cleaned logical identifier for a value
//! - [`Query`] -- Prefix listing request with offset, limit and keys-only mode
//! - [`Order`] / [`Filter`] -- Query refinements (accepted by the type, not by every backend)
//! - [`Entry`] -- One element of a query result sequence

pub mod error;
pub mod key;
pub mod query;

pub use error::TypeError;
pub use key::{clean_path, Key};
pub use query::{Entry, Filter, Order, Query};
