use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Result ordering requested by a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    KeyAscending,
    KeyDescending,
    ValueAscending,
    ValueDescending,
}

/// Result filter requested by a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Keep entries whose key equals the given key.
    KeyEquals(Key),
    /// Keep entries whose key starts with the given string.
    KeyPrefix(String),
    /// Keep entries whose value equals the given bytes.
    ValueEquals(Vec<u8>),
}

/// A prefix listing request.
///
/// `limit == 0` means "no limit". `offset` skips that many entries of the
/// underlying listing before the first one is returned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub prefix: String,
    pub keys_only: bool,
    pub limit: usize,
    pub offset: usize,
    pub orders: Vec<Order>,
    pub filters: Vec<Filter>,
}

impl Query {
    /// Query everything below `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Returns `true` if the query asks for ordering or filtering.
    pub fn is_refined(&self) -> bool {
        !self.orders.is_empty() || !self.filters.is_empty()
    }
}

/// One element of a query result sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Key,
    /// Present unless the query was keys-only.
    pub value: Option<Vec<u8>>,
    /// Object size as reported by the listing, when known.
    pub size: Option<u64>,
}
