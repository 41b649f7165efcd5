//! Side-effect stores: a key-value table and an object store.
//!
//! Both the queue consumers and the synchronous request handlers write
//! here. There are no transactions and no cross-key ordering: the last
//! writer of a key wins. Writes made while processing a queue message may
//! be repeated on redelivery, so `put` reports whether the value actually
//! changed.
//!
//! ## Example
//!
//! ```
//! use motorshop_pipeline::store::{InMemoryTable, KeyValueStore, PutOutcome, StoreKey};
//!
//! let table = InMemoryTable::new();
//! let key = StoreKey::new("catalog", "SuperBike");
//! assert_eq!(table.put(&key, b"v1".to_vec()).unwrap(), PutOutcome::Created);
//! assert_eq!(table.put(&key, b"v1".to_vec()).unwrap(), PutOutcome::Unchanged);
//! assert_eq!(table.get(&key).unwrap(), b"v1");
//! ```

mod in_memory;
mod record;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// Compound table key: partition plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub partition: String,
    pub sort: String,
}

impl StoreKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// What a `put` did to the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Overwritten,
    /// Identical bytes were already stored.
    Unchanged,
}

/// Error type for store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record serialization error: {0}")]
    Serde(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) => ErrorKind::TransientInfra,
            StoreError::NotFound(_) | StoreError::Serde(_) => ErrorKind::PoisonMessage,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

pub use in_memory::{InMemoryObjectStore, InMemoryTable};
pub use record::{Record, RecordsExt};
pub use store::{KeyValueStore, ObjectStore};
