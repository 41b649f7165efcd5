//! Typed records on top of a `KeyValueStore`.

use serde::{de::DeserializeOwned, Serialize};

use super::{KeyValueStore, PutOutcome, StoreError, StoreKey};

/// A value stored as JSON under a fixed partition.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Partition every record of this type lives in (e.g. `"catalog"`).
    const PARTITION: &'static str;

    /// Sort key of this record within its partition.
    fn sort_key(&self) -> String;

    fn key(&self) -> StoreKey {
        StoreKey::new(Self::PARTITION, self.sort_key())
    }
}

/// Typed get/put for any `KeyValueStore`.
pub trait RecordsExt: KeyValueStore {
    /// Load a record, `None` if the key is absent.
    fn get_record<R: Record>(&self, sort_key: &str) -> Result<Option<R>, StoreError> {
        match self.get(&StoreKey::new(R::PARTITION, sort_key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Store a record under its own key.
    fn put_record<R: Record>(&self, record: &R) -> Result<PutOutcome, StoreError> {
        self.put(&record.key(), serde_json::to_vec(record)?)
    }
}

impl<S: KeyValueStore + ?Sized> RecordsExt for S {}
