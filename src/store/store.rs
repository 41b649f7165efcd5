//! Store traits.

use std::sync::Arc;

use super::{PutOutcome, StoreError, StoreKey};

/// Key-value table addressed by `(partition, sort)`.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value. Missing keys are `StoreError::NotFound`.
    fn get(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError>;

    /// Insert or replace a value.
    fn put(&self, key: &StoreKey, value: Vec<u8>) -> Result<PutOutcome, StoreError>;

    /// Remove a value. Returns `true` if it existed.
    fn delete(&self, key: &StoreKey) -> Result<bool, StoreError>;
}

/// Flat object store addressed by path-like keys (`prospect/x.pdf`).
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Whether an object exists under `key`.
    fn contains_object(&self, key: &str) -> Result<bool, StoreError> {
        match self.get_object(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome, StoreError>;

    fn delete_object(&self, key: &str) -> Result<bool, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &StoreKey, value: Vec<u8>) -> Result<PutOutcome, StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &StoreKey) -> Result<bool, StoreError> {
        (**self).delete(key)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_object(key)
    }

    fn contains_object(&self, key: &str) -> Result<bool, StoreError> {
        (**self).contains_object(key)
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome, StoreError> {
        (**self).put_object(key, body)
    }

    fn delete_object(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete_object(key)
    }
}
