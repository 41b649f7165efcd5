//! In-memory stores for tests and single-process deployments.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{KeyValueStore, ObjectStore, PutOutcome, StoreError, StoreKey};

fn upsert<K: Ord>(map: &mut BTreeMap<K, Vec<u8>>, key: K, value: Vec<u8>) -> PutOutcome {
    match map.insert(key, value) {
        None => PutOutcome::Created,
        Some(_) => PutOutcome::Overwritten,
    }
}

/// In-memory table backed by a `BTreeMap`. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryTable {
    name: String,
    rows: Arc<RwLock<BTreeMap<StoreKey, Vec<u8>>>>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::named("table")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<StoreKey, Vec<u8>>>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Unavailable(format!("{}: lock poisoned", self.name)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<StoreKey, Vec<u8>>>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable(format!("{}: lock poisoned", self.name)))
    }

    /// Sort keys present in a partition, in order.
    pub fn partition_keys(&self, partition: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()?
            .keys()
            .filter(|k| k.partition == partition)
            .map(|k| k.sort.clone())
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }
}

impl KeyValueStore for InMemoryTable {
    fn get(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &StoreKey, value: Vec<u8>) -> Result<PutOutcome, StoreError> {
        let mut rows = self.write()?;
        if rows.get(key) == Some(&value) {
            return Ok(PutOutcome::Unchanged);
        }
        Ok(upsert(&mut rows, key.clone(), value))
    }

    fn delete(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.write()?.remove(key).is_some())
    }
}

/// In-memory object store (one bucket). Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.objects
            .read()
            .map_err(|_| StoreError::Unavailable(format!("{}: lock poisoned", self.bucket)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.objects
            .write()
            .map_err(|_| StoreError::Unavailable(format!("{}: lock poisoned", self.bucket)))
    }

    /// Object keys starting with `prefix`, in order.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", self.bucket, key)))
    }

    fn contains_object(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(key))
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome, StoreError> {
        let mut objects = self.write()?;
        if objects.get(key) == Some(&body) {
            return Ok(PutOutcome::Unchanged);
        }
        Ok(upsert(&mut objects, key.to_string(), body))
    }

    fn delete_object(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_reports_put_outcomes() {
        let table = InMemoryTable::new();
        let key = StoreKey::new("order", "o1");

        assert_eq!(table.put(&key, b"a".to_vec()).unwrap(), PutOutcome::Created);
        assert_eq!(table.put(&key, b"a".to_vec()).unwrap(), PutOutcome::Unchanged);
        assert_eq!(table.put(&key, b"b".to_vec()).unwrap(), PutOutcome::Overwritten);
        assert_eq!(table.get(&key).unwrap(), b"b");
    }

    #[test]
    fn table_missing_key_is_not_found() {
        let table = InMemoryTable::new();
        let err = table.get(&StoreKey::new("order", "nope")).unwrap_err();
        assert_eq!(err, StoreError::NotFound("order/nope".into()));
    }

    #[test]
    fn table_delete() {
        let table = InMemoryTable::new();
        let key = StoreKey::new("order", "o1");
        table.put(&key, b"a".to_vec()).unwrap();

        assert!(table.delete(&key).unwrap());
        assert!(!table.delete(&key).unwrap());
        assert!(table.is_empty().unwrap());
    }

    #[test]
    fn partitions_are_isolated() {
        let table = InMemoryTable::new();
        table.put(&StoreKey::new("catalog", "a"), b"1".to_vec()).unwrap();
        table.put(&StoreKey::new("order", "b"), b"2".to_vec()).unwrap();
        table.put(&StoreKey::new("catalog", "c"), b"3".to_vec()).unwrap();

        assert_eq!(table.partition_keys("catalog").unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn clones_share_storage() {
        let table = InMemoryTable::new();
        let other = table.clone();
        table.put(&StoreKey::new("p", "s"), b"x".to_vec()).unwrap();
        assert_eq!(other.len().unwrap(), 1);
    }

    #[test]
    fn object_store_put_get_list() {
        let objects = InMemoryObjectStore::new("bucket");
        objects.put_object("prospect/a.txt", b"A".to_vec()).unwrap();
        objects.put_object("prospect/b.txt", b"B".to_vec()).unwrap();
        objects.put_object("other/c.txt", b"C".to_vec()).unwrap();

        assert_eq!(objects.get_object("prospect/a.txt").unwrap(), b"A");
        assert_eq!(
            objects.list("prospect/").unwrap(),
            vec!["prospect/a.txt", "prospect/b.txt"]
        );
        assert_eq!(
            objects.put_object("prospect/a.txt", b"A".to_vec()).unwrap(),
            PutOutcome::Unchanged
        );
        assert!(matches!(
            objects.get_object("missing"),
            Err(StoreError::NotFound(_))
        ));
        assert!(objects.contains_object("prospect/a.txt").unwrap());
        assert!(!objects.contains_object("missing").unwrap());
    }
}
