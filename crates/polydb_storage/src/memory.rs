//! In-memory storage backend.

use crate::backend::{DocId, RecordIter, StorageBackend, StorageRecord};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory storage backend.
///
/// Payloads are grouped by type name so that per-type enumeration does not
/// scan unrelated documents. This backend is suitable for:
/// - Unit tests
/// - Ephemeral databases that don't need persistence
/// - The hot tier of [`super::WriteThroughBackend`]
///
/// # Thread Safety
///
/// A single `RwLock` guards the map; every operation holds it only for the
/// duration of one map access, and enumeration copies a snapshot out before
/// the lock is released.
///
/// # Example
///
/// ```rust
/// use polydb_storage::{DocId, InMemoryBackend, StorageBackend, StorageRecord};
///
/// let backend = InMemoryBackend::new();
/// backend.store(&[StorageRecord::new(DocId::new("demo.Cat", "1"), "{}")]).unwrap();
/// assert_eq!(backend.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    types: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every document.
    pub fn clear(&self) {
        self.types.write().clear();
    }

    /// Removes every document stored under `type_name`.
    pub fn purge_type(&self, type_name: &str) {
        self.types.write().remove(type_name);
    }

    fn snapshot<'a, I>(entries: I) -> RecordIter<'static>
    where
        I: Iterator<Item = (&'a String, &'a HashMap<String, String>)>,
    {
        let records: Vec<StorageRecord> = entries
            .flat_map(|(type_name, docs)| {
                docs.iter().map(move |(id, payload)| {
                    StorageRecord::new(DocId::new(type_name.clone(), id.clone()), payload.clone())
                })
            })
            .collect();
        Box::new(records.into_iter().map(Ok))
    }
}

impl StorageBackend for InMemoryBackend {
    fn store(&self, records: &[StorageRecord]) -> StorageResult<()> {
        let mut types = self.types.write();
        for record in records {
            types
                .entry(record.key.type_name().to_string())
                .or_default()
                .insert(record.key.id().to_string(), record.payload.clone());
        }
        Ok(())
    }

    fn retrieve(&self, key: &DocId) -> StorageResult<Option<String>> {
        Ok(self
            .types
            .read()
            .get(key.type_name())
            .and_then(|docs| docs.get(key.id()))
            .cloned())
    }

    fn retrieve_all_of(&self, type_name: &str) -> StorageResult<RecordIter<'_>> {
        let types = self.types.read();
        Ok(Self::snapshot(types.get_key_value(type_name).into_iter()))
    }

    fn retrieve_all(&self) -> StorageResult<RecordIter<'_>> {
        let types = self.types.read();
        Ok(Self::snapshot(types.iter()))
    }

    fn remove(&self, key: &DocId) -> StorageResult<()> {
        let mut types = self.types.write();
        if let Some(docs) = types.get_mut(key.type_name()) {
            docs.remove(key.id());
            if docs.is_empty() {
                types.remove(key.type_name());
            }
        }
        Ok(())
    }

    fn type_names(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(type_name: &str, id: &str, payload: &str) -> StorageRecord {
        StorageRecord::new(DocId::new(type_name, id), payload)
    }

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty());
        assert!(backend.type_names().unwrap().is_empty());
    }

    #[test]
    fn memory_store_and_retrieve() {
        let backend = InMemoryBackend::new();
        backend.store(&[record("demo.Cat", "1", "meow")]).unwrap();

        let found = backend.retrieve(&DocId::new("demo.Cat", "1")).unwrap();
        assert_eq!(found.as_deref(), Some("meow"));
    }

    #[test]
    fn memory_retrieve_missing() {
        let backend = InMemoryBackend::new();
        assert!(backend.retrieve(&DocId::new("demo.Cat", "1")).unwrap().is_none());
    }

    #[test]
    fn memory_store_is_upsert() {
        let backend = InMemoryBackend::new();
        backend.store(&[record("demo.Cat", "1", "old")]).unwrap();
        backend.store(&[record("demo.Cat", "1", "new")]).unwrap();

        assert_eq!(backend.len(), 1);
        let found = backend.retrieve(&DocId::new("demo.Cat", "1")).unwrap();
        assert_eq!(found.as_deref(), Some("new"));
    }

    #[test]
    fn memory_types_are_separate_namespaces() {
        let backend = InMemoryBackend::new();
        backend
            .store(&[record("demo.Cat", "1", "cat"), record("demo.Dog", "1", "dog")])
            .unwrap();

        let cats: Vec<_> = backend
            .retrieve_all_of("demo.Cat")
            .unwrap()
            .collect::<StorageResult<_>>()
            .unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].payload, "cat");
        assert_eq!(backend.retrieve_all().unwrap().count(), 2);
    }

    #[test]
    fn memory_enumeration_is_a_snapshot() {
        let backend = InMemoryBackend::new();
        backend.store(&[record("demo.Cat", "1", "a")]).unwrap();

        let iter = backend.retrieve_all_of("demo.Cat").unwrap();
        backend.store(&[record("demo.Cat", "2", "b")]).unwrap();

        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn memory_remove() {
        let backend = InMemoryBackend::new();
        backend.store(&[record("demo.Cat", "1", "a")]).unwrap();
        backend.remove(&DocId::new("demo.Cat", "1")).unwrap();

        assert!(backend.is_empty());
        assert!(backend.type_names().unwrap().is_empty());
        // Removing again is a no-op
        backend.remove(&DocId::new("demo.Cat", "1")).unwrap();
    }

    #[test]
    fn memory_purge_type() {
        let backend = InMemoryBackend::new();
        backend
            .store(&[record("demo.Cat", "1", "a"), record("demo.Dog", "1", "b")])
            .unwrap();
        backend.purge_type("demo.Cat");

        assert_eq!(backend.type_names().unwrap(), vec!["demo.Dog".to_string()]);
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::new();
        backend.store(&[record("demo.Cat", "1", "a")]).unwrap();
        backend.clear();
        assert!(backend.is_empty());
    }
}
