//! Storage backend trait definition.

use crate::error::StorageResult;
use std::fmt;

/// Identity of a stored document: its canonical type name plus id string.
///
/// Equality is structural. Two keys naming the same id under different type
/// names are different documents, which is what gives every concrete type its
/// own physical namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId {
    type_name: String,
    id: String,
}

impl DocId {
    /// Creates a document key.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Returns the canonical type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the identity string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.id)
    }
}

/// A serialized document as the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    /// Where the payload lives.
    pub key: DocId,
    /// Encoded document text, stored verbatim.
    pub payload: String,
}

impl StorageRecord {
    /// Creates a record.
    pub fn new(key: DocId, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
        }
    }
}

/// Lazy sequence of records produced by enumeration.
pub type RecordIter<'a> = Box<dyn Iterator<Item = StorageResult<StorageRecord>> + Send + 'a>;

/// A key-value store for serialized documents.
///
/// # Invariants
///
/// - `(type_name, id)` addresses at most one payload
/// - `store` is an upsert; storing the same key twice keeps the last payload
/// - `retrieve` returns an owned copy of exactly what was last stored
/// - enumeration is a point-in-time snapshot of which documents exist
/// - backends must be `Send + Sync` and safe for concurrent callers
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileSystemBackend`] - For persistent storage
/// - [`super::WriteThroughBackend`] - Memory-speed reads over a durable backend
pub trait StorageBackend: Send + Sync {
    /// Stores (inserts or replaces) every record, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be written. Records before the
    /// failing one stay written.
    fn store(&self, records: &[StorageRecord]) -> StorageResult<()>;

    /// Returns the payload stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn retrieve(&self, key: &DocId) -> StorageResult<Option<String>>;

    /// Enumerates every record stored under one type name.
    ///
    /// # Errors
    ///
    /// Returns an error if the enumeration cannot start; failures while
    /// reading individual records are yielded as items.
    fn retrieve_all_of(&self, type_name: &str) -> StorageResult<RecordIter<'_>>;

    /// Enumerates every record of every type.
    ///
    /// # Errors
    ///
    /// Same as [`StorageBackend::retrieve_all_of`].
    fn retrieve_all(&self) -> StorageResult<RecordIter<'_>>;

    /// Removes the record under `key`. Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &DocId) -> StorageResult<()>;

    /// Returns the type names that currently have a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn type_names(&self) -> StorageResult<Vec<String>>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<B> {
    fn store(&self, records: &[StorageRecord]) -> StorageResult<()> {
        (**self).store(records)
    }

    fn retrieve(&self, key: &DocId) -> StorageResult<Option<String>> {
        (**self).retrieve(key)
    }

    fn retrieve_all_of(&self, type_name: &str) -> StorageResult<RecordIter<'_>> {
        (**self).retrieve_all_of(type_name)
    }

    fn retrieve_all(&self) -> StorageResult<RecordIter<'_>> {
        (**self).retrieve_all()
    }

    fn remove(&self, key: &DocId) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn type_names(&self) -> StorageResult<Vec<String>> {
        (**self).type_names()
    }
}
