//! Write-through cache over a durable backend.

use crate::backend::{DocId, RecordIter, StorageBackend, StorageRecord};
use crate::error::StorageResult;
use crate::memory::InMemoryBackend;
use std::time::Instant;
use tracing::info;

/// An in-memory mirror in front of a durable backend.
///
/// - Opening hydrates the mirror from the durable backend, once, before
///   returning.
/// - Writes and removals go to the durable backend first, then the mirror.
/// - Every read is served from the mirror; the durable backend is never read
///   after hydration.
///
/// If the process dies between the durable write and the mirror update the
/// mirror is stale only until the next open re-hydrates it.
///
/// # Example
///
/// ```rust
/// use polydb_storage::{InMemoryBackend, StorageBackend, WriteThroughBackend};
///
/// let cached = WriteThroughBackend::open(InMemoryBackend::new()).unwrap();
/// assert_eq!(cached.mirror().len(), 0);
/// ```
#[derive(Debug)]
pub struct WriteThroughBackend<B: StorageBackend> {
    durable: B,
    mirror: InMemoryBackend,
}

impl<B: StorageBackend> WriteThroughBackend<B> {
    /// Wraps `durable`, copying everything it holds into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while enumerating the durable backend.
    pub fn open(durable: B) -> StorageResult<Self> {
        let started = Instant::now();
        let mirror = InMemoryBackend::new();

        let mut hydrated = 0usize;
        for record in durable.retrieve_all()? {
            mirror.store(&[record?])?;
            hydrated += 1;
        }

        info!(
            documents = hydrated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hydrated write-through cache"
        );
        Ok(Self { durable, mirror })
    }

    /// Returns the durable backend.
    pub fn durable(&self) -> &B {
        &self.durable
    }

    /// Returns the in-memory mirror.
    pub fn mirror(&self) -> &InMemoryBackend {
        &self.mirror
    }

    /// Consumes the cache, returning the durable backend.
    pub fn into_durable(self) -> B {
        self.durable
    }
}

impl<B: StorageBackend> StorageBackend for WriteThroughBackend<B> {
    fn store(&self, records: &[StorageRecord]) -> StorageResult<()> {
        self.durable.store(records)?;
        self.mirror.store(records)
    }

    fn retrieve(&self, key: &DocId) -> StorageResult<Option<String>> {
        self.mirror.retrieve(key)
    }

    fn retrieve_all_of(&self, type_name: &str) -> StorageResult<RecordIter<'_>> {
        self.mirror.retrieve_all_of(type_name)
    }

    fn retrieve_all(&self) -> StorageResult<RecordIter<'_>> {
        self.mirror.retrieve_all()
    }

    fn remove(&self, key: &DocId) -> StorageResult<()> {
        self.durable.remove(key)?;
        self.mirror.remove(key)
    }

    fn type_names(&self) -> StorageResult<Vec<String>> {
        self.mirror.type_names()
    }
}
