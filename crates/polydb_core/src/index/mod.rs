//! Secondary indexes.
//!
//! An index maps a key derived from each document to the set of document
//! ids currently holding that key. Indexes live in memory; the database
//! seeds them from storage when it opens and keeps them in step with every
//! save and delete afterwards.
//!
//! # Index Types
//!
//! - [`SecondaryIndex`]: hash buckets keyed through a [`KeyComparer`]
//!
//! # Attaching
//!
//! Indexes are attached when the database is built and cannot be added
//! later. Querying an index that was not attached fails with
//! [`CoreError::IndexNotAttached`](crate::CoreError::IndexNotAttached).

mod comparer;
mod secondary;

pub use comparer::{CaseInsensitive, KeyComparer, KeyRef, NaturalEq};
pub use secondary::{SecondaryIndex, SecondaryIndexBuilder};

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use polydb_storage::DocId;

use crate::error::CoreResult;
use crate::universe::TypeKey;

/// A value an index can derive from documents.
///
/// Blanket-implemented. Equality and hashing come from the index's
/// [`KeyComparer`], so the key itself only needs to be cloneable.
pub trait IndexKey: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> IndexKey for T {}

/// Process-unique index handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(u64);

impl IndexId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index#{}", self.0)
    }
}

/// Type-erased view of an index, as the database drives it.
///
/// The database calls [`update_any`](Self::update_any) for every saved
/// document assignable to [`declared_type`](Self::declared_type), and
/// [`remove_id`](Self::remove_id) for every deleted id regardless of type.
pub trait DocumentIndex: Send + Sync {
    /// Handle used to check attachment.
    fn index_id(&self) -> IndexId;

    /// Name for logs and errors.
    fn name(&self) -> &str;

    /// The document view the index derives keys from.
    fn declared_type(&self) -> TypeKey;

    /// Indexes `doc` under `id`. Returns whether the index changed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`](crate::CoreError::TypeMismatch) if
    /// `doc` is not of the declared type.
    fn update_any(&self, id: &DocId, doc: &dyn Any) -> CoreResult<bool>;

    /// Drops `id` from the index. Returns whether it was present.
    fn remove_id(&self, id: &DocId) -> bool;

    /// Number of indexed documents.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_ids_are_unique() {
        let a = IndexId::next();
        let b = IndexId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
        assert!(a.to_string().starts_with("index#"));
    }
}
