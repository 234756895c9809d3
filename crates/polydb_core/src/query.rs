//! Indexed queries.
//!
//! A [`Query`] selects ids from one attached index, loads each document
//! viewed as the index's declared type, and optionally post-filters the
//! loaded documents:
//!
//! ```rust,ignore
//! let adults = db
//!     .query(&by_name)?
//!     .keys(|name| name == "RONNIE")
//!     .filter(|p| p.age >= 18)
//!     .fetch()?;
//! ```
//!
//! Result order is unspecified. Sort explicitly if order matters.

use std::fmt;

use polydb_storage::DocId;
use tracing::debug;

use crate::database::Database;
use crate::document::Document;
use crate::error::CoreResult;
use crate::index::{KeyComparer, KeyRef, SecondaryIndex};

type KeyPredicate<'a, K, C> = Box<dyn Fn(KeyRef<'_, K, C>) -> bool + 'a>;
type DocPredicate<'a, D> = Box<dyn Fn(&D) -> bool + 'a>;

enum Selection<'a, K, C> {
    All,
    Exact(K),
    Keys(KeyPredicate<'a, K, C>),
}

/// A query against one index. Created by [`Database::query`].
pub struct Query<'a, D, K, C>
where
    C: KeyComparer<K>,
{
    db: &'a Database,
    index: &'a SecondaryIndex<D, K, C>,
    selection: Selection<'a, K, C>,
    filter: Option<DocPredicate<'a, D>>,
}

impl<D, K, C> fmt::Debug for Query<'_, D, K, C>
where
    C: KeyComparer<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selection = match self.selection {
            Selection::All => "all",
            Selection::Exact(_) => "exact",
            Selection::Keys(_) => "keys",
        };
        f.debug_struct("Query")
            .field("index", &self.index)
            .field("selection", &selection)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<'a, D, K, C> Query<'a, D, K, C>
where
    D: 'static,
    K: Clone + Send + Sync + 'static,
    C: KeyComparer<K>,
{
    pub(crate) fn new(db: &'a Database, index: &'a SecondaryIndex<D, K, C>) -> Self {
        Self {
            db,
            index,
            selection: Selection::All,
            filter: None,
        }
    }

    /// Selects buckets whose key satisfies `predicate`.
    ///
    /// `==` on the [`KeyRef`] uses the index's comparer.
    #[must_use]
    pub fn keys<P>(mut self, predicate: P) -> Self
    where
        P: Fn(KeyRef<'_, K, C>) -> bool + 'a,
    {
        self.selection = Selection::Keys(Box::new(predicate));
        self
    }

    /// Selects the single bucket equal to `key`.
    #[must_use]
    pub fn exact(mut self, key: K) -> Self {
        self.selection = Selection::Exact(key);
        self
    }

    /// Keeps only loaded documents that satisfy `predicate`.
    #[must_use]
    pub fn filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&D) -> bool + 'a,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn select(&self) -> Vec<DocId> {
        self.db.stats().record_index_query();
        match &self.selection {
            Selection::All => self.index.ids(),
            Selection::Exact(key) => self.index.query_exact(key),
            Selection::Keys(predicate) => self.index.query(|key| predicate(key)),
        }
    }

    /// Loads every selected document that passes the filter.
    ///
    /// Ids whose document vanished between selection and load are skipped.
    fn matches(&self) -> CoreResult<Vec<(DocId, D)>> {
        let mut found = Vec::new();
        for id in self.select() {
            let Some(doc) = self.db.load_view::<D>(&id)? else {
                continue;
            };
            if self.filter.as_ref().is_none_or(|filter| filter(&doc)) {
                found.push((id, doc));
            }
        }
        Ok(found)
    }

    /// Ids of the matching documents.
    ///
    /// Without a document filter this reads only the index.
    ///
    /// # Errors
    ///
    /// Returns an error if a document must be loaded and loading fails.
    pub fn ids(self) -> CoreResult<Vec<DocId>> {
        if self.filter.is_none() {
            return Ok(self.select());
        }
        Ok(self.matches()?.into_iter().map(|(id, _)| id).collect())
    }

    /// The matching documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a selected document cannot be loaded or decoded.
    pub fn fetch(self) -> CoreResult<Vec<D>> {
        Ok(self.matches()?.into_iter().map(|(_, doc)| doc).collect())
    }

    /// Number of matching documents.
    ///
    /// # Errors
    ///
    /// Same as [`Query::ids`].
    pub fn count(self) -> CoreResult<usize> {
        self.ids().map(|ids| ids.len())
    }

    /// Deletes every matching document. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns the first error; earlier deletes stay applied.
    pub fn delete(self) -> CoreResult<usize> {
        let db = self.db;
        let ids = self.ids()?;
        for id in &ids {
            db.delete_key(id)?;
        }
        Ok(ids.len())
    }
}

impl<D, K, C> Query<'_, D, K, C>
where
    D: Document,
    K: Clone + Send + Sync + 'static,
    C: KeyComparer<K>,
{
    /// Load-mutate-save over every matching document stored as `D` itself.
    ///
    /// Matches stored under another concrete type (reached through an
    /// assignability view) are left untouched. Returns the number of
    /// documents saved.
    ///
    /// # Errors
    ///
    /// Returns the first error; earlier saves stay applied.
    pub fn update<F>(self, mut mutate: F) -> CoreResult<usize>
    where
        F: FnMut(&mut D),
    {
        let mut changed = Vec::new();
        for (id, mut doc) in self.matches()? {
            if id.type_name() != D::TYPE_NAME {
                debug!(key = %id, "skipping update of a document stored under another type");
                continue;
            }
            mutate(&mut doc);
            changed.push((id, doc));
        }
        self.db.rewrite(changed)
    }
}
