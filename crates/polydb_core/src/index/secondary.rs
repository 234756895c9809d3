//! Hash-bucket secondary index.

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use parking_lot::RwLock;
use polydb_storage::DocId;

use crate::error::{CoreError, CoreResult};
use crate::index::comparer::{KeyComparer, KeyRef, NaturalEq};
use crate::index::{DocumentIndex, IndexId, IndexKey};
use crate::universe::TypeKey;

type KeyFn<D, K> = Box<dyn Fn(&D) -> K + Send + Sync>;
type IncludeFn<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

struct Bucket<K> {
    /// First key that landed in the bucket.
    key: K,
    members: HashSet<DocId>,
}

struct IndexState<K, Q> {
    forward: HashMap<DocId, K>,
    buckets: HashMap<Q, Bucket<K>>,
}

impl<K, Q> Default for IndexState<K, Q> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            buckets: HashMap::new(),
        }
    }
}

impl<K: IndexKey, Q: std::hash::Hash + Eq> IndexState<K, Q> {
    fn is_current<C>(&self, id: &DocId, canonical: &Q, comparer: &C) -> bool
    where
        C: KeyComparer<K, Canonical = Q>,
    {
        let forward_matches = self
            .forward
            .get(id)
            .is_some_and(|key| comparer.canonicalize(key) == *canonical);
        forward_matches
            && self
                .buckets
                .get(canonical)
                .is_some_and(|bucket| bucket.members.contains(id))
    }

    fn detach(&mut self, id: &DocId, canonical: &Q) {
        if let Some(bucket) = self.buckets.get_mut(canonical) {
            bucket.members.remove(id);
            if bucket.members.is_empty() {
                self.buckets.remove(canonical);
            }
        }
    }
}

/// Secondary index over documents of type `D`, keyed by `K` under the
/// equality of comparer `C`.
///
/// The index holds two maps that are kept mutual inverses under one lock:
/// a forward map from document id to its current key, and buckets from
/// canonical key to the ids holding it. Writers check under the shared lock
/// whether anything would change and only then take the exclusive lock,
/// re-checking before they mutate.
///
/// An optional inclusion predicate keeps documents out of the index
/// entirely. Updating a document that no longer passes it removes the
/// document.
///
/// # Example
///
/// ```rust,ignore
/// let by_name = Arc::new(
///     SecondaryIndex::builder("person_by_name", |p: &Person| p.name.clone())
///         .include(|p| p.age >= 13)
///         .comparer(CaseInsensitive)
///         .build(),
/// );
///
/// let db = Database::builder(universe).index(by_name.clone()).open()?;
/// let ronnies = db.query(&by_name)?.keys(|name| name == "RONNIE").fetch()?;
/// ```
pub struct SecondaryIndex<D, K, C = NaturalEq>
where
    C: KeyComparer<K>,
{
    id: IndexId,
    name: String,
    key_fn: KeyFn<D, K>,
    include: Option<IncludeFn<D>>,
    comparer: C,
    state: RwLock<IndexState<K, C::Canonical>>,
}

impl<D, K, C> fmt::Debug for SecondaryIndex<D, K, C>
where
    C: KeyComparer<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SecondaryIndex")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("documents", &state.forward.len())
            .field("keys", &state.buckets.len())
            .finish()
    }
}

impl<D, K> SecondaryIndex<D, K, NaturalEq>
where
    D: 'static,
    K: IndexKey + std::hash::Hash + Eq,
{
    /// Starts building an index named `name` that derives keys with `key_fn`.
    pub fn builder<F>(name: impl Into<String>, key_fn: F) -> SecondaryIndexBuilder<D, K, NaturalEq>
    where
        F: Fn(&D) -> K + Send + Sync + 'static,
    {
        SecondaryIndexBuilder {
            name: name.into(),
            key_fn: Box::new(key_fn),
            include: None,
            comparer: NaturalEq,
            _marker: PhantomData,
        }
    }

    /// An index with natural key equality and no inclusion predicate.
    pub fn new<F>(name: impl Into<String>, key_fn: F) -> Self
    where
        F: Fn(&D) -> K + Send + Sync + 'static,
    {
        Self::builder(name, key_fn).build()
    }
}

impl<D, K, C> SecondaryIndex<D, K, C>
where
    D: 'static,
    K: IndexKey,
    C: KeyComparer<K>,
{
    /// Process-unique handle of this index.
    pub fn id(&self) -> IndexId {
        self.id
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The comparer used for bucketing and for [`KeyRef`] equality.
    pub fn comparer(&self) -> &C {
        &self.comparer
    }

    /// Whether `doc` passes the inclusion predicate.
    pub fn includes(&self, doc: &D) -> bool {
        self.include.as_ref().is_none_or(|include| include(doc))
    }

    /// Indexes `doc` under `id`. Returns whether the index changed.
    ///
    /// A document that fails the inclusion predicate is removed instead.
    /// Re-indexing a document whose key is unchanged is a no-op.
    pub fn update(&self, id: &DocId, doc: &D) -> bool {
        if !self.includes(doc) {
            return self.remove(id);
        }

        let key = (self.key_fn)(doc);
        let canonical = self.comparer.canonicalize(&key);
        if self.state.read().is_current(id, &canonical, &self.comparer) {
            return false;
        }

        let mut state = self.state.write();
        if state.is_current(id, &canonical, &self.comparer) {
            return false;
        }

        if let Some(old) = state.forward.insert(id.clone(), key.clone()) {
            let old = self.comparer.canonicalize(&old);
            if old != canonical {
                state.detach(id, &old);
            }
        }
        state
            .buckets
            .entry(canonical)
            .or_insert_with(|| Bucket {
                key,
                members: HashSet::new(),
            })
            .members
            .insert(id.clone());
        true
    }

    /// Drops `id` from the index. Returns whether it was present.
    pub fn remove(&self, id: &DocId) -> bool {
        if !self.state.read().forward.contains_key(id) {
            return false;
        }

        let mut state = self.state.write();
        match state.forward.remove(id) {
            Some(old) => {
                let old = self.comparer.canonicalize(&old);
                state.detach(id, &old);
                true
            }
            None => false,
        }
    }

    /// Ids of every bucket whose key satisfies `predicate`.
    ///
    /// Scans every live key. Result order is unspecified.
    pub fn query<P>(&self, predicate: P) -> Vec<DocId>
    where
        P: Fn(KeyRef<'_, K, C>) -> bool,
    {
        let state = self.state.read();
        state
            .buckets
            .values()
            .filter(|bucket| predicate(KeyRef::new(&bucket.key, &self.comparer)))
            .flat_map(|bucket| bucket.members.iter().cloned())
            .collect()
    }

    /// Ids holding a key equal to `key`.
    pub fn query_exact(&self, key: &K) -> Vec<DocId> {
        let canonical = self.comparer.canonicalize(key);
        self.state
            .read()
            .buckets
            .get(&canonical)
            .map(|bucket| bucket.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every indexed id.
    pub fn ids(&self) -> Vec<DocId> {
        self.state.read().forward.keys().cloned().collect()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.state.read().forward.len()
    }

    /// Whether no document is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.state.read().buckets.len()
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: &DocId) -> bool {
        self.state.read().forward.contains_key(id)
    }

    /// Current key of `id`, if indexed.
    pub fn key_of(&self, id: &DocId) -> Option<K> {
        self.state.read().forward.get(id).cloned()
    }
}

impl<D, K, C> DocumentIndex for SecondaryIndex<D, K, C>
where
    D: 'static,
    K: IndexKey,
    C: KeyComparer<K>,
{
    fn index_id(&self) -> IndexId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn declared_type(&self) -> TypeKey {
        TypeKey::of::<D>()
    }

    fn update_any(&self, id: &DocId, doc: &dyn Any) -> CoreResult<bool> {
        let doc = doc.downcast_ref::<D>().ok_or(CoreError::TypeMismatch {
            expected: type_name::<D>(),
        })?;
        Ok(self.update(id, doc))
    }

    fn remove_id(&self, id: &DocId) -> bool {
        self.remove(id)
    }

    fn len(&self) -> usize {
        self.state.read().forward.len()
    }
}

/// Builder for [`SecondaryIndex`].
pub struct SecondaryIndexBuilder<D, K, C> {
    name: String,
    key_fn: KeyFn<D, K>,
    include: Option<IncludeFn<D>>,
    comparer: C,
    _marker: PhantomData<fn(&D) -> K>,
}

impl<D, K, C> fmt::Debug for SecondaryIndexBuilder<D, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryIndexBuilder")
            .field("name", &self.name)
            .field("has_predicate", &self.include.is_some())
            .finish_non_exhaustive()
    }
}

impl<D, K, C> SecondaryIndexBuilder<D, K, C>
where
    D: 'static,
    K: IndexKey,
    C: KeyComparer<K>,
{
    /// Keeps only documents for which `include` returns true.
    #[must_use]
    pub fn include<F>(mut self, include: F) -> Self
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.include = Some(Box::new(include));
        self
    }

    /// Replaces the key comparer.
    #[must_use]
    pub fn comparer<C2: KeyComparer<K>>(self, comparer: C2) -> SecondaryIndexBuilder<D, K, C2> {
        SecondaryIndexBuilder {
            name: self.name,
            key_fn: self.key_fn,
            include: self.include,
            comparer,
            _marker: PhantomData,
        }
    }

    /// Builds the index.
    pub fn build(self) -> SecondaryIndex<D, K, C> {
        SecondaryIndex {
            id: IndexId::next(),
            name: self.name,
            key_fn: self.key_fn,
            include: self.include,
            comparer: self.comparer,
            state: RwLock::new(IndexState::default()),
        }
    }
}
