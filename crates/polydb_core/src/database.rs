//! Database facade.

use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use polydb_storage::{
    DocId, FileSystemBackend, InMemoryBackend, RecordIter, StorageBackend, StorageRecord,
    WriteThroughBackend,
};
use tracing::{debug, info};

use crate::config::Config;
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::identity::{IdGenerator, IdentityResolver, RandomIds};
use crate::index::{DocumentIndex, KeyComparer, SecondaryIndex};
use crate::query::Query;
use crate::serializer::{decode_document, encode_document, JsonSerializer, Serializer};
use crate::stats::DatabaseStats;
use crate::universe::{ConcreteType, TypeUniverse};

/// The main database handle.
///
/// A `Database` owns one storage backend and the secondary indexes attached
/// when it was built. Every save resolves the document's identity, writes
/// the payload, then updates each index whose declared type the document is
/// assignable to. Every delete removes the id from storage and then from
/// every index.
///
/// All methods take `&self`; share a database across threads with `Arc`.
/// Index updates are not atomic with the storage write they follow, so a
/// concurrent reader can briefly see a document in storage before its index
/// entry (or the reverse for deletes).
///
/// # Opening a Database
///
/// ```rust,ignore
/// use polydb_core::{Database, TypeUniverse};
///
/// let universe = TypeUniverse::builder().register::<Person>().build()?;
/// let db = Database::open("people_db", universe)?;
///
/// let mut ronnie = Person { id: String::new(), name: "Ronnie".into(), age: 29 };
/// let key = db.save(&mut ronnie)?;
/// assert_eq!(db.load::<Person>(key.id())?, Some(ronnie));
/// ```
///
/// # Indexes
///
/// Indexes must be attached through [`Database::builder`] so they can be
/// seeded from existing storage before the first query:
///
/// ```rust,ignore
/// let by_name = Arc::new(SecondaryIndex::new("by_name", |p: &Person| p.name.clone()));
/// let db = Database::builder(universe)
///     .file_system("people_db")
///     .index(by_name.clone())
///     .open()?;
/// ```
pub struct Database {
    backend: Arc<dyn StorageBackend>,
    universe: Arc<TypeUniverse>,
    serializer: Arc<dyn Serializer>,
    resolver: IdentityResolver,
    indexes: Vec<Arc<dyn DocumentIndex>>,
    config: Config,
    stats: DatabaseStats,
}

impl Database {
    /// Starts building a database over `universe`.
    pub fn builder(universe: impl Into<Arc<TypeUniverse>>) -> DatabaseBuilder {
        DatabaseBuilder {
            universe: universe.into(),
            backend: BackendSource::Memory,
            serializer: None,
            ids: None,
            indexes: Vec::new(),
            config: Config::default(),
        }
    }

    /// Opens a database rooted at a directory, with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or holds a type
    /// name the universe does not know.
    pub fn open(path: impl AsRef<Path>, universe: impl Into<Arc<TypeUniverse>>) -> CoreResult<Self> {
        Self::open_with_config(path, universe, Config::default())
    }

    /// Opens a database rooted at a directory.
    ///
    /// With [`Config::write_through`] the directory is mirrored in memory
    /// and every read is served from the mirror.
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn open_with_config(
        path: impl AsRef<Path>,
        universe: impl Into<Arc<TypeUniverse>>,
        config: Config,
    ) -> CoreResult<Self> {
        Self::builder(universe)
            .file_system(path.as_ref())
            .config(config)
            .open()
    }

    /// Opens a volatile database.
    ///
    /// # Errors
    ///
    /// Never fails for an empty backend; returns `CoreResult` for symmetry
    /// with the other constructors.
    pub fn open_in_memory(universe: impl Into<Arc<TypeUniverse>>) -> CoreResult<Self> {
        Self::builder(universe).open()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    /// Returns the type universe.
    pub fn universe(&self) -> &TypeUniverse {
        &self.universe
    }

    /// Returns the storage backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Returns the payload serializer.
    pub fn serializer(&self) -> &dyn Serializer {
        self.serializer.as_ref()
    }

    /// Names and sizes of the attached indexes.
    pub fn indexes(&self) -> Vec<(String, usize)> {
        self.indexes
            .iter()
            .map(|index| (index.name().to_string(), index.len()))
            .collect()
    }

    // === Writes ===

    /// Saves a document, assigning its identity if unset.
    ///
    /// Saving is an upsert. The assigned identity is written back into
    /// `doc`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` is not registered, the identity cannot be
    /// resolved, or the write fails. An index is only updated after the
    /// storage write succeeded.
    pub fn save<T: Document>(&self, doc: &mut T) -> CoreResult<DocId> {
        let ty = self.universe.concrete::<T>()?;

        let started = Instant::now();
        let id = self.resolver.resolve(doc)?;
        self.stats.record_id_assignment(started.elapsed());

        let key = DocId::new(T::TYPE_NAME, id);
        let payload = encode_document(self.serializer.as_ref(), doc)?;
        self.backend
            .store(&[StorageRecord::new(key.clone(), payload)])?;
        self.stats.record_save();

        self.reindex(ty, &key, doc)?;
        debug!(key = %key, "saved document");
        Ok(key)
    }

    /// Saves every document in order.
    ///
    /// Not atomic: if one save fails, the documents before it stay saved.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn save_many<T: Document>(&self, docs: &mut [T]) -> CoreResult<Vec<DocId>> {
        docs.iter_mut().map(|doc| self.save(doc)).collect()
    }

    fn reindex<T: Document>(&self, ty: &ConcreteType, key: &DocId, doc: &T) -> CoreResult<()> {
        for index in &self.indexes {
            let target = index.declared_type();
            if target.id() == TypeId::of::<T>() {
                index.update_any(key, doc)?;
            } else if ty.is_assignable_to(target.id()) {
                let view = ty
                    .upcast(Box::new(doc.clone()), target.id())
                    .ok_or(CoreError::TypeMismatch {
                        expected: target.rust_name(),
                    })?;
                index.update_any(key, &*view)?;
            } else {
                continue;
            }
            self.stats.record_index_update();
        }
        Ok(())
    }

    /// Saves every rewritten document, then drops the old keys that no
    /// rewritten document landed on.
    ///
    /// Deletes run only after all saves, so a document whose new content id
    /// equals another document's old one is never deleted by a later step.
    pub(crate) fn rewrite<T: Document>(&self, docs: Vec<(DocId, T)>) -> CoreResult<usize> {
        let count = docs.len();
        let mut landed = HashSet::with_capacity(count);
        let mut moved = Vec::new();
        for (old, mut doc) in docs {
            let key = self.save(&mut doc)?;
            if key != old {
                moved.push(old);
            }
            landed.insert(key);
        }
        for old in moved.iter().filter(|old| !landed.contains(*old)) {
            self.delete_key(old)?;
        }
        Ok(count)
    }

    // === Reads ===

    /// Loads the document of exact type `T` stored under `id`.
    ///
    /// Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `id` is empty, and an error
    /// if `T` is not registered, the read fails or the payload does not
    /// decode.
    pub fn load<T: Document>(&self, id: &str) -> CoreResult<Option<T>> {
        if id.is_empty() {
            return Err(CoreError::invalid_argument("document id must not be empty"));
        }
        self.universe.concrete::<T>()?;
        self.stats.record_load();

        self.backend
            .retrieve(&DocId::new(T::TYPE_NAME, id))?
            .map(|payload| decode_document(self.serializer.as_ref(), &payload))
            .transpose()
    }

    /// Loads the document under `key` viewed as `B`.
    pub(crate) fn load_view<B: 'static>(&self, key: &DocId) -> CoreResult<Option<B>> {
        let ty = self.universe.resolve(key.type_name())?;
        self.stats.record_load();

        self.backend
            .retrieve(key)?
            .map(|payload| ty.materialize::<B>(self.serializer.as_ref(), &payload))
            .transpose()
    }

    /// Lazily enumerates every stored document viewable as `B`.
    ///
    /// Walks the namespace of each concrete type assignable to `B`, in
    /// registration order. Call again to restart.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnregisteredType`] if no registered type is
    /// assignable to `B`, or an error if enumeration cannot start. Read and
    /// decode failures are yielded as items.
    pub fn enumerate<B: 'static>(&self) -> CoreResult<Documents<'_, B>> {
        let types = self.universe.subtypes_of::<B>();
        if types.is_empty() {
            return Err(CoreError::UnregisteredType {
                type_name: type_name::<B>(),
            });
        }
        self.stats.record_enumeration();
        Ok(Documents {
            db: self,
            pending: types.into_iter(),
            current: None,
            _marker: PhantomData,
        })
    }

    /// Collects every stored document viewable as `B`.
    ///
    /// # Errors
    ///
    /// Same as [`Database::enumerate`], plus the first item error.
    pub fn all<B: 'static>(&self) -> CoreResult<Vec<B>> {
        self.enumerate::<B>()?.collect()
    }

    /// Counts stored documents viewable as `B` without decoding them.
    ///
    /// # Errors
    ///
    /// Same as [`Database::enumerate`].
    pub fn count<B: 'static>(&self) -> CoreResult<usize> {
        let types = self.universe.subtypes_of::<B>();
        if types.is_empty() {
            return Err(CoreError::UnregisteredType {
                type_name: type_name::<B>(),
            });
        }

        let mut total = 0;
        for ty in types {
            for record in self.backend.retrieve_all_of(ty.name())? {
                record?;
                total += 1;
            }
        }
        Ok(total)
    }

    /// Every stored document key, across all types.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated.
    pub fn keys(&self) -> CoreResult<Vec<DocId>> {
        self.backend
            .retrieve_all()?
            .map(|record| record.map(|record| record.key).map_err(CoreError::from))
            .collect()
    }

    /// Number of stored documents per type name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated.
    pub fn type_counts(&self) -> CoreResult<Vec<(String, usize)>> {
        let mut counts = Vec::new();
        for name in self.backend.type_names()? {
            let mut count = 0;
            for record in self.backend.retrieve_all_of(&name)? {
                record?;
                count += 1;
            }
            counts.push((name, count));
        }
        Ok(counts)
    }

    // === Updates ===

    /// Load-mutate-save over every document of exact type `T`.
    ///
    /// Returns the number of documents saved.
    ///
    /// # Errors
    ///
    /// Same as [`Database::update_where`].
    pub fn update_all<T, F>(&self, mutate: F) -> CoreResult<usize>
    where
        T: Document,
        F: FnMut(&mut T),
    {
        self.update_where(|_: &T| true, mutate)
    }

    /// Load-mutate-save over every document of exact type `T` that matches
    /// `predicate`.
    ///
    /// A document whose identity changes under `mutate` (content ids) is
    /// saved under the new id and removed from the old one, unless another
    /// updated document now lives there. Not atomic: documents saved before
    /// a failure stay saved, and stale old ids are only removed once every
    /// save succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` is not registered, or the first read, decode
    /// or save failure.
    pub fn update_where<T, P, F>(&self, predicate: P, mut mutate: F) -> CoreResult<usize>
    where
        T: Document,
        P: Fn(&T) -> bool,
        F: FnMut(&mut T),
    {
        self.universe.concrete::<T>()?;

        // Re-keyed documents must not be revisited by a lazy directory scan.
        let records = self
            .backend
            .retrieve_all_of(T::TYPE_NAME)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut changed = Vec::new();
        for record in records {
            let mut doc: T = decode_document(self.serializer.as_ref(), &record.payload)?;
            if !predicate(&doc) {
                continue;
            }
            mutate(&mut doc);
            changed.push((record.key, doc));
        }
        let updated = self.rewrite(changed)?;
        debug!(type_name = T::TYPE_NAME, updated, "updated documents");
        Ok(updated)
    }

    // === Deletes ===

    /// Deletes the document of type `T` stored under `id`.
    ///
    /// Deleting a missing document is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `id` is empty, and an error
    /// if `T` is not registered or the backend fails.
    pub fn delete<T: Document>(&self, id: &str) -> CoreResult<()> {
        if id.is_empty() {
            return Err(CoreError::invalid_argument("document id must not be empty"));
        }
        self.universe.concrete::<T>()?;
        self.delete_key(&DocId::new(T::TYPE_NAME, id))
    }

    /// Deletes the document under `key` and drops it from every index.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. Indexes are left untouched
    /// in that case.
    pub fn delete_key(&self, key: &DocId) -> CoreResult<()> {
        self.backend.remove(key)?;
        self.stats.record_delete();

        for index in &self.indexes {
            if index.remove_id(key) {
                self.stats.record_index_removal();
            }
        }
        debug!(key = %key, "deleted document");
        Ok(())
    }

    /// Deletes `doc` by its identity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the document has no
    /// identity yet.
    pub fn delete_document<T: Document>(&self, doc: &T) -> CoreResult<()> {
        let id = self.resolver.peek(doc)?;
        self.delete::<T>(&id)
    }

    /// Deletes every document in `docs`.
    ///
    /// # Errors
    ///
    /// Returns the first error; earlier deletes stay applied.
    pub fn delete_documents<T: Document>(&self, docs: &[T]) -> CoreResult<()> {
        docs.iter().try_for_each(|doc| self.delete_document(doc))
    }

    /// Deletes every stored document. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns the first error; earlier deletes stay applied.
    pub fn delete_all(&self) -> CoreResult<usize> {
        let keys = self.keys()?;
        for key in &keys {
            self.delete_key(key)?;
        }
        info!(deleted = keys.len(), "deleted all documents");
        Ok(keys.len())
    }

    // === Queries ===

    /// Starts a query against an attached index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexNotAttached`] if `index` was not attached
    /// when this database was built.
    pub fn query<'a, D, K, C>(
        &'a self,
        index: &'a SecondaryIndex<D, K, C>,
    ) -> CoreResult<Query<'a, D, K, C>>
    where
        D: 'static,
        K: Clone + Send + Sync + 'static,
        C: KeyComparer<K>,
    {
        let attached = self
            .indexes
            .iter()
            .any(|attached| attached.index_id() == index.id());
        if !attached {
            return Err(CoreError::IndexNotAttached {
                name: index.name().to_string(),
            });
        }
        Ok(Query::new(self, index))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("types", &self.universe.len())
            .field("indexes", &self.indexes.len())
            .field("serializer", &self.serializer.name())
            .finish_non_exhaustive()
    }
}

/// Lazy enumeration returned by [`Database::enumerate`].
pub struct Documents<'a, B> {
    db: &'a Database,
    pending: std::vec::IntoIter<&'a ConcreteType>,
    current: Option<(&'a ConcreteType, RecordIter<'a>)>,
    _marker: PhantomData<fn() -> B>,
}

impl<B> fmt::Debug for Documents<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Documents")
            .field("current", &self.current.as_ref().map(|(ty, _)| ty.name()))
            .field("remaining_types", &self.pending.len())
            .finish()
    }
}

impl<'a, B: 'static> Iterator for Documents<'a, B> {
    type Item = CoreResult<B>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((ty, records)) = &mut self.current {
                match records.next() {
                    Some(Ok(record)) => {
                        return Some(ty.materialize::<B>(self.db.serializer(), &record.payload));
                    }
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => self.current = None,
                }
            }

            let ty = self.pending.next()?;
            let db: &'a Database = self.db;
            let backend = db.backend.as_ref();
            match backend.retrieve_all_of(ty.name()) {
                Ok(records) => self.current = Some((ty, records)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

enum BackendSource {
    Memory,
    Shared(Arc<dyn StorageBackend>),
    Directory(PathBuf),
}

/// Builder for [`Database`].
pub struct DatabaseBuilder {
    universe: Arc<TypeUniverse>,
    backend: BackendSource,
    serializer: Option<Arc<dyn Serializer>>,
    ids: Option<Arc<dyn IdGenerator>>,
    indexes: Vec<Arc<dyn DocumentIndex>>,
    config: Config,
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("types", &self.universe.len())
            .field("indexes", &self.indexes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DatabaseBuilder {
    /// Stores documents in `backend`.
    #[must_use]
    pub fn backend<B: StorageBackend + 'static>(self, backend: B) -> Self {
        self.shared_backend(Arc::new(backend))
    }

    /// Stores documents in a backend shared with other owners.
    #[must_use]
    pub fn shared_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = BackendSource::Shared(backend);
        self
    }

    /// Stores documents under a directory, one subdirectory per type.
    ///
    /// Opened with the file-system options of the [`Config`], and wrapped
    /// in the write-through mirror when [`Config::write_through`] is set.
    #[must_use]
    pub fn file_system(mut self, root: impl Into<PathBuf>) -> Self {
        self.backend = BackendSource::Directory(root.into());
        self
    }

    /// Replaces the payload serializer.
    #[must_use]
    pub fn serializer<S: Serializer + 'static>(mut self, serializer: S) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Replaces the source of fresh identities.
    #[must_use]
    pub fn id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Attaches an index. It is seeded from storage when the database opens.
    #[must_use]
    pub fn index<I: DocumentIndex + 'static>(mut self, index: Arc<I>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Opens the database and seeds every attached index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfiguration`] if an index is attached
    /// twice or no registered type is assignable to an index's declared
    /// type, [`CoreError::UnknownTypeName`] if storage holds a type the
    /// universe does not know, and any error from opening the backend or
    /// decoding stored documents.
    pub fn open(self) -> CoreResult<Database> {
        let Self {
            universe,
            backend,
            serializer,
            ids,
            indexes,
            config,
        } = self;

        let mut seen = HashSet::new();
        for index in &indexes {
            if !seen.insert(index.index_id()) {
                return Err(CoreError::invalid_configuration(format!(
                    "index {:?} is attached twice",
                    index.name()
                )));
            }
            if universe.subtypes_of_id(index.declared_type().id()).is_empty() {
                return Err(CoreError::invalid_configuration(format!(
                    "index {:?} is declared over {}, but no registered type is assignable to it",
                    index.name(),
                    index.declared_type().rust_name()
                )));
            }
        }

        let backend: Arc<dyn StorageBackend> = match backend {
            BackendSource::Memory => Arc::new(InMemoryBackend::new()),
            BackendSource::Shared(backend) => backend,
            BackendSource::Directory(root) => {
                let durable = FileSystemBackend::open_with_options(&root, config.file_system_options())?;
                if config.write_through {
                    Arc::new(WriteThroughBackend::open(durable)?)
                } else {
                    Arc::new(durable)
                }
            }
        };

        let serializer = serializer.unwrap_or_else(|| {
            let json = if config.pretty_payloads {
                JsonSerializer::pretty()
            } else {
                JsonSerializer::compact()
            };
            Arc::new(json)
        });

        let stats = if config.collect_stats {
            DatabaseStats::new()
        } else {
            DatabaseStats::disabled()
        };

        let db = Database {
            backend,
            universe,
            serializer,
            resolver: IdentityResolver::new(ids.unwrap_or_else(|| Arc::new(RandomIds))),
            indexes,
            config,
            stats,
        };

        for name in db.backend.type_names()? {
            db.universe.resolve(&name)?;
        }
        db.seed_indexes()?;

        info!(
            types = db.universe.len(),
            indexes = db.indexes.len(),
            serializer = db.serializer.name(),
            "database opened"
        );
        Ok(db)
    }
}

impl Database {
    /// Feeds every stored document through the indexes it is assignable to.
    fn seed_indexes(&self) -> CoreResult<()> {
        if self.indexes.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let mut documents = 0_usize;
        for record in self.backend.retrieve_all()? {
            let record = record?;
            let ty = self.universe.resolve(record.key.type_name())?;
            for index in &self.indexes {
                let target = index.declared_type();
                if !ty.is_assignable_to(target.id()) {
                    continue;
                }
                let decoded = ty.decode(self.serializer.as_ref(), &record.payload)?;
                let view = ty
                    .upcast(decoded, target.id())
                    .ok_or(CoreError::TypeMismatch {
                        expected: target.rust_name(),
                    })?;
                index.update_any(&record.key, &*view)?;
            }
            documents += 1;
        }

        let elapsed = started.elapsed();
        self.stats.record_index_seed(elapsed);
        for index in &self.indexes {
            info!(
                index = index.name(),
                indexed = index.len(),
                scanned = documents,
                elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                "seeded index"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NoIdentity;
    use crate::error::ErrorKind;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::tempdir;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        id: String,
        name: String,
        age: u32,
    }

    impl Person {
        fn new(name: &str, age: u32) -> Self {
            Self {
                id: String::new(),
                name: name.into(),
                age,
            }
        }
    }

    impl Document for Person {
        const TYPE_NAME: &'static str = "test.Person";
        type Id = String;

        fn id_field(&self) -> Option<&String> {
            Some(&self.id)
        }

        fn id_field_mut(&mut self) -> Option<&mut String> {
            Some(&mut self.id)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Document for Note {
        const TYPE_NAME: &'static str = "test.Note";
        type Id = NoIdentity;
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    impl Document for Counter {
        const TYPE_NAME: &'static str = "test.Counter";
        type Id = NoIdentity;
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ticket {
        number: Option<u64>,
    }

    impl Document for Ticket {
        const TYPE_NAME: &'static str = "test.Ticket";
        type Id = Option<u64>;

        fn id_field(&self) -> Option<&Option<u64>> {
            Some(&self.number)
        }

        fn id_field_mut(&mut self) -> Option<&mut Option<u64>> {
            Some(&mut self.number)
        }
    }

    trait Animal: Send {
        fn sound(&self) -> &'static str;
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Cat {
        id: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Dog {
        id: String,
    }

    impl Animal for Cat {
        fn sound(&self) -> &'static str {
            "meow"
        }
    }

    impl Animal for Dog {
        fn sound(&self) -> &'static str {
            "woof"
        }
    }

    impl Document for Cat {
        const TYPE_NAME: &'static str = "zoo.Cat";
        type Id = String;

        fn id_field(&self) -> Option<&String> {
            Some(&self.id)
        }

        fn id_field_mut(&mut self) -> Option<&mut String> {
            Some(&mut self.id)
        }
    }

    impl Document for Dog {
        const TYPE_NAME: &'static str = "zoo.Dog";
        type Id = String;

        fn id_field(&self) -> Option<&String> {
            Some(&self.id)
        }

        fn id_field_mut(&mut self) -> Option<&mut String> {
            Some(&mut self.id)
        }
    }

    fn universe() -> TypeUniverse {
        TypeUniverse::builder()
            .register::<Person>()
            .register::<Note>()
            .register::<Counter>()
            .register::<Ticket>()
            .register::<Cat>()
            .register::<Dog>()
            .assignable::<Cat, Box<dyn Animal>>(|c| Box::new(c))
            .assignable::<Dog, Box<dyn Animal>>(|d| Box::new(d))
            .build()
            .unwrap()
    }

    fn create_db() -> Database {
        Database::open_in_memory(universe()).unwrap()
    }

    struct Sequential(AtomicU64);

    impl IdGenerator for Sequential {
        fn next_id(&self) -> Uuid {
            Uuid::from_u128(u128::from(self.0.fetch_add(1, Ordering::Relaxed)) + 1)
        }
    }

    #[test]
    fn save_then_load() {
        let db = create_db();
        let mut ronnie = Person::new("Ronnie", 29);

        let key = db.save(&mut ronnie).unwrap();
        assert!(!ronnie.id.is_empty());
        assert_eq!(key, DocId::new("test.Person", ronnie.id.clone()));
        assert_eq!(db.load::<Person>(&ronnie.id).unwrap(), Some(ronnie));
    }

    #[test]
    fn save_is_an_upsert() {
        let db = create_db();
        let mut ronnie = Person::new("Ronnie", 29);
        db.save(&mut ronnie).unwrap();

        ronnie.age = 30;
        db.save(&mut ronnie).unwrap();

        assert_eq!(db.count::<Person>().unwrap(), 1);
        assert_eq!(db.load::<Person>(&ronnie.id).unwrap().unwrap().age, 30);
    }

    #[test]
    fn loaded_copies_are_detached() {
        let db = create_db();
        let mut ronnie = Person::new("Ronnie", 29);
        db.save(&mut ronnie).unwrap();

        let mut copy = db.load::<Person>(&ronnie.id).unwrap().unwrap();
        copy.age = 99;
        assert_eq!(db.load::<Person>(&ronnie.id).unwrap().unwrap().age, 29);
    }

    #[test]
    fn load_edge_cases() {
        let db = create_db();
        assert_eq!(db.load::<Person>("missing").unwrap(), None);

        let err = db.load::<Person>("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn unregistered_type_is_rejected() {
        let db = Database::open_in_memory(TypeUniverse::builder().register::<Note>().build().unwrap())
            .unwrap();
        let err = db.save(&mut Person::new("Ronnie", 29)).unwrap_err();
        assert!(matches!(err, CoreError::UnregisteredType { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn custom_id_generator() {
        let db = Database::builder(universe())
            .id_generator(Sequential(AtomicU64::new(0)))
            .open()
            .unwrap();

        let mut a = Person::new("a", 1);
        let mut b = Person::new("b", 2);
        db.save(&mut a).unwrap();
        db.save(&mut b).unwrap();
        assert_eq!(a.id, Uuid::from_u128(1).to_string());
        assert_eq!(b.id, Uuid::from_u128(2).to_string());
    }

    #[test]
    fn unset_numeric_identity_fails() {
        let db = create_db();
        let err = db.save(&mut Ticket { number: None }).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
        assert_eq!(db.count::<Ticket>().unwrap(), 0);

        db.save(&mut Ticket { number: Some(12) }).unwrap();
        assert!(db.load::<Ticket>("12").unwrap().is_some());
    }

    #[test]
    fn content_identity_documents() {
        let db = create_db();
        let mut note = Note {
            text: "hello".into(),
        };
        let first = db.save(&mut note).unwrap();
        let second = db.save(&mut note.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(db.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn polymorphic_enumeration() {
        let db = create_db();
        db.save(&mut Cat { id: "felix".into() }).unwrap();
        db.save(&mut Dog { id: "rex".into() }).unwrap();
        db.save(&mut Dog { id: "fido".into() }).unwrap();

        let animals = db.all::<Box<dyn Animal>>().unwrap();
        assert_eq!(animals.len(), 3);
        let meows = animals.iter().filter(|a| a.sound() == "meow").count();
        assert_eq!(meows, 1);
        assert_eq!(db.count::<Box<dyn Animal>>().unwrap(), 3);

        // Restartable.
        assert_eq!(db.enumerate::<Box<dyn Animal>>().unwrap().count(), 3);
        assert_eq!(db.all::<Dog>().unwrap().len(), 2);
    }

    #[test]
    fn enumerate_unknown_base_fails() {
        let db = create_db();
        let err = db.enumerate::<String>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn delete_variants() {
        let db = create_db();
        let mut people = vec![
            Person::new("Ronnie", 29),
            Person::new("Anna", 7),
            Person::new("Maria", 33),
        ];
        db.save_many(&mut people).unwrap();
        assert_eq!(db.count::<Person>().unwrap(), 3);

        db.delete::<Person>(&people[0].id).unwrap();
        db.delete::<Person>(&people[0].id).unwrap();
        db.delete_document(&people[1]).unwrap();
        assert_eq!(db.count::<Person>().unwrap(), 1);

        db.delete_documents(&people).unwrap();
        assert_eq!(db.count::<Person>().unwrap(), 0);

        let err = db.delete::<Person>("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = db.delete_document(&Person::new("Nobody", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn keys_and_delete_all() {
        let db = create_db();
        db.save(&mut Cat { id: "felix".into() }).unwrap();
        db.save(&mut Person::new("Ronnie", 29)).unwrap();

        let mut keys = db.keys().unwrap();
        keys.sort();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1], DocId::new("zoo.Cat", "felix"));

        assert_eq!(db.delete_all().unwrap(), 2);
        assert!(db.keys().unwrap().is_empty());
    }

    #[test]
    fn update_where_mutates_matches() {
        let db = create_db();
        let mut people = vec![Person::new("Ronnie", 29), Person::new("Anna", 7)];
        db.save_many(&mut people).unwrap();

        let updated = db
            .update_where(|p: &Person| p.age < 13, |p| p.age += 10)
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(db.load::<Person>(&people[1].id).unwrap().unwrap().age, 17);

        assert_eq!(db.update_all(|p: &mut Person| p.name.make_ascii_uppercase()).unwrap(), 2);
        assert_eq!(
            db.load::<Person>(&people[0].id).unwrap().unwrap().name,
            "RONNIE"
        );
    }

    #[test]
    fn update_moves_content_identity() {
        let db = create_db();
        db.save(&mut Note { text: "draft".into() }).unwrap();

        db.update_all(|n: &mut Note| n.text = "final".into()).unwrap();

        let notes = db.all::<Note>().unwrap();
        assert_eq!(notes, vec![Note { text: "final".into() }]);
    }

    #[test]
    fn update_chain_of_content_identities_keeps_every_document() {
        let db = create_db();
        for n in 0..20 {
            db.save(&mut Counter { n }).unwrap();
        }

        assert_eq!(db.update_all(|c: &mut Counter| c.n += 1).unwrap(), 20);

        let mut values: Vec<u32> = db.all::<Counter>().unwrap().into_iter().map(|c| c.n).collect();
        values.sort_unstable();
        assert_eq!(values, (1..=20).collect::<Vec<_>>());
        assert_eq!(db.count::<Counter>().unwrap(), 20);
    }

    #[test]
    fn unknown_stored_type_fails_open() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .store(&[StorageRecord::new(DocId::new("zoo.Unicorn", "1"), "{}")])
            .unwrap();

        let err = Database::builder(universe())
            .shared_backend(backend)
            .open()
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownTypeName { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn index_without_assignable_type_fails_open() {
        let index = Arc::new(SecondaryIndex::new("len", |s: &String| s.len()));
        let err = Database::builder(universe()).index(index).open().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn index_attached_twice_fails_open() {
        let index = Arc::new(SecondaryIndex::new("age", |p: &Person| p.age));
        let err = Database::builder(universe())
            .index(index.clone())
            .index(index)
            .open()
            .unwrap_err();
        assert!(err.to_string().contains("attached twice"));
    }

    #[test]
    fn indexes_are_seeded_on_open() {
        let backend = Arc::new(InMemoryBackend::new());
        {
            let db = Database::builder(universe())
                .shared_backend(backend.clone())
                .open()
                .unwrap();
            db.save(&mut Person::new("Ronnie", 29)).unwrap();
            db.save(&mut Person::new("Anna", 7)).unwrap();
            db.save(&mut Cat { id: "felix".into() }).unwrap();
        }

        let by_age = Arc::new(SecondaryIndex::new("by_age", |p: &Person| p.age));
        let sounds = Arc::new(SecondaryIndex::new("by_sound", |a: &Box<dyn Animal>| {
            a.sound().to_string()
        }));
        let db = Database::builder(universe())
            .shared_backend(backend)
            .index(by_age.clone())
            .index(sounds.clone())
            .open()
            .unwrap();

        assert_eq!(by_age.len(), 2);
        assert_eq!(by_age.query_exact(&7).len(), 1);
        assert_eq!(sounds.query_exact(&"meow".to_string()).len(), 1);
        assert_eq!(db.indexes().len(), 2);
        assert!(db.stats().snapshot().index_seed_micros < u64::MAX);
    }

    #[test]
    fn base_type_index_observes_subtypes() {
        let sounds = Arc::new(SecondaryIndex::new("by_sound", |a: &Box<dyn Animal>| {
            a.sound().to_string()
        }));
        let db = Database::builder(universe())
            .index(sounds.clone())
            .open()
            .unwrap();

        db.save(&mut Cat { id: "felix".into() }).unwrap();
        db.save(&mut Dog { id: "rex".into() }).unwrap();
        db.save(&mut Person::new("Ronnie", 29)).unwrap();

        assert_eq!(sounds.len(), 2);
        assert_eq!(
            sounds.query_exact(&"woof".to_string()),
            vec![DocId::new("zoo.Dog", "rex")]
        );

        db.delete::<Dog>("rex").unwrap();
        assert!(sounds.query_exact(&"woof".to_string()).is_empty());
    }

    #[test]
    fn file_system_database_survives_reopen() {
        let dir = tempdir().unwrap();
        let mut ronnie = Person::new("Ronnie", 29);
        {
            let db = Database::open(dir.path(), universe()).unwrap();
            db.save(&mut ronnie).unwrap();
        }

        for write_through in [true, false] {
            let config = Config::default().write_through(write_through);
            let db = Database::open_with_config(dir.path(), universe(), config).unwrap();
            assert_eq!(db.load::<Person>(&ronnie.id).unwrap(), Some(ronnie.clone()));
        }
    }

    #[test]
    fn missing_root_without_create_fails() {
        let dir = tempdir().unwrap();
        let config = Config::default().create_if_missing(false);
        let err = Database::open_with_config(dir.path().join("nope"), universe(), config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn stats_track_operations() {
        let db = create_db();
        let mut ronnie = Person::new("Ronnie", 29);
        db.save(&mut ronnie).unwrap();
        db.load::<Person>(&ronnie.id).unwrap();
        db.all::<Person>().unwrap();
        db.delete_document(&ronnie).unwrap();

        let snap = db.stats().snapshot();
        assert_eq!(snap.saves, 1);
        assert_eq!(snap.loads, 1);
        assert_eq!(snap.enumerations, 1);
        assert_eq!(snap.deletes, 1);

        let quiet = Database::builder(universe())
            .config(Config::default().collect_stats(false))
            .open()
            .unwrap();
        quiet.save(&mut Person::new("Anna", 7)).unwrap();
        assert_eq!(quiet.stats().saves(), 0);
    }

    #[test]
    fn pretty_payloads() {
        let backend = Arc::new(InMemoryBackend::new());
        let db = Database::builder(universe())
            .shared_backend(backend.clone())
            .config(Config::default().pretty_payloads(true))
            .open()
            .unwrap();
        let key = db.save(&mut Person::new("Ronnie", 29)).unwrap();

        let payload = backend.retrieve(&key).unwrap().unwrap();
        assert!(payload.contains('\n'));
    }

    #[test]
    fn concurrent_saves() {
        let db = Arc::new(create_db());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mut person = Person::new(&format!("p{t}-{i}"), i);
                        db.save(&mut person).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(db.count::<Person>().unwrap(), 100);
    }
}
