//! File-system storage backend for persistent storage.

use crate::backend::{DocId, RecordIter, StorageBackend, StorageRecord};
use crate::error::{StorageError, StorageResult};
use crate::lock_pool::LockPool;
use crate::path::{self, TEMP_SUFFIX};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for [`FileSystemBackend`].
#[derive(Debug, Clone)]
pub struct FileSystemOptions {
    /// Number of per-file locks kept before idle ones are evicted.
    pub lock_pool_capacity: usize,
    /// Whether to create the root directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileSystemOptions {
    fn default() -> Self {
        Self {
            lock_pool_capacity: 4096,
            create_if_missing: true,
        }
    }
}

impl FileSystemOptions {
    /// Sets the lock pool capacity.
    #[must_use]
    pub const fn lock_pool_capacity(mut self, capacity: usize) -> Self {
        self.lock_pool_capacity = capacity;
        self
    }

    /// Sets whether to create a missing root.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// A directory-per-type, file-per-document storage backend.
///
/// Layout under the root:
///
/// ```text
/// root/
///   demo.Person/
///     364f9d08-dcfe-45a3-a75a-f25164d1f933   <- encoded payload
///   demo.Cat/
///     ...
/// ```
///
/// Type names and ids are escaped into single path components; see the
/// crate docs. Type directories are created on first write.
///
/// # Thread Safety
///
/// Every file access takes that file's lock from a bounded [`LockPool`]:
/// shared for reads, exclusive for writes and deletes. Operations on
/// different files proceed in parallel. Writes go to a temporary sibling
/// that is renamed over the target, so a reader never sees a half-written
/// payload.
///
/// # Example
///
/// ```no_run
/// use polydb_storage::{DocId, FileSystemBackend, StorageBackend, StorageRecord};
/// use std::path::Path;
///
/// let backend = FileSystemBackend::open(Path::new("data")).unwrap();
/// backend
///     .store(&[StorageRecord::new(DocId::new("demo.Person", "ronnie"), "{}")])
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct FileSystemBackend {
    root: PathBuf,
    locks: LockPool,
}

impl FileSystemBackend {
    /// Opens (creating if missing) a backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        Self::open_with_options(root, FileSystemOptions::default())
    }

    /// Opens a backend with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing and `create_if_missing` is
    /// false, or if it cannot be created.
    pub fn open_with_options(root: &Path, options: FileSystemOptions) -> StorageResult<Self> {
        if options.create_if_missing {
            fs::create_dir_all(root)?;
        } else if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("storage root {} does not exist", root.display()),
            )));
        }

        info!(root = %root.display(), "opened file-system storage");
        Ok(Self {
            root: root.to_path_buf(),
            locks: LockPool::new(options.lock_pool_capacity),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, type_name: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(path::encode(type_name)?))
    }

    fn file_path(&self, key: &DocId) -> StorageResult<PathBuf> {
        Ok(self.type_dir(key.type_name())?.join(path::encode(key.id())?))
    }

    fn read(&self, file: &Path) -> StorageResult<Option<String>> {
        let lock = self.locks.acquire(file);
        let _guard = lock.read();
        match fs::read(file) {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                StorageError::Corrupted(format!("{} is not UTF-8", file.display()))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &Path, payload: &str) -> StorageResult<()> {
        let mut temp = file.as_os_str().to_owned();
        temp.push(TEMP_SUFFIX);

        let lock = self.locks.acquire(file);
        let _guard = lock.write();
        fs::write(&temp, payload)?;
        fs::rename(&temp, file)?;
        Ok(())
    }

    fn delete(&self, file: &Path) -> StorageResult<()> {
        let lock = self.locks.acquire(file);
        let _guard = lock.write();
        match fs::remove_file(file) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Lists the document files of one type directory, point-in-time.
    fn list_files(dir: &Path) -> StorageResult<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            files.push((path::decode(&name)?, entry.path()));
        }
        Ok(files)
    }

    fn records_in(&self, type_name: String, dir: PathBuf) -> RecordIter<'_> {
        let files = match Self::list_files(&dir) {
            Ok(files) => files,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(files.into_iter().filter_map(move |(id, file)| {
            // Deleted between listing and reading
            match self.read(&file) {
                Ok(Some(payload)) => Some(Ok(StorageRecord::new(
                    DocId::new(type_name.clone(), id),
                    payload,
                ))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        }))
    }

    fn type_dirs(&self) -> StorageResult<Vec<(String, PathBuf)>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                dirs.push((path::decode(&name)?, entry.path()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

impl StorageBackend for FileSystemBackend {
    fn store(&self, records: &[StorageRecord]) -> StorageResult<()> {
        for record in records {
            let dir = self.type_dir(record.key.type_name())?;
            fs::create_dir_all(&dir)?;
            let file = dir.join(path::encode(record.key.id())?);
            self.write(&file, &record.payload)?;
            debug!(key = %record.key, bytes = record.payload.len(), "wrote document file");
        }
        Ok(())
    }

    fn retrieve(&self, key: &DocId) -> StorageResult<Option<String>> {
        self.read(&self.file_path(key)?)
    }

    fn retrieve_all_of(&self, type_name: &str) -> StorageResult<RecordIter<'_>> {
        let dir = self.type_dir(type_name)?;
        Ok(self.records_in(type_name.to_string(), dir))
    }

    fn retrieve_all(&self) -> StorageResult<RecordIter<'_>> {
        let dirs = self.type_dirs()?;
        Ok(Box::new(
            dirs.into_iter()
                .flat_map(move |(type_name, dir)| self.records_in(type_name, dir)),
        ))
    }

    fn remove(&self, key: &DocId) -> StorageResult<()> {
        self.delete(&self.file_path(key)?)
    }

    fn type_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.type_dirs()?.into_iter().map(|(name, _)| name).collect())
    }
}
