//! Bounded pool of per-file reader/writer locks.

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared handle to one file's lock.
pub(crate) type FileLock = Arc<RwLock<()>>;

/// Hands out one `RwLock` per file path.
///
/// The master mutex only protects the pool's own bookkeeping; it is never
/// held while a caller waits on a file lock or does I/O.
///
/// Eviction walks from least to most recently used and only drops locks whose
/// sole owner is the pool. A handle can only be cloned out under the master
/// mutex, so a strong count of one there means no operation holds or is about
/// to hold the lock. If every pooled lock is in use the pool grows past its
/// capacity instead of handing two callers different locks for one file.
#[derive(Debug)]
pub(crate) struct LockPool {
    capacity: usize,
    locks: Mutex<LruCache<PathBuf, FileLock>>,
}

impl LockPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            locks: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Returns the lock for `path`, creating it if needed.
    pub(crate) fn acquire(&self, path: &Path) -> FileLock {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(path) {
            return Arc::clone(lock);
        }

        let lock = FileLock::default();
        locks.put(path.to_path_buf(), Arc::clone(&lock));

        if locks.len() > self.capacity {
            self.evict_idle(&mut locks);
        }
        lock
    }

    fn evict_idle(&self, locks: &mut LruCache<PathBuf, FileLock>) {
        let excess = locks.len() - self.capacity;
        let idle: Vec<PathBuf> = locks
            .iter()
            .rev()
            .filter(|(_, lock)| Arc::strong_count(lock) == 1)
            .map(|(path, _)| path.clone())
            .take(excess)
            .collect();

        for path in &idle {
            locks.pop(path);
        }
        debug!(evicted = idle.len(), pooled = locks.len(), "evicted idle file locks");

        if locks.len() > self.capacity {
            warn!(
                pooled = locks.len(),
                capacity = self.capacity,
                "file lock pool over capacity, all locks in use"
            );
        }
    }

    /// Number of pooled locks.
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_same_lock() {
        let pool = LockPool::new(8);
        let a = pool.acquire(Path::new("/x/a"));
        let b = pool.acquire(Path::new("/x/a"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn idle_locks_are_evicted_at_capacity() {
        let pool = LockPool::new(2);
        for name in ["a", "b", "c", "d"] {
            let _lock = pool.acquire(Path::new(name));
        }
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn held_locks_survive_eviction() {
        let pool = LockPool::new(2);
        let held = pool.acquire(Path::new("held"));
        let _guard = held.write();

        for name in ["a", "b", "c", "d"] {
            let _lock = pool.acquire(Path::new(name));
        }

        let again = pool.acquire(Path::new("held"));
        assert!(Arc::ptr_eq(&held, &again));
    }

    #[test]
    fn pool_overflows_when_everything_is_held() {
        let pool = LockPool::new(2);
        let held: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| pool.acquire(Path::new(name)))
            .collect();

        assert_eq!(pool.len(), 3);
        drop(held);

        let _lock = pool.acquire(Path::new("d"));
        assert_eq!(pool.len(), 2);
    }
}
