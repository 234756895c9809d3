//! Database configuration.

use polydb_storage::FileSystemOptions;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the storage root if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether `Database::open` puts the in-memory mirror in front of the
    /// file-system backend.
    pub write_through: bool,

    /// Per-file lock pool size for the file-system backend.
    pub lock_pool_capacity: usize,

    /// Whether payloads are pretty-printed.
    pub pretty_payloads: bool,

    /// Whether operation counters and timings are recorded.
    pub collect_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            write_through: true,
            lock_pool_capacity: 4096,
            pretty_payloads: false,
            collect_stats: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the storage root if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to cache the file-system backend in memory.
    #[must_use]
    pub const fn write_through(mut self, value: bool) -> Self {
        self.write_through = value;
        self
    }

    /// Sets the per-file lock pool size.
    #[must_use]
    pub const fn lock_pool_capacity(mut self, capacity: usize) -> Self {
        self.lock_pool_capacity = capacity;
        self
    }

    /// Sets whether payloads are pretty-printed.
    #[must_use]
    pub const fn pretty_payloads(mut self, value: bool) -> Self {
        self.pretty_payloads = value;
        self
    }

    /// Sets whether stats are collected.
    #[must_use]
    pub const fn collect_stats(mut self, value: bool) -> Self {
        self.collect_stats = value;
        self
    }

    /// File-system backend options derived from this configuration.
    #[must_use]
    pub fn file_system_options(&self) -> FileSystemOptions {
        FileSystemOptions::default()
            .lock_pool_capacity(self.lock_pool_capacity)
            .create_if_missing(self.create_if_missing)
    }
}
