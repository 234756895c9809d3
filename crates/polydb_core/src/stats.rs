//! Database statistics.
//!
//! Counters are updated by the [`Database`](crate::Database) as operations
//! complete and can be read at any time, including while other threads are
//! writing.
//!
//! # Usage
//!
//! ```rust,ignore
//! let db = Database::open_in_memory(universe)?;
//! db.save(&mut person)?;
//!
//! let stats = db.stats().snapshot();
//! println!("saves: {}", stats.saves);
//! println!("index seed: {}us", stats.index_seed_micros);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Database statistics.
///
/// All counters are atomic and monotonically increasing. A disabled instance
/// ignores every `record_*` call.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    disabled: bool,

    /// Documents written.
    saves: AtomicU64,
    /// Point loads, hit or miss.
    loads: AtomicU64,
    /// Documents removed.
    deletes: AtomicU64,
    /// Enumerations started.
    enumerations: AtomicU64,
    /// Index queries executed.
    index_queries: AtomicU64,
    /// Index update callbacks delivered.
    index_updates: AtomicU64,
    /// Index remove callbacks delivered.
    index_removals: AtomicU64,

    /// Time spent seeding indexes at open, in microseconds.
    index_seed_micros: AtomicU64,
    /// Time spent resolving identities, in nanoseconds.
    id_assign_nanos: AtomicU64,
}

fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl DatabaseStats {
    /// Creates a stats instance that records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stats instance that records nothing.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Whether this instance records.
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    fn bump(&self, counter: &AtomicU64, by: u64) {
        if !self.disabled {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_save(&self) {
        self.bump(&self.saves, 1);
    }

    pub(crate) fn record_load(&self) {
        self.bump(&self.loads, 1);
    }

    pub(crate) fn record_delete(&self) {
        self.bump(&self.deletes, 1);
    }

    pub(crate) fn record_enumeration(&self) {
        self.bump(&self.enumerations, 1);
    }

    pub(crate) fn record_index_query(&self) {
        self.bump(&self.index_queries, 1);
    }

    pub(crate) fn record_index_update(&self) {
        self.bump(&self.index_updates, 1);
    }

    pub(crate) fn record_index_removal(&self) {
        self.bump(&self.index_removals, 1);
    }

    pub(crate) fn record_index_seed(&self, elapsed: Duration) {
        self.bump(&self.index_seed_micros, saturating_u64(elapsed.as_micros()));
    }

    pub(crate) fn record_id_assignment(&self, elapsed: Duration) {
        self.bump(&self.id_assign_nanos, saturating_u64(elapsed.as_nanos()));
    }

    /// Returns the number of documents written.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Returns the number of point loads.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Returns the number of documents removed.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of enumerations started.
    pub fn enumerations(&self) -> u64 {
        self.enumerations.load(Ordering::Relaxed)
    }

    /// Returns the number of index queries.
    pub fn index_queries(&self) -> u64 {
        self.index_queries.load(Ordering::Relaxed)
    }

    /// Returns the number of index update callbacks.
    pub fn index_updates(&self) -> u64 {
        self.index_updates.load(Ordering::Relaxed)
    }

    /// Returns the number of index remove callbacks.
    pub fn index_removals(&self) -> u64 {
        self.index_removals.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            saves: self.saves(),
            loads: self.loads(),
            deletes: self.deletes(),
            enumerations: self.enumerations(),
            index_queries: self.index_queries(),
            index_updates: self.index_updates(),
            index_removals: self.index_removals(),
            index_seed_micros: self.index_seed_micros.load(Ordering::Relaxed),
            id_assign_nanos: self.id_assign_nanos.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Documents written.
    pub saves: u64,
    /// Point loads.
    pub loads: u64,
    /// Documents removed.
    pub deletes: u64,
    /// Enumerations started.
    pub enumerations: u64,
    /// Index queries executed.
    pub index_queries: u64,
    /// Index update callbacks delivered.
    pub index_updates: u64,
    /// Index remove callbacks delivered.
    pub index_removals: u64,
    /// Time spent seeding indexes at open, in microseconds.
    pub index_seed_micros: u64,
    /// Time spent resolving identities, in nanoseconds.
    pub id_assign_nanos: u64,
}
