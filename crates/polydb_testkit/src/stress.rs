//! Stress tests for PolyDB.
//!
//! These helpers drive a shared database from several threads and report
//! throughput. They verify behavior under concurrent access, not speed.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use polydb_core::Database;

use crate::fixtures::Person;

/// Outcome of a stress run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressReport {
    /// Operations that returned `Ok`.
    pub ok: usize,
    /// Operations that returned an error.
    pub failed: usize,
    /// Wall-clock time across all threads.
    pub elapsed: Duration,
}

impl StressReport {
    /// Operations attempted.
    pub fn total(&self) -> usize {
        self.ok + self.failed
    }

    /// Operations per second, or zero for an instantaneous run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ops ({} failed) in {:?}, {:.0} ops/s",
            self.total(),
            self.failed,
            self.elapsed,
            self.throughput()
        )
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct identities the threads contend on.
    pub identities: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 500,
            threads: 4,
            identities: 64,
        }
    }
}

fn run_threads<F>(db: &Arc<Database>, config: &StressConfig, op: F) -> StressReport
where
    F: Fn(&Database, usize, usize) -> bool + Send + Sync + 'static,
{
    let ok = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let op = Arc::new(op);

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let db = Arc::clone(db);
            let ok = Arc::clone(&ok);
            let failed = Arc::clone(&failed);
            let op = Arc::clone(&op);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    let counter = if op(&db, t, i) { &ok } else { &failed };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Stress thread panicked");
    }

    StressReport {
        ok: ok.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    }
}

/// Concurrent upserts over a small identity space.
///
/// Every identity ends up holding the last write any thread made to it.
pub fn stress_concurrent_saves(db: Arc<Database>, config: &StressConfig) -> StressReport {
    let identities = config.identities.max(1);
    run_threads(&db, config, move |db, t, i| {
        let slot = (t * 31 + i) % identities;
        let age = u32::try_from(i % 40).unwrap_or(0);
        let mut person = Person::with_id(&format!("p{slot}"), &format!("worker{t}"), age);
        db.save(&mut person).is_ok()
    })
}

/// Concurrent mix of saves, loads and deletes (one third each).
pub fn stress_mixed_operations(db: Arc<Database>, config: &StressConfig) -> StressReport {
    let identities = config.identities.max(1);
    run_threads(&db, config, move |db, t, i| {
        let id = format!("p{}", (t * 17 + i) % identities);
        match i % 3 {
            0 => {
                let mut person = Person::with_id(&id, "Mixed", 20);
                db.save(&mut person).is_ok()
            }
            1 => db.load::<Person>(&id).is_ok(),
            _ => db.delete::<Person>(&id).is_ok(),
        }
    })
}
