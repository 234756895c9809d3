//! Cross-crate integration test helpers.
//!
//! [`IndexHarness`] runs save/delete workloads against a database with an
//! attached name index while tracking the expected state in a plain map,
//! then checks that storage and the index agree with the model.

use std::collections::HashMap;
use std::sync::Arc;

use polydb_core::{CoreResult, DocId, Document};

use crate::fixtures::{teen_name_index, BackendKind, NameIndex, Person, TestDatabase};
use crate::generators::PersonOp;

/// A test harness for index consistency checks.
pub struct IndexHarness {
    /// The database under test.
    pub db: TestDatabase,
    /// Case-insensitive teen name index attached to `db`.
    pub index: Arc<NameIndex>,
    people: HashMap<String, Person>,
}

impl IndexHarness {
    /// Creates a harness on `kind`.
    pub fn new(kind: BackendKind) -> Self {
        let index = teen_name_index();
        let attached = Arc::clone(&index);
        let db = TestDatabase::with(kind, move |builder| builder.index(attached));
        Self {
            db,
            index,
            people: HashMap::new(),
        }
    }

    /// Applies one operation to the database and to the model.
    ///
    /// # Errors
    ///
    /// Returns the database error, if any.
    pub fn apply(&mut self, op: &PersonOp) -> CoreResult<()> {
        match op {
            PersonOp::Save(person) => {
                let mut person = person.clone();
                self.db.save(&mut person)?;
                self.people.insert(person.id.clone(), person);
            }
            PersonOp::Delete(slot) => {
                let id = format!("p{slot}");
                self.db.delete::<Person>(&id)?;
                self.people.remove(&id);
            }
        }
        Ok(())
    }

    /// Closes and reopens the database, re-seeding a fresh index.
    pub fn reopen(self) -> Self {
        let index = teen_name_index();
        let attached = Arc::clone(&index);
        let db = self.db.reopen(move |builder| builder.index(attached));
        Self {
            db,
            index,
            people: self.people,
        }
    }

    /// Number of people the model expects in storage.
    pub fn tracked_count(&self) -> usize {
        self.people.len()
    }

    /// Panics unless storage and index agree with the model.
    ///
    /// - every stored person is in the model, and vice versa
    /// - every stored person aged 13 or over is in the bucket of its name
    /// - no other id appears in any bucket
    pub fn verify(&self) {
        let stored = self.db.all::<Person>().expect("Failed to enumerate people");
        assert_eq!(stored.len(), self.people.len(), "stored count mismatch");
        for person in &stored {
            assert_eq!(self.people.get(&person.id), Some(person), "stored person drifted");
        }

        let mut expected_in_index = 0;
        for person in self.people.values() {
            let key = DocId::new(Person::TYPE_NAME, person.id.clone());
            let bucket = self.index.query_exact(&person.name);
            if person.age >= 13 {
                expected_in_index += 1;
                assert!(bucket.contains(&key), "{key} missing from its bucket");
            } else {
                assert!(!self.index.contains(&key), "{key} indexed despite predicate");
            }
        }

        let all_indexed = self.index.query(|_| true);
        assert_eq!(all_indexed.len(), expected_in_index, "index holds stray ids");
        assert_eq!(self.index.len(), expected_in_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_tracks_saves_and_deletes() {
        let mut harness = IndexHarness::new(BackendKind::Memory);
        harness
            .apply(&PersonOp::Save(Person::with_id("p0", "Ronnie", 29)))
            .unwrap();
        harness
            .apply(&PersonOp::Save(Person::with_id("p1", "Anna", 7)))
            .unwrap();
        harness.apply(&PersonOp::Delete(0)).unwrap();

        assert_eq!(harness.tracked_count(), 1);
        harness.verify();
    }

    #[test]
    fn test_harness_survives_reopen() {
        for kind in BackendKind::ALL {
            let mut harness = IndexHarness::new(kind);
            harness
                .apply(&PersonOp::Save(Person::with_id("p0", "Ronnie", 29)))
                .unwrap();
            let harness = harness.reopen();
            assert_eq!(harness.index.len(), 1);
            harness.verify();
        }
    }
}
