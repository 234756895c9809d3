//! Property-based test generators using proptest.
//!
//! Provides strategies for generating documents and operation sequences
//! against a small, collision-prone id space.

use proptest::prelude::*;

use crate::fixtures::{Note, Person};

/// Strategy for person names. Mixed case so case-insensitive indexes see
/// colliding keys.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Ronnie", "RONNIE", "ronnie", "Anna", "anna", "Maria", "Zoë"])
        .prop_map(str::to_string)
}

/// Strategy for ages straddling the teen boundary.
pub fn age_strategy() -> impl Strategy<Value = u32> {
    0u32..40
}

/// Strategy for people with a fixed identity drawn from `slots` values.
pub fn person_strategy(slots: u8) -> impl Strategy<Value = Person> {
    (0..slots, name_strategy(), age_strategy())
        .prop_map(|(slot, name, age)| Person::with_id(&format!("p{slot}"), &name, age))
}

/// Strategy for content-identified notes.
pub fn note_strategy() -> impl Strategy<Value = Note> {
    (prop::string::string_regex("[a-zA-Z ]{0,12}").expect("Invalid regex"), any::<u32>())
        .prop_map(|(name, age)| Note { name, age })
}

/// One mutation in a generated workload.
#[derive(Debug, Clone)]
pub enum PersonOp {
    /// Upsert a person.
    Save(Person),
    /// Delete the person in a slot.
    Delete(u8),
}

/// Strategy for save/delete workloads over `slots` identities.
pub fn person_ops_strategy(slots: u8, max_len: usize) -> impl Strategy<Value = Vec<PersonOp>> {
    let op = prop_oneof![
        3 => person_strategy(slots).prop_map(PersonOp::Save),
        1 => (0..slots).prop_map(PersonOp::Delete),
    ];
    prop::collection::vec(op, 0..max_len)
}
