//! Benchmark utilities.

use polydb_testkit::fixtures::Person;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// A random alphanumeric string of `len` characters.
pub fn random_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// `count` people with fixed ids `p0..pN` and random names.
pub fn people(count: usize) -> Vec<Person> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| Person::with_id(&format!("p{i}"), &random_name(8), rng.gen_range(0..80)))
        .collect()
}

/// A JSON payload of roughly `size` bytes.
pub fn payload(size: usize) -> String {
    format!(r#"{{"blob":"{}"}}"#, random_name(size.saturating_sub(11)))
}
