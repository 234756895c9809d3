//! Key equality for indexes.
//!
//! A comparer maps each key to a canonical form. Two keys are equal exactly
//! when their canonical forms are, both when the index buckets a document
//! and when a query predicate compares a bucket key through [`KeyRef`].

use std::fmt;
use std::hash::Hash;
use std::ops::Deref;

/// Equality used by an index.
pub trait KeyComparer<K>: Send + Sync + 'static {
    /// Hashable canonical form.
    type Canonical: Hash + Eq + Clone + Send + Sync + 'static;

    /// Returns the canonical form of `key`.
    fn canonicalize(&self, key: &K) -> Self::Canonical;

    /// Whether `a` and `b` are equal under this comparer.
    fn equals(&self, a: &K, b: &K) -> bool {
        self.canonicalize(a) == self.canonicalize(b)
    }
}

/// The key type's own `Eq` and `Hash`. Tuples and derived structs compare
/// field by field.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalEq;

impl<K> KeyComparer<K> for NaturalEq
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    type Canonical = K;

    fn canonicalize(&self, key: &K) -> K {
        key.clone()
    }

    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Unicode case-insensitive string equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl KeyComparer<String> for CaseInsensitive {
    type Canonical = String;

    fn canonicalize(&self, key: &String) -> String {
        key.to_lowercase()
    }
}

impl KeyComparer<Option<String>> for CaseInsensitive {
    type Canonical = Option<String>;

    fn canonicalize(&self, key: &Option<String>) -> Option<String> {
        key.as_deref().map(str::to_lowercase)
    }
}

/// A bucket key handed to query predicates.
///
/// `==` goes through the index's comparer, so for a case-insensitive index
/// `key == "RONNIE"` matches a bucket holding `"Ronnie"`. The raw key is
/// reachable through `Deref`.
pub struct KeyRef<'a, K, C> {
    key: &'a K,
    comparer: &'a C,
}

impl<'a, K, C> KeyRef<'a, K, C> {
    pub(crate) fn new(key: &'a K, comparer: &'a C) -> Self {
        Self { key, comparer }
    }

    /// The raw bucket key.
    pub fn key(&self) -> &'a K {
        self.key
    }
}

impl<K, C> Clone for KeyRef<'_, K, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, C> Copy for KeyRef<'_, K, C> {}

impl<K, C> Deref for KeyRef<'_, K, C> {
    type Target = K;

    fn deref(&self) -> &K {
        self.key
    }
}

impl<K: fmt::Debug, C> fmt::Debug for KeyRef<'_, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}

impl<K, C: KeyComparer<K>> PartialEq<K> for KeyRef<'_, K, C> {
    fn eq(&self, other: &K) -> bool {
        self.comparer.equals(self.key, other)
    }
}

impl<C: KeyComparer<String>> PartialEq<str> for KeyRef<'_, String, C> {
    fn eq(&self, other: &str) -> bool {
        self.comparer.equals(self.key, &other.to_string())
    }
}

impl<C: KeyComparer<String>> PartialEq<&str> for KeyRef<'_, String, C> {
    fn eq(&self, other: &&str) -> bool {
        self.comparer.equals(self.key, &(*other).to_string())
    }
}
