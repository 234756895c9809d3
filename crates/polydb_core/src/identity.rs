//! Identity resolution.
//!
//! The resolver turns a document into the id half of its [`DocId`]:
//!
//! - no identity field: a content id, `Uuid::new_v5` over the document's
//!   canonical JSON. Equal field state gives an equal id.
//! - unset string or UUID field: a fresh id from the [`IdGenerator`],
//!   written back into the document.
//! - set field: returned unchanged.
//! - unset integer field: [`CoreError::MissingIdentity`].
//!
//! [`DocId`]: polydb_storage::DocId

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::document::{Document, IdentityField};
use crate::error::{CoreError, CoreResult};

/// Namespace for content-derived identities.
pub const CONTENT_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_52f0_3a47_4c1e_9f0b_d4c2_a8e7_5b13);

/// Source of fresh identities.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier.
    fn next_id(&self) -> Uuid;
}

/// Random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Computes the content identity of a document.
///
/// The document is converted to a JSON value first so that map fields hash
/// in sorted key order.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn content_identity<T: serde::Serialize>(doc: &T) -> CoreResult<String> {
    let canonical = serde_json::to_vec(&serde_json::to_value(doc)?)?;
    Ok(Uuid::new_v5(&CONTENT_NAMESPACE, &canonical).to_string())
}

/// Resolves and assigns document identities.
#[derive(Clone)]
pub struct IdentityResolver {
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(Arc::new(RandomIds))
    }
}

impl IdentityResolver {
    /// Creates a resolver that draws fresh ids from `ids`.
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Returns the document's identity, assigning one if it is unset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingIdentity`] if the identity field is unset
    /// and cannot be assigned, or a serialization error when computing a
    /// content identity fails.
    pub fn resolve<T: Document>(&self, doc: &mut T) -> CoreResult<String> {
        if let Some(field) = doc.id_field_mut() {
            return match field.current() {
                Some(id) => Ok(id),
                None => field
                    .assign(self.ids.as_ref())
                    .ok_or(CoreError::MissingIdentity {
                        type_name: T::TYPE_NAME,
                    }),
            };
        }
        content_identity(doc)
    }

    /// Returns the document's identity without assigning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the identity field is unset.
    pub fn peek<T: Document>(&self, doc: &T) -> CoreResult<String> {
        match doc.id_field() {
            Some(field) => field.current().ok_or_else(|| {
                CoreError::invalid_argument(format!(
                    "document of type {} has no identity yet",
                    T::TYPE_NAME
                ))
            }),
            None => content_identity(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NoIdentity;
    use crate::error::ErrorKind;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Named {
        id: String,
        name: String,
    }

    impl Document for Named {
        const TYPE_NAME: &'static str = "test.Named";
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
        name: String,
        age: u32,
    }

    impl Document for Note {
        const TYPE_NAME: &'static str = "test.Note";
        type Id = NoIdentity;
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Numbered {
        id: Option<i64>,
    }

    impl Document for Numbered {
        const TYPE_NAME: &'static str = "test.Numbered";
        type Id = Option<i64>;

        fn id_field(&self) -> Option<&Option<i64>> {
            Some(&self.id)
        }

        fn id_field_mut(&mut self) -> Option<&mut Option<i64>> {
            Some(&mut self.id)
        }
    }

    struct Sequential(AtomicU64);

    impl IdGenerator for Sequential {
        fn next_id(&self) -> Uuid {
            Uuid::from_u128(u128::from(self.0.fetch_add(1, Ordering::Relaxed)) + 1)
        }
    }

    #[test]
    fn assigns_missing_string_id() {
        let resolver = IdentityResolver::new(Arc::new(Sequential(AtomicU64::new(0))));
        let mut doc = Named {
            id: String::new(),
            name: "Ronnie".into(),
        };

        let id = resolver.resolve(&mut doc).unwrap();
        assert_eq!(id, Uuid::from_u128(1).to_string());
        assert_eq!(doc.id, id);
    }

    #[test]
    fn keeps_existing_string_id() {
        let resolver = IdentityResolver::default();
        let mut doc = Named {
            id: "abc".into(),
            name: "Ronnie".into(),
        };

        assert_eq!(resolver.resolve(&mut doc).unwrap(), "abc");
        assert_eq!(doc.id, "abc");
    }

    #[test]
    fn content_identity_is_deterministic() {
        let resolver = IdentityResolver::default();
        let mut a = Note {
            name: "Ronnie".into(),
            age: 29,
        };
        let mut b = a.clone();

        let id_a = resolver.resolve(&mut a).unwrap();
        assert_eq!(id_a, resolver.resolve(&mut b).unwrap());

        b.age = 30;
        assert_ne!(id_a, resolver.resolve(&mut b).unwrap());
        assert_eq!(id_a, resolver.peek(&a).unwrap());
    }

    #[test]
    fn unset_numeric_id_fails() {
        let resolver = IdentityResolver::default();
        let mut doc = Numbered { id: None };

        let err = resolver.resolve(&mut doc).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(doc.id, None);

        let mut doc = Numbered { id: Some(7) };
        assert_eq!(resolver.resolve(&mut doc).unwrap(), "7");
    }

    #[test]
    fn peek_does_not_assign() {
        let resolver = IdentityResolver::default();
        let doc = Named {
            id: String::new(),
            name: "Anna".into(),
        };

        let err = resolver.peek(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(doc.id.is_empty());
    }
}
