//! Document trait and identity fields.
//!
//! A [`Document`] is a serde-serializable record persisted under its
//! canonical [`TYPE_NAME`](Document::TYPE_NAME). Its identity comes from an
//! optional identity field whose type decides whether the engine may assign
//! a value:
//!
//! | Field type                     | Unset when        | Assignable |
//! |--------------------------------|-------------------|------------|
//! | `String` / `Option<String>`    | empty / `None`    | yes        |
//! | `Uuid` / `Option<Uuid>`        | nil / `None`      | yes        |
//! | integers / `Option<integer>`   | `None` only       | no         |
//! | no field ([`NoIdentity`])      | always            | content id |

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::identity::IdGenerator;

/// A record type the database can persist.
///
/// # Example
///
/// ```rust
/// use polydb_core::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Person {
///     id: String,
///     name: String,
///     age: u32,
/// }
///
/// impl Document for Person {
///     const TYPE_NAME: &'static str = "demo.Person";
///     type Id = String;
///
///     fn id_field(&self) -> Option<&String> {
///         Some(&self.id)
///     }
///
///     fn id_field_mut(&mut self) -> Option<&mut String> {
///         Some(&mut self.id)
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Canonical type name. Storage namespaces documents by this name, so it
    /// must stay stable across releases.
    const TYPE_NAME: &'static str;

    /// Type of the identity field, or [`NoIdentity`].
    type Id: IdentityField;

    /// Returns the identity field, if the type has one.
    fn id_field(&self) -> Option<&Self::Id> {
        None
    }

    /// Returns the identity field mutably, if the type has one.
    fn id_field_mut(&mut self) -> Option<&mut Self::Id> {
        None
    }
}

/// A field that can hold a document identity.
pub trait IdentityField: Send + Sync + 'static {
    /// Returns the identity as a string, or `None` if unset.
    fn current(&self) -> Option<String>;

    /// Generates an identity, writes it into the field and returns it.
    ///
    /// Returns `None` for field types that are never assigned.
    fn assign(&mut self, ids: &dyn IdGenerator) -> Option<String>;
}

/// Identity type for documents without an identity field.
///
/// Such documents get a content-derived identity. The enum has no variants,
/// so no value of it ever exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoIdentity {}

impl IdentityField for NoIdentity {
    fn current(&self) -> Option<String> {
        match *self {}
    }

    fn assign(&mut self, _ids: &dyn IdGenerator) -> Option<String> {
        match *self {}
    }
}

/// A blank or whitespace-only string counts as unset.
impl IdentityField for String {
    fn current(&self) -> Option<String> {
        (!self.trim().is_empty()).then(|| self.clone())
    }

    fn assign(&mut self, ids: &dyn IdGenerator) -> Option<String> {
        *self = ids.next_id().to_string();
        Some(self.clone())
    }
}

impl IdentityField for Option<String> {
    fn current(&self) -> Option<String> {
        self.as_ref().and_then(IdentityField::current)
    }

    fn assign(&mut self, ids: &dyn IdGenerator) -> Option<String> {
        self.get_or_insert_with(String::new).assign(ids)
    }
}

impl IdentityField for Uuid {
    fn current(&self) -> Option<String> {
        (!self.is_nil()).then(|| self.to_string())
    }

    fn assign(&mut self, ids: &dyn IdGenerator) -> Option<String> {
        *self = ids.next_id();
        Some(self.to_string())
    }
}

impl IdentityField for Option<Uuid> {
    fn current(&self) -> Option<String> {
        self.as_ref().and_then(IdentityField::current)
    }

    fn assign(&mut self, ids: &dyn IdGenerator) -> Option<String> {
        self.get_or_insert_with(Uuid::nil).assign(ids)
    }
}

macro_rules! integer_identity {
    ($($t:ty),* $(,)?) => {$(
        impl IdentityField for $t {
            fn current(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn assign(&mut self, _ids: &dyn IdGenerator) -> Option<String> {
                None
            }
        }

        impl IdentityField for Option<$t> {
            fn current(&self) -> Option<String> {
                self.map(|value| value.to_string())
            }

            fn assign(&mut self, _ids: &dyn IdGenerator) -> Option<String> {
                None
            }
        }
    )*};
}

integer_identity!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);
