//! Type universe: the registry of concrete document types.
//!
//! Storage addresses documents by canonical type name, and base-type reads
//! need every stored concrete type that can be viewed as that base. The
//! universe answers both questions from an explicit registration list built
//! once at startup:
//!
//! ```rust
//! use polydb_core::{Document, NoIdentity, TypeUniverse};
//! use serde::{Deserialize, Serialize};
//!
//! trait Animal: Send {
//!     fn sound(&self) -> &'static str;
//! }
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Cat;
//!
//! impl Animal for Cat {
//!     fn sound(&self) -> &'static str {
//!         "meow"
//!     }
//! }
//!
//! impl Document for Cat {
//!     const TYPE_NAME: &'static str = "zoo.Cat";
//!     type Id = NoIdentity;
//! }
//!
//! let universe = TypeUniverse::builder()
//!     .register::<Cat>()
//!     .assignable::<Cat, Box<dyn Animal>>(|cat| Box::new(cat))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(universe.subtypes_of::<Box<dyn Animal>>().len(), 1);
//! assert_eq!(universe.resolve("zoo.Cat").unwrap().rust_name(), std::any::type_name::<Cat>());
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::serializer::{decode_document, Serializer};

/// A type-erased value moving between the registry and its callers.
pub type AnyBox = Box<dyn Any + Send>;

type DecodeFn = fn(&dyn Serializer, &str) -> CoreResult<AnyBox>;
type UpcastFn = Arc<dyn Fn(AnyBox) -> Option<AnyBox> + Send + Sync>;

/// A Rust type identified at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    rust_name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
        }
    }

    /// The `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, for diagnostics.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }
}

struct Upcast {
    target: TypeKey,
    cast: UpcastFn,
}

/// A registered concrete document type.
pub struct ConcreteType {
    name: &'static str,
    key: TypeKey,
    decode: DecodeFn,
    upcasts: HashMap<TypeId, Upcast>,
}

impl fmt::Debug for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteType")
            .field("name", &self.name)
            .field("rust_name", &self.key.rust_name)
            .field("assignable_to", &self.upcasts.len())
            .finish()
    }
}

fn decode_erased<T: Document>(serializer: &dyn Serializer, text: &str) -> CoreResult<AnyBox> {
    Ok(Box::new(decode_document::<T>(serializer, text)?))
}

impl ConcreteType {
    fn of<T: Document>() -> Self {
        let key = TypeKey::of::<T>();
        let identity: UpcastFn = Arc::new(|value: AnyBox| Some(value));
        let mut upcasts = HashMap::new();
        upcasts.insert(
            key.id,
            Upcast {
                target: key,
                cast: identity,
            },
        );

        Self {
            name: T::TYPE_NAME,
            key,
            decode: decode_erased::<T>,
            upcasts,
        }
    }

    /// Canonical name used by storage.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type name.
    pub fn rust_name(&self) -> &'static str {
        self.key.rust_name
    }

    /// The Rust type.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Whether values of this type can be viewed as `target`.
    pub fn is_assignable_to(&self, target: TypeId) -> bool {
        self.upcasts.contains_key(&target)
    }

    /// Every type this one can be viewed as, itself included.
    pub fn supertypes(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.upcasts.values().map(|upcast| upcast.target)
    }

    /// Decodes a stored payload into a boxed value of this type.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload does not decode.
    pub fn decode(&self, serializer: &dyn Serializer, text: &str) -> CoreResult<AnyBox> {
        (self.decode)(serializer, text)
    }

    /// Converts a boxed value of this type into the `target` view.
    ///
    /// Returns `None` if this type is not assignable to `target` or the box
    /// does not hold this type.
    pub fn upcast(&self, value: AnyBox, target: TypeId) -> Option<AnyBox> {
        self.upcasts.get(&target).and_then(|upcast| (upcast.cast)(value))
    }

    /// Decodes a stored payload directly into the `B` view.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if this type is not assignable to
    /// `B`, checked before the payload is decoded, or a serialization error
    /// if decoding fails.
    pub fn materialize<B: 'static>(&self, serializer: &dyn Serializer, text: &str) -> CoreResult<B> {
        let mismatch = || CoreError::TypeMismatch {
            expected: type_name::<B>(),
        };
        if !self.is_assignable_to(TypeId::of::<B>()) {
            return Err(mismatch());
        }
        let decoded = self.decode(serializer, text)?;
        self.upcast(decoded, TypeId::of::<B>())
            .and_then(|view| view.downcast::<B>().ok())
            .map(|view| *view)
            .ok_or_else(mismatch)
    }
}

/// Builder for [`TypeUniverse`].
#[derive(Default)]
pub struct TypeUniverseBuilder {
    types: Vec<ConcreteType>,
    pending: Vec<(TypeKey, Upcast)>,
}

impl fmt::Debug for TypeUniverseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeUniverseBuilder")
            .field("types", &self.types)
            .field("pending_upcasts", &self.pending.len())
            .finish()
    }
}

impl TypeUniverseBuilder {
    /// Registers a concrete document type.
    #[must_use]
    pub fn register<T: Document>(mut self) -> Self {
        self.types.push(ConcreteType::of::<T>());
        self
    }

    /// Declares that `S` can be viewed as `B` through `cast`.
    ///
    /// `S` must also be passed to [`register`](Self::register).
    #[must_use]
    pub fn assignable<S, B>(mut self, cast: fn(S) -> B) -> Self
    where
        S: Document,
        B: Send + 'static,
    {
        let erased: UpcastFn = Arc::new(move |value: AnyBox| {
            value
                .downcast::<S>()
                .ok()
                .map(|source| Box::new(cast(*source)) as AnyBox)
        });
        self.pending.push((
            TypeKey::of::<S>(),
            Upcast {
                target: TypeKey::of::<B>(),
                cast: erased,
            },
        ));
        self
    }

    /// Builds the universe.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfiguration`] for an empty or duplicate
    /// type name, a type registered twice, or an assignability declared for
    /// an unregistered type.
    pub fn build(self) -> CoreResult<TypeUniverse> {
        let mut by_name = HashMap::with_capacity(self.types.len());
        let mut by_type = HashMap::with_capacity(self.types.len());

        for (slot, ty) in self.types.iter().enumerate() {
            if ty.name.is_empty() {
                return Err(CoreError::invalid_configuration(format!(
                    "{} has an empty TYPE_NAME",
                    ty.key.rust_name
                )));
            }
            if let Some(&other) = by_name.get(ty.name) {
                let other: &ConcreteType = &self.types[other];
                return Err(CoreError::invalid_configuration(format!(
                    "type name {:?} is used by both {} and {}",
                    ty.name, other.key.rust_name, ty.key.rust_name
                )));
            }
            if by_type.insert(ty.key.id, slot).is_some() {
                return Err(CoreError::invalid_configuration(format!(
                    "{} is registered twice",
                    ty.key.rust_name
                )));
            }
            by_name.insert(ty.name, slot);
        }

        let mut types = self.types;
        for (source, upcast) in self.pending {
            let Some(&slot) = by_type.get(&source.id) else {
                return Err(CoreError::invalid_configuration(format!(
                    "{} is declared assignable to {} but is not registered",
                    source.rust_name, upcast.target.rust_name
                )));
            };
            types[slot].upcasts.insert(upcast.target.id, upcast);
        }

        Ok(TypeUniverse {
            types,
            by_name,
            by_type,
        })
    }
}

/// Registry of every concrete document type known to a database.
pub struct TypeUniverse {
    types: Vec<ConcreteType>,
    by_name: HashMap<&'static str, usize>,
    by_type: HashMap<TypeId, usize>,
}

impl fmt::Debug for TypeUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeUniverse")
            .field("types", &self.types)
            .finish()
    }
}

impl TypeUniverse {
    /// Starts a registration list.
    pub fn builder() -> TypeUniverseBuilder {
        TypeUniverseBuilder::default()
    }

    /// Every registered type, in registration order.
    pub fn types(&self) -> &[ConcreteType] {
        &self.types
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Looks up a type by its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTypeName`] if nothing is registered under
    /// `name`.
    pub fn resolve(&self, name: &str) -> CoreResult<&ConcreteType> {
        self.by_name
            .get(name)
            .map(|&slot| &self.types[slot])
            .ok_or_else(|| CoreError::UnknownTypeName {
                name: name.to_string(),
            })
    }

    /// Looks up the registration of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnregisteredType`] if `T` is not registered.
    pub fn concrete<T: 'static>(&self) -> CoreResult<&ConcreteType> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|&slot| &self.types[slot])
            .ok_or(CoreError::UnregisteredType {
                type_name: type_name::<T>(),
            })
    }

    /// Every concrete type assignable to `B`, in registration order.
    pub fn subtypes_of<B: ?Sized + 'static>(&self) -> Vec<&ConcreteType> {
        self.subtypes_of_id(TypeId::of::<B>())
    }

    pub(crate) fn subtypes_of_id(&self, target: TypeId) -> Vec<&ConcreteType> {
        self.types
            .iter()
            .filter(|ty| ty.is_assignable_to(target))
            .collect()
    }

    /// Every type registered `S` can be viewed as, `S` included.
    ///
    /// Returns an empty list if `S` is not registered.
    pub fn supertypes_of<S: 'static>(&self) -> Vec<TypeKey> {
        self.concrete::<S>()
            .map(|ty| ty.supertypes().collect())
            .unwrap_or_default()
    }
}
