//! # PolyDB Core
//!
//! Core document engine for PolyDB.
//!
//! This crate provides:
//! - The [`Document`] trait and identity fields
//! - Identity resolution, including content-derived ids
//! - A pluggable [`Serializer`] with a JSON implementation
//! - The [`TypeUniverse`] registry for polymorphic reads
//! - Concurrent [`SecondaryIndex`]es kept in step with every write
//! - The [`Database`] orchestrator and its indexed [`Query`] builder
//!
//! ## Example
//!
//! ```rust
//! use polydb_core::{CaseInsensitive, Database, Document, SecondaryIndex, TypeUniverse};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Person {
//!     id: String,
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Document for Person {
//!     const TYPE_NAME: &'static str = "demo.Person";
//!     type Id = String;
//!
//!     fn id_field(&self) -> Option<&String> {
//!         Some(&self.id)
//!     }
//!
//!     fn id_field_mut(&mut self) -> Option<&mut String> {
//!         Some(&mut self.id)
//!     }
//! }
//!
//! let by_name = Arc::new(
//!     SecondaryIndex::builder("person_by_name", |p: &Person| p.name.clone())
//!         .include(|p| p.age >= 13)
//!         .comparer(CaseInsensitive)
//!         .build(),
//! );
//! let universe = TypeUniverse::builder().register::<Person>().build().unwrap();
//! let db = Database::builder(universe).index(by_name.clone()).open().unwrap();
//!
//! let mut ronnie = Person { id: String::new(), name: "Ronnie".into(), age: 29 };
//! let mut anna = Person { id: String::new(), name: "Anna".into(), age: 7 };
//! db.save(&mut ronnie).unwrap();
//! db.save(&mut anna).unwrap();
//!
//! let hits = db.query(&by_name).unwrap().keys(|name| name == "RONNIE").fetch().unwrap();
//! assert_eq!(hits, vec![ronnie]);
//! assert!(db.query(&by_name).unwrap().keys(|name| name == "Anna").fetch().unwrap().is_empty());
//! assert_eq!(db.all::<Person>().unwrap().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod document;
mod error;
mod identity;
pub mod index;
mod query;
mod serializer;
mod stats;
mod universe;

pub use config::Config;
pub use database::{Database, DatabaseBuilder, Documents};
pub use document::{Document, IdentityField, NoIdentity};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use identity::{content_identity, IdGenerator, IdentityResolver, RandomIds, CONTENT_NAMESPACE};
pub use index::{
    CaseInsensitive, DocumentIndex, IndexId, IndexKey, KeyComparer, KeyRef, NaturalEq,
    SecondaryIndex, SecondaryIndexBuilder,
};
pub use query::Query;
pub use serializer::{decode_document, encode_document, JsonSerializer, Serializer};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use universe::{AnyBox, ConcreteType, TypeKey, TypeUniverse, TypeUniverseBuilder};

pub use polydb_storage::{
    DocId, FileSystemBackend, FileSystemOptions, InMemoryBackend, StorageBackend, StorageError,
    StorageRecord, WriteThroughBackend,
};

/// Crate version, as recorded in the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
