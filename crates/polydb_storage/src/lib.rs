//! # PolyDB Storage
//!
//! Storage backend trait and implementations for PolyDB.
//!
//! Backends are **opaque text stores** keyed by [`DocId`]: a canonical type
//! name plus an identity string. They never decode payloads and never consult
//! the type registry; mapping stored type names back to document types is the
//! database's job.
//!
//! ## Design Principles
//!
//! - One physical namespace per concrete type name
//! - Retrieval hands out owned copies, never references into backend state
//! - Must be `Send + Sync` for concurrent access
//! - No internal retries: every failure surfaces to the caller
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and as the hot tier of the cache
//! - [`FileSystemBackend`] - One directory per type, one file per document
//! - [`WriteThroughBackend`] - In-memory mirror in front of a durable backend
//!
//! ## Example
//!
//! ```rust
//! use polydb_storage::{DocId, InMemoryBackend, StorageBackend, StorageRecord};
//!
//! let backend = InMemoryBackend::new();
//! let key = DocId::new("demo.Person", "ronnie");
//! backend.store(&[StorageRecord::new(key.clone(), "{\"age\":29}")]).unwrap();
//! assert_eq!(backend.retrieve(&key).unwrap().as_deref(), Some("{\"age\":29}"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod lock_pool;
mod memory;
mod path;
mod write_through;

pub use backend::{DocId, RecordIter, StorageBackend, StorageRecord};
pub use error::{StorageError, StorageResult};
pub use file::{FileSystemBackend, FileSystemOptions};
pub use memory::InMemoryBackend;
pub use write_through::WriteThroughBackend;
