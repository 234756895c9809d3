//! # PolyDB Testkit
//!
//! Test utilities for PolyDB.
//!
//! This crate provides:
//! - Document fixtures covering every identity shape and a small
//!   polymorphic family (`Animal`: `Cat`, `Dog`, `Cow`)
//! - Test databases over every backend variant, with reopen support
//! - Property-based test generators using proptest
//! - A model-checking harness for index consistency
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polydb_testkit::prelude::*;
//!
//! #[test]
//! fn saves_on_every_backend() {
//!     for kind in BackendKind::ALL {
//!         let test_db = TestDatabase::new(kind);
//!         test_db.save(&mut Person::new("Ronnie", 29)).unwrap();
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
