//! CLI command implementations.

pub mod add;
pub mod list;
pub mod remove;
pub mod settings;
pub mod stats;
