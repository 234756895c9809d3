//! Error types for the catalogue commands.

use polydb_core::CoreError;
use thiserror::Error;

/// Result alias for catalogue commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors raised by catalogue commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The feed is already in the catalogue.
    #[error("feed {url} is already subscribed as {id}")]
    DuplicateFeed {
        /// The rejected feed URL.
        url: String,
        /// Identity of the existing podcast.
        id: String,
    },

    /// No podcast has this identity.
    #[error("no podcast with id {id}")]
    UnknownPodcast {
        /// The identity that was looked up.
        id: String,
    },

    /// A command argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },
}

impl CliError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
