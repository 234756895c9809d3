//! Error types for PolyDB core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad classes of failure, for callers that branch on kind rather than
/// on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input from the caller (empty id, missing identity).
    InvalidArgument,
    /// The call is not allowed in the database's current setup.
    InvalidOperation,
    /// The type registry or index wiring does not match what is stored.
    Configuration,
    /// The backend could not be read or written.
    Io,
    /// A payload could not be encoded or decoded.
    Serialization,
}

/// Errors that can occur in PolyDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] polydb_storage::StorageError),

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// A document's identity field is unset and cannot be generated.
    #[error("document of type {type_name} has no identity and its id field cannot be assigned")]
    MissingIdentity {
        /// Canonical type name of the document.
        type_name: &'static str,
    },

    /// A Rust type was used that the type universe does not know.
    #[error("type {type_name} is not registered in the type universe")]
    UnregisteredType {
        /// Rust type name.
        type_name: &'static str,
    },

    /// A stored type name has no registered concrete type.
    #[error("stored type name {name:?} does not resolve to a registered type")]
    UnknownTypeName {
        /// The stored name.
        name: String,
    },

    /// Index used for a query was not attached when the database was built.
    #[error("index {name:?} is not attached; attach all indexes when building the database")]
    IndexNotAttached {
        /// Index name.
        name: String,
    },

    /// Invalid setup detected while building the registry or database.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
    },

    /// A value did not have the type the registry promised.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// Rust type name that was expected.
        expected: &'static str,
    },

    /// Encoding or decoding failed.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Underlying serializer message.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns the broad class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        use polydb_storage::StorageError;

        match self {
            Self::Storage(StorageError::InvalidKey { .. })
            | Self::InvalidArgument { .. }
            | Self::MissingIdentity { .. } => ErrorKind::InvalidArgument,
            Self::Storage(StorageError::Corrupted(_))
            | Self::UnregisteredType { .. }
            | Self::UnknownTypeName { .. }
            | Self::InvalidConfiguration { .. }
            | Self::TypeMismatch { .. } => ErrorKind::Configuration,
            Self::Storage(StorageError::Io(_)) => ErrorKind::Io,
            Self::IndexNotAttached { .. } => ErrorKind::InvalidOperation,
            Self::Serialization { .. } => ErrorKind::Serialization,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydb_storage::StorageError;
    use std::io;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            CoreError::invalid_argument("empty id").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            CoreError::IndexNotAttached { name: "x".into() }.kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            CoreError::UnknownTypeName { name: "x".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CoreError::from(StorageError::Io(io::Error::other("disk"))).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            CoreError::from(StorageError::invalid_key("empty")).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(CoreError::serialization("bad").kind(), ErrorKind::Serialization);
    }

    #[test]
    fn messages_are_descriptive() {
        let err = CoreError::IndexNotAttached {
            name: "person_by_name".into(),
        };
        assert!(err.to_string().contains("person_by_name"));
    }
}
