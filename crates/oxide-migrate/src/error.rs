//! Error types for migration SQL generation.

use std::path::PathBuf;

use crate::operations::OperationKind;

/// Errors raised while validating operations or generating SQL.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A required argument of an operation is missing or malformed.
    #[error("Invalid {operation} operation: {message}")]
    Precondition {
        /// The operation that failed validation.
        operation: OperationKind,
        /// What was wrong with it.
        message: String,
    },

    /// The generator has no handler for the operation.
    #[error("The generator '{generator}' does not know how to generate '{operation}'")]
    UnknownOperation {
        /// The dialect that was asked.
        generator: String,
        /// Name of the operation type.
        operation: String,
    },

    /// The base handler has no generic SQL and the dialect did not override it.
    #[error("'{operation}' is not implemented by the '{generator}' generator")]
    NotImplemented {
        /// The dialect that was asked.
        generator: String,
        /// The operation without a handler.
        operation: OperationKind,
    },

    /// The dialect cannot express the operation.
    #[error("'{operation}' is not supported by {generator}: {reason}")]
    NotSupported {
        /// The dialect that rejected the operation.
        generator: String,
        /// The rejected operation.
        operation: OperationKind,
        /// Why the dialect rejects it.
        reason: String,
    },

    /// IO error (reading operation files or writing scripts).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read an operation file.
    #[error("Failed to parse operation file '{path}': {source}")]
    Parse {
        /// Path to the operation file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<MigrationError>),
}

impl MigrationError {
    pub(crate) fn precondition(operation: OperationKind, message: impl Into<String>) -> Self {
        Self::Precondition {
            operation,
            message: message.into(),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
