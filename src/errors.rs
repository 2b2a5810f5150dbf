//! Errors.
use crate::metadata::TypeKind;

/// Possible errors returned by the query executor and the metadata sources.
///
/// Every operation fails fast; nothing is retried or recovered internally.
/// Deleting ids that do not exist is the one deliberate exception and is a
/// successful no-op rather than an error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Underlying database error (the internal error kind).
    ///
    /// The driver message is preserved as the error source.
    #[error("database error")]
    Db(#[from] sqlx::Error),

    /// No open transaction, a closed connection, or a schema newer than this
    /// library.
    #[error("{message}")]
    FailedPrecondition {
        /// What was violated.
        message: String,
    },

    /// A uniqueness constraint rejected an insert.
    #[error("{message}")]
    AlreadyExists {
        /// Which row already exists.
        message: String,
    },

    /// A row the API contract requires was not found.
    #[error("{message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// Malformed list options, filter query or argument value.
    #[error("{message}")]
    InvalidArgument {
        /// What was malformed.
        message: String,
    },

    /// The stored schema is in a state that cannot be read without losing
    /// data, such as a partial legacy schema.
    #[error("{message}")]
    DataLoss {
        /// What was detected.
        message: String,
    },

    /// The operation is not supported by this executor variant.
    #[error("{operation} is not supported by this executor")]
    Unimplemented {
        /// Name of the unsupported operation.
        operation: &'static str,
    },
}

impl QueryError {
    pub(crate) fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
        }
    }

    pub(crate) fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn data_loss(message: impl Into<String>) -> Self {
        Self::DataLoss {
            message: message.into(),
        }
    }

    pub(crate) fn type_already_exists(kind: TypeKind, name: &str) -> Self {
        Self::already_exists(format!(
            "{} type with the name {:?} already exists",
            kind, name
        ))
    }
}

/// Tells whether a driver error reports a uniqueness violation.
///
/// SQLite reports `UNIQUE constraint failed`, MySQL `Duplicate entry`.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(e) = e {
        let message = e.message();
        message.contains("UNIQUE constraint failed") || message.contains("Duplicate entry")
    } else {
        false
    }
}
