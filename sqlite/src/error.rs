//! Error types for the documentation store and the build.
//!
//! [`SqliteError`] covers store-level failures. [`BuildError`] is the
//! taxonomy a whole build reports: every variant except
//! [`BuildError::Configuration`] halts the build at the first occurrence.

use std::path::PathBuf;

use dal_doc_core::{CollectError, FieldReferenceError};
use dal_doc_db::ConfigurationError;
use thiserror::Error;

/// Errors that can occur during documentation store operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A row could not be written to the store.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Creating or dropping the store tables failed.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// A read-back query was asked for something the store does not hold.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Errors that end a documentation build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Required build parameters are missing; every problem is listed.
    #[error("invalid configuration: {}", join_messages(.0))]
    Configuration(Vec<ConfigurationError>),

    /// The source database could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The live schema could not be read.
    #[error("schema extraction error: {0}")]
    SchemaExtraction(String),

    /// Entry-point definitions could not be collected.
    #[error(transparent)]
    Collection(#[from] CollectError),

    /// A description refers to a malformed field or an unknown table.
    #[error("invalid description {description}: {source}")]
    FieldReference {
        description: String,
        #[source]
        source: FieldReferenceError,
    },

    /// A row refers to an element that was never registered.
    #[error("{owner} references unknown {kind} '{name}'")]
    ReferentialIntegrity {
        owner: String,
        kind: String,
        name: String,
    },

    /// The store could not be initialized or written.
    #[error("persistence error: {0}")]
    Persistence(#[from] SqliteError),

    /// A store or snapshot file could not be removed or written.
    #[error("cannot write {}: {reason}", path.display())]
    ArtifactIo { path: PathBuf, reason: String },

    /// A description reached persistence without a successful check.
    #[error("description {0} was persisted before being checked")]
    Unvalidated(String),
}

impl From<rusqlite::Error> for BuildError {
    fn from(err: rusqlite::Error) -> Self {
        BuildError::Persistence(SqliteError::DatabaseError(err))
    }
}

fn join_messages(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_lists_every_problem() {
        let err = BuildError::Configuration(vec![
            ConfigurationError::MissingParameter("store"),
            ConfigurationError::MissingParameter("requests"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid configuration: missing required parameter: store; missing required parameter: requests"
        );
    }

    #[test]
    fn test_referential_integrity_message() {
        let err = BuildError::ReferentialIntegrity {
            owner: "procedure auth/login".into(),
            kind: "request".into(),
            name: "user/missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "procedure auth/login references unknown request 'user/missing'"
        );
    }
}
