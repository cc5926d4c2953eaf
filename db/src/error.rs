//! Error types for configuration, schema sources and definition files.
//!
//! [`DatabaseError`] covers I/O, serialization and source-database failures.
//! [`ConfigurationError`] is reported separately because missing build
//! parameters are gathered into a list rather than failing one at a time.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading schemas, snapshots or definitions.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The source database could not be reached.
    #[error("cannot connect to {location}: {reason}")]
    Connection { location: String, reason: String },

    /// The live schema could not be read.
    #[error("cannot read schema from {location}: {reason}")]
    SchemaExtraction { location: String, reason: String },

    /// An entry-point definition file is malformed.
    #[error("invalid definition {}: {reason}", path.display())]
    InvalidDefinition { path: PathBuf, reason: String },
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// A required build parameter is missing or contradictory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Required parameter not provided.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Two mutually exclusive parameters were both provided.
    #[error("parameters {0} and {1} are mutually exclusive")]
    Conflict(&'static str, &'static str),

    /// Table prefix contains characters other than alphanumerics and underscores.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),
}
