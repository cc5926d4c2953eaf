//! Schema sources.
//!
//! A [`SchemaSource`] yields the raw `table -> [fields]` map a build starts
//! from. The live-database connector lives with the store backend; this
//! module provides the snapshot-file source and the in-memory source.

use std::path::{Path, PathBuf};

use dal_doc_core::RawSchema;

use crate::error::{DatabaseError, Result};

/// Boundary to the database whose schema is being documented.
pub trait SchemaSource {
    /// Human-readable location of the source, used in messages.
    fn location(&self) -> String;

    /// Reads the current schema.
    ///
    /// # Errors
    ///
    /// Implementations return [`DatabaseError::Connection`] when the source
    /// cannot be reached and [`DatabaseError::SchemaExtraction`] when it can
    /// be reached but not read.
    fn extract_schema(&self) -> Result<RawSchema>;
}

impl SchemaSource for RawSchema {
    fn location(&self) -> String {
        "in-memory schema".to_string()
    }

    fn extract_schema(&self) -> Result<RawSchema> {
        Ok(self.clone())
    }
}

/// Re-loads a schema snapshot written by [`write_snapshot`](crate::write_snapshot).
///
/// The format is chosen from the extension: `.json` is read as JSON,
/// anything else as YAML.
///
/// # Examples
///
/// ```no_run
/// use dal_doc_db::{SchemaSource, SnapshotSource};
///
/// let raw = SnapshotSource::new("out/schema/schema.yml").extract_schema().unwrap();
/// println!("{} tables", raw.len());
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaSource for SnapshotSource {
    fn location(&self) -> String {
        format!("snapshot {}", self.path.display())
    }

    fn extract_schema(&self) -> Result<RawSchema> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| DatabaseError::Connection {
            location: self.location(),
            reason: e.to_string(),
        })?;

        let is_json = self.path.extension().and_then(|e| e.to_str()) == Some("json");
        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&raw).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| DatabaseError::SchemaExtraction {
            location: self.location(),
            reason,
        })
    }
}
