//! File-backed inputs and outputs of a documentation build.
//!
//! This crate holds everything a build reads from or writes to plain files:
//!
//! - [`BuildConfig`] — YAML build configuration with aggregated
//!   [`ConfigurationError`] reporting.
//! - [`SchemaSource`] — boundary to the database whose schema is documented,
//!   with [`SnapshotSource`] re-loading a previously written snapshot.
//! - [`write_snapshot`] — emits `schema.json` and `schema.yml`.
//! - [`DefinitionDir`] — entry-point definitions declared in YAML files.
//!
//! # Quick start
//!
//! ```no_run
//! use dal_doc_db::{BuildConfig, SchemaSource, SnapshotSource, write_snapshot};
//!
//! let config = BuildConfig::load("doc.yml").unwrap();
//! for problem in config.validate() {
//!     eprintln!("{problem}");
//! }
//!
//! let raw = SnapshotSource::new("schema/schema.yml").extract_schema().unwrap();
//! write_snapshot(&raw, "out/schema").unwrap();
//! ```

mod config;
mod definition;
mod error;
mod snapshot;
mod source;

pub use config::{
    BuildConfig, DEFAULT_PREFIX, ResolvedConfig, SchemaInput, SourceConfig, is_valid_prefix,
    same_location,
};
pub use definition::{DefinitionDir, ProcedureDefinition, RequestDefinition, expand_placeholders};
pub use error::{ConfigurationError, DatabaseError, Result};
pub use snapshot::{SNAPSHOT_JSON, SNAPSHOT_YAML, SnapshotFiles, remove_if_exists, write_snapshot};
pub use source::{SchemaSource, SnapshotSource};
