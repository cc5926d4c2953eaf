//! SQLite documentation store and build orchestration.
//!
//! This crate turns validated entry-point descriptions into a normalized
//! SQLite database that can be browsed to find which requests and
//! procedures touch which fields, tags and business entities.
//!
//! # Architecture
//!
//! - **`schema`** — store DDL with customizable table prefixes
//! - **`store`** — lifecycle operations (open fresh / up / down / reset / status)
//! - **`persist`** — row-level inserts of elements, entry points and join rows
//! - **`query`** — read-back of a built store, including a natural-key dump
//! - **`source`** — live-schema extraction from an existing SQLite database
//! - **`builder`** — [`DocumentationBuilder`], running a build end to end
//!
//! # Quick start
//!
//! ```no_run
//! use dal_doc_db::BuildConfig;
//! use dal_doc_sqlite::DocumentationBuilder;
//!
//! let config = BuildConfig::load("doc.yml").unwrap();
//! let report = DocumentationBuilder::run_config(config).unwrap();
//! println!(
//!     "{} requests, {} procedures",
//!     report.counts.requests, report.counts.procedures
//! );
//! ```
//!
//! # Table prefix customization
//!
//! All table names are prefixed with a configurable string (`doc_` by
//! default). Prefixes must contain only alphanumeric characters and
//! underscores.

mod builder;
mod error;
mod persist;
mod query;
mod schema;
mod source;
mod store;

pub use builder::{BuildInputs, BuildReport, DocumentationBuilder, ValidatedInputs};
pub use error::{BuildError, Result, SqliteError};
pub use persist::InsertCounts;
pub use query::{EntityUsage, FieldUsage, StoreQuery};
pub use schema::{JOIN_TABLES, PRIMARY_TABLES, generate_drop_sql, generate_schema_sql};
pub use source::SqliteSource;
pub use store::{DocumentationStore, StoreStatus};
