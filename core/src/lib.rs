//! Core model for documenting a data-access layer.
//!
//! This crate defines the pieces that turn a live database schema and a set
//! of declared entry points into validated, deduplicated documentation:
//!
//! - [`RawSchema`] / [`SchemaRegistry`] — the `table -> [fields]` map read from
//!   the source database and the read-only index built from it.
//! - [`ElementRepository`] — deduplicating store of tables, fields, tags,
//!   business entities and actions, scoped to one build.
//! - [`Description`] — metadata of one entry point, either a
//!   [`RequestDescription`] or a [`ProcedureDescription`], built with a fluent
//!   API and validated with [`Description::check`].
//! - [`EntryPoint`], [`DefinitionSource`], [`Manifest`] and
//!   [`EntryPointCollector`] — discovery of entry-point definitions below the
//!   request and procedure roots.
//!
//! # Example
//!
//! ```
//! use dal_doc_core::*;
//!
//! let mut repository = ElementRepository::new();
//! let mut raw = RawSchema::new();
//! raw.insert_table("user", ["id", "login", "password"]);
//! let registry = SchemaRegistry::build(&raw, &mut repository);
//!
//! let mut requests = Manifest::new("requests");
//! requests.register_fn("user/list", |_: &dyn FieldLookup| {
//!     RequestDescription::new(RequestType::Select)
//!         .with_sql("SELECT * FROM user")
//!         .with_selected_field("user.*")
//!         .into()
//! });
//! let procedures = Manifest::new("procedures");
//!
//! let mut descriptions = EntryPointCollector::new(&requests, &procedures)
//!     .collect(&registry)
//!     .unwrap();
//! for description in &mut descriptions {
//!     description.check(&registry).unwrap();
//! }
//! assert_eq!(
//!     descriptions[0].as_request().unwrap().selected_fields,
//!     ["user.id", "user.login", "user.password"]
//! );
//! ```

mod collect;
mod description;
mod element;
mod entry_point;
mod field_ref;
mod registry;

pub use collect::{CollectError, EntryPointCollector};
pub use description::{
    Describe, Description, DescriptionKind, InputField, InputParam, Mandatory, Metadata,
    NamedValue, OutputField, ProcedureDescription, RequestDescription, RequestType, SqlText,
};
pub use element::{Element, ElementKind, ElementRepository};
pub use entry_point::{DefinitionSource, EntryPoint, LogicalName, Manifest};
pub use field_ref::{FieldEntry, FieldRef, FieldReferenceError, FieldRole, expand};
pub use registry::{Field, FieldLookup, RawSchema, SchemaRegistry};
