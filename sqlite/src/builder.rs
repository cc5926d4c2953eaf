//! Build orchestration.
//!
//! [`DocumentationBuilder`] runs a documentation build end to end:
//!
//! 1. extract the raw schema from a [`SchemaSource`];
//! 2. build the [`SchemaRegistry`], registering table and field elements;
//! 3. collect every request and procedure description;
//! 4. check each description, stopping at the first invalid one;
//! 5. replace the store with an empty one;
//! 6. persist elements, entry points and join rows, parents first;
//! 7. write the schema snapshot.
//!
//! Steps 1 to 4 touch no file, so an invalid description leaves the
//! previous store and snapshot in place. Step 6 runs without an enclosing
//! transaction: a failure there leaves the rows written so far.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dal_doc_core::{
    DefinitionSource, Description, Element, ElementKind, ElementRepository, EntryPointCollector,
    Metadata, RawSchema, SchemaRegistry,
};
use dal_doc_db::{
    BuildConfig, ConfigurationError, DatabaseError, DefinitionDir, ResolvedConfig, SchemaInput, SchemaSource,
    SnapshotFiles, SnapshotSource, same_location, write_snapshot,
};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{BuildError, SqliteError};
use crate::persist::{self, InsertCounts, Owner, request_field_table};
use crate::schema::validate_prefix;
use crate::source::SqliteSource;
use crate::store::DocumentationStore;

/// The three inputs of a build.
#[derive(Clone, Copy)]
pub struct BuildInputs<'a> {
    pub source: &'a dyn SchemaSource,
    pub requests: &'a dyn DefinitionSource,
    pub procedures: &'a dyn DefinitionSource,
}

/// Inputs that passed validation, ready to be persisted.
#[derive(Debug)]
pub struct ValidatedInputs {
    pub raw: RawSchema,
    pub registry: SchemaRegistry,
    /// Requests first, then procedures, in collection order.
    pub descriptions: Vec<Description>,
}

impl ValidatedInputs {
    pub fn request_count(&self) -> usize {
        self.descriptions
            .iter()
            .filter(|d| d.as_request().is_some())
            .count()
    }

    pub fn procedure_count(&self) -> usize {
        self.descriptions.len() - self.request_count()
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub counts: InsertCounts,
    pub store: PathBuf,
    pub snapshot: SnapshotFiles,
}

/// Runs documentation builds.
///
/// The builder owns the element repository. It is cleared at the start of
/// every build, so one builder can run several builds in a row.
///
/// # Examples
///
/// ```no_run
/// use dal_doc_core::{Manifest, RawSchema};
/// use dal_doc_sqlite::{BuildInputs, DocumentationBuilder};
///
/// let mut raw = RawSchema::new();
/// raw.insert_table("user", ["id", "login"]);
/// let requests = Manifest::new("requests");
/// let procedures = Manifest::new("procedures");
///
/// let mut builder = DocumentationBuilder::new("doc_").unwrap();
/// let report = builder
///     .build(
///         BuildInputs { source: &raw, requests: &requests, procedures: &procedures },
///         "out/documentation.db".as_ref(),
///         "out/schema".as_ref(),
///     )
///     .unwrap();
/// println!("{} fields documented", report.counts.fields);
/// ```
#[derive(Debug)]
pub struct DocumentationBuilder {
    repository: ElementRepository,
    prefix: String,
}

impl DocumentationBuilder {
    /// # Errors
    ///
    /// Returns [`BuildError::Persistence`] if the prefix is invalid.
    pub fn new(prefix: impl Into<String>) -> Result<Self, BuildError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self {
            repository: ElementRepository::new(),
            prefix,
        })
    }

    pub fn repository(&self) -> &ElementRepository {
        &self.repository
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Runs a build from a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] without touching any file when
    /// the store would replace the source database.
    pub fn run(config: &ResolvedConfig) -> Result<BuildReport, BuildError> {
        if let SchemaInput::Sqlite(path) = &config.source {
            if same_location(path, &config.store) {
                return Err(BuildError::Configuration(vec![
                    ConfigurationError::Conflict("source.sqlite", "store"),
                ]));
            }
        }
        let source: Box<dyn SchemaSource> = match &config.source {
            SchemaInput::Sqlite(path) => Box::new(SqliteSource::new(path)),
            SchemaInput::Snapshot(path) => Box::new(SnapshotSource::new(path)),
        };
        let requests = DefinitionDir::requests(&config.requests);
        let procedures = DefinitionDir::procedures(&config.procedures);

        let mut builder = Self::new(&config.prefix)?;
        builder.build(
            BuildInputs {
                source: source.as_ref(),
                requests: &requests,
                procedures: &procedures,
            },
            &config.store,
            &config.snapshot_dir,
        )
    }

    /// Runs a build from a possibly incomplete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] listing every missing
    /// parameter before any work starts.
    pub fn run_config(config: BuildConfig) -> Result<BuildReport, BuildError> {
        let resolved = config.resolve().map_err(BuildError::Configuration)?;
        Self::run(&resolved)
    }

    /// Runs every step: validation, store reset, persistence and snapshot.
    pub fn build(
        &mut self,
        inputs: BuildInputs<'_>,
        store_path: &Path,
        snapshot_dir: &Path,
    ) -> Result<BuildReport, BuildError> {
        let validated = self.prepare(inputs)?;

        info!(store = %store_path.display(), "Resetting documentation store");
        let mut store = DocumentationStore::open_fresh(store_path, &self.prefix)?;
        store.up()?;

        let counts = self.persist(&store, &validated)?;

        let snapshot =
            write_snapshot(&validated.raw, snapshot_dir).map_err(|e| BuildError::ArtifactIo {
                path: snapshot_dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(
            json = %snapshot.json.display(),
            yaml = %snapshot.yaml.display(),
            "Wrote schema snapshot"
        );

        Ok(BuildReport {
            counts,
            store: store_path.to_path_buf(),
            snapshot,
        })
    }

    /// Extracts the schema, collects every description and checks it.
    ///
    /// Also registers the tags, business entities, actions and declared
    /// tables the descriptions mention. No file is written.
    pub fn prepare(&mut self, inputs: BuildInputs<'_>) -> Result<ValidatedInputs, BuildError> {
        self.repository.reset();

        info!(source = %inputs.source.location(), "Extracting schema");
        let raw = inputs.source.extract_schema().map_err(source_error)?;

        let registry = SchemaRegistry::build(&raw, &mut self.repository);
        info!(
            tables = registry.table_count(),
            fields = registry.field_count(),
            "Built schema registry"
        );

        let mut descriptions =
            EntryPointCollector::new(inputs.requests, inputs.procedures).collect(&registry)?;
        for description in &mut descriptions {
            description
                .check(&registry)
                .map_err(|source| BuildError::FieldReference {
                    description: format!("{} {}", description.kind(), description.name()),
                    source,
                })?;
        }

        let validated = ValidatedInputs {
            raw,
            registry,
            descriptions,
        };
        info!(
            requests = validated.request_count(),
            procedures = validated.procedure_count(),
            "Validated descriptions"
        );

        self.register_observed(&validated);
        Ok(validated)
    }

    /// Writes every element, entry point and join row into `store`.
    ///
    /// The store tables must exist. Ids generated for elements are recorded
    /// in the repository.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unvalidated`] before writing anything if a
    /// description was never checked, and
    /// [`BuildError::ReferentialIntegrity`] when a row names an element or
    /// request that does not exist.
    pub fn persist(
        &mut self,
        store: &DocumentationStore,
        validated: &ValidatedInputs,
    ) -> Result<InsertCounts, BuildError> {
        if let Some(unchecked) = validated.descriptions.iter().find(|d| !d.is_validated()) {
            return Err(BuildError::Unvalidated(unchecked.name().to_string()));
        }

        let conn = store.connection();
        let prefix = store.prefix();
        let mut counts = InsertCounts::default();

        for kind in ElementKind::ALL {
            self.persist_elements(conn, prefix, kind, &mut counts)?;
        }

        let mut request_ids = HashMap::new();
        for request in validated.descriptions.iter().filter_map(Description::as_request) {
            let id = persist::insert_request(conn, prefix, request)?;
            request_ids.insert(request.meta.name.as_str(), id);
            counts.requests += 1;
        }
        info!(count = counts.requests, "Persisted requests");

        let mut procedure_ids = Vec::new();
        for procedure in validated
            .descriptions
            .iter()
            .filter_map(Description::as_procedure)
        {
            procedure_ids.push(persist::insert_procedure(conn, prefix, procedure)?);
            counts.procedures += 1;
        }
        info!(count = counts.procedures, "Persisted procedures");

        for request in validated.descriptions.iter().filter_map(Description::as_request) {
            let request_id = request_ids[request.meta.name.as_str()];
            let owner = format!("request {}", request.meta.name);

            for (role, fields) in request.field_lists() {
                let table = request_field_table(role).ok_or_else(|| {
                    SqliteError::PersistenceError(format!("no join table for {role} fields"))
                })?;
                for field in fields {
                    let field_id = self.lookup(ElementKind::Field, field, &owner)?;
                    counts.add_link(persist::link_request_field(
                        conn, prefix, table, request_id, field_id,
                    )?);
                }
            }
            for parameter in &request.parameters {
                counts.add_link(persist::insert_named_value(
                    conn,
                    prefix,
                    "request_parameter_value",
                    Owner::Request,
                    request_id,
                    parameter,
                )?);
            }
            self.persist_metadata(conn, prefix, Owner::Request, request_id, &request.meta, &mut counts)?;
            debug!(request = %request.meta.name, "Linked request");
        }

        let procedures = validated
            .descriptions
            .iter()
            .filter_map(Description::as_procedure);
        for (procedure, procedure_id) in procedures.zip(procedure_ids) {
            let owner = format!("procedure {}", procedure.meta.name);

            for name in &procedure.requests {
                let request_id = request_ids.get(name.as_str()).copied().ok_or_else(|| {
                    BuildError::ReferentialIntegrity {
                        owner: owner.clone(),
                        kind: "request".to_string(),
                        name: name.clone(),
                    }
                })?;
                counts.add_link(persist::link_procedure_request(
                    conn,
                    prefix,
                    procedure_id,
                    request_id,
                )?);
            }
            for (field, mandatory) in procedure.input_fields() {
                let field_id = self.lookup(ElementKind::Field, &field.name, &owner)?;
                counts.add_link(persist::insert_input_field(
                    conn,
                    prefix,
                    procedure_id,
                    field_id,
                    mandatory,
                    field.description.as_deref(),
                )?);
            }
            for (param, mandatory) in procedure.input_params() {
                counts.add_link(persist::insert_input_param(
                    conn,
                    prefix,
                    procedure_id,
                    param,
                    mandatory,
                )?);
            }
            for field in &procedure.output_fields {
                let field_id = self.lookup(ElementKind::Field, &field.name, &owner)?;
                counts.add_link(persist::insert_output_field(
                    conn,
                    prefix,
                    procedure_id,
                    field_id,
                    field.description.as_deref(),
                )?);
            }
            for value in &procedure.output_values {
                counts.add_link(persist::insert_named_value(
                    conn,
                    prefix,
                    "procedure_output_value",
                    Owner::Procedure,
                    procedure_id,
                    value,
                )?);
            }
            self.persist_metadata(
                conn,
                prefix,
                Owner::Procedure,
                procedure_id,
                &procedure.meta,
                &mut counts,
            )?;
            debug!(procedure = %procedure.meta.name, "Linked procedure");
        }
        info!(links = counts.links, "Persisted join rows");

        Ok(counts)
    }

    /// Adds the elements descriptions mention beyond fields.
    fn register_observed(&mut self, validated: &ValidatedInputs) {
        for description in &validated.descriptions {
            if let Some(request) = description.as_request() {
                for table in &request.tables {
                    if !validated.registry.has_table(table) {
                        warn!(
                            request = %request.meta.name,
                            table = %table,
                            "Declared table is not in the schema"
                        );
                    }
                    self.repository.add(Element::table(table.as_str()));
                }
            }

            let meta = description.meta();
            for (entity, actions) in &meta.entity_actions {
                self.repository.add(Element::business_entity(entity.as_str()));
                for action in actions {
                    self.repository.add(Element::action(action.as_str()));
                }
            }
            for tag in &meta.tags {
                self.repository.add(Element::tag(tag.as_str()));
            }
        }
    }

    fn persist_elements(
        &mut self,
        conn: &Connection,
        prefix: &str,
        kind: ElementKind,
        counts: &mut InsertCounts,
    ) -> Result<(), BuildError> {
        let pending: Vec<Element> = self.repository.all_of(kind).cloned().collect();
        for element in &pending {
            let table_id = match element.owner_table() {
                Some(table) => Some(self.lookup(ElementKind::Table, table, element.name())?),
                None => None,
            };
            let id = persist::insert_element(conn, prefix, element, table_id)?;
            self.repository.assign_id(kind, element.name(), id);
            counts.add_element(kind);
        }
        info!(kind = %kind, count = pending.len(), "Persisted elements");
        Ok(())
    }

    /// Tags, output data values and entity/action pairs.
    fn persist_metadata(
        &self,
        conn: &Connection,
        prefix: &str,
        owner: Owner,
        owner_id: i64,
        meta: &Metadata,
        counts: &mut InsertCounts,
    ) -> Result<(), BuildError> {
        let owner_name = format!("{} {}", owner.as_str(), meta.name);

        for tag in &meta.tags {
            let tag_id = self.lookup(ElementKind::Tag, tag, &owner_name)?;
            counts.add_link(persist::link_tag(conn, prefix, owner, owner_id, tag_id)?);
        }
        let table = match owner {
            Owner::Request => "request_output_data_value",
            Owner::Procedure => "procedure_output_data_value",
        };
        for value in &meta.output_data_values {
            counts.add_link(persist::insert_named_value(
                conn, prefix, table, owner, owner_id, value,
            )?);
        }
        for (entity, actions) in &meta.entity_actions {
            let entity_id = self.lookup(ElementKind::BusinessEntity, entity, &owner_name)?;
            for action in actions {
                let action_id = self.lookup(ElementKind::Action, action, &owner_name)?;
                counts.add_link(persist::link_entity_action(
                    conn, prefix, owner, owner_id, entity_id, action_id,
                )?);
            }
        }
        Ok(())
    }

    /// Resolves a persisted element's id.
    fn lookup(&self, kind: ElementKind, name: &str, owner: &str) -> Result<i64, BuildError> {
        self.repository
            .id_of(kind, name)
            .ok_or_else(|| BuildError::ReferentialIntegrity {
                owner: owner.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }
}

fn source_error(err: DatabaseError) -> BuildError {
    match err {
        DatabaseError::Connection { .. } => BuildError::Connection(err.to_string()),
        other => BuildError::SchemaExtraction(other.to_string()),
    }
}
