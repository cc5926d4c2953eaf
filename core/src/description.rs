//! Entry-point description model.
//!
//! A [`Description`] documents one entry point of the data-access layer. It is
//! either a [`RequestDescription`] (a raw SQL statement) or a
//! [`ProcedureDescription`] (a higher-level operation composed of requests).
//! Both are assembled with a fluent API and share the metadata exposed
//! through [`Describe`]: free text, tags, business entity/action pairs and
//! output data values.
//!
//! Field lists hold `"table.field"` or `"table.*"` strings until
//! [`Description::check`] validates them against the schema registry and
//! expands every wildcard.
//!
//! # Examples
//!
//! ```
//! use dal_doc_core::*;
//!
//! let mut raw = RawSchema::new();
//! raw.insert_table("user", ["id", "login", "password"]);
//! let registry = SchemaRegistry::build(&raw, &mut ElementRepository::new());
//!
//! let mut description: Description = RequestDescription::new(RequestType::Select)
//!     .with_sql("SELECT * FROM user WHERE id = :id")
//!     .with_selected_field("user.*")
//!     .with_condition_field("user.id")
//!     .with_tag("user")
//!     .with_entity_action("user", "select")
//!     .into();
//!
//! description.check(&registry).unwrap();
//! let request = description.as_request().unwrap();
//! assert_eq!(request.selected_fields, ["user.id", "user.login", "user.password"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::ElementKind;
use crate::field_ref::{FieldEntry, FieldReferenceError, FieldRole, expand};
use crate::registry::SchemaRegistry;

/// Kind of statement a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Select,
    Update,
    Delete,
    Insert,
    Upsert,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Select => "select",
            RequestType::Update => "update",
            RequestType::Delete => "delete",
            RequestType::Insert => "insert",
            RequestType::Upsert => "upsert",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(RequestType::Select),
            "update" => Ok(RequestType::Update),
            "delete" => Ok(RequestType::Delete),
            "insert" => Ok(RequestType::Insert),
            "upsert" => Ok(RequestType::Upsert),
            other => Err(format!("unknown request type: {other}")),
        }
    }
}

/// SQL text of a request: one statement, or one statement per variant
/// (for example per SQL dialect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlText {
    Single(String),
    Variants(BTreeMap<String, String>),
}

impl SqlText {
    pub fn is_multi(&self) -> bool {
        matches!(self, SqlText::Variants(_))
    }

    /// Renders the text stored in the documentation store; variant maps are
    /// serialized as a JSON object.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        match self {
            SqlText::Single(sql) => Ok(sql.clone()),
            SqlText::Variants(variants) => serde_json::to_string(variants),
        }
    }
}

impl Default for SqlText {
    fn default() -> Self {
        SqlText::Single(String::new())
    }
}

/// A named value with an optional description (output values, configuration
/// parameters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(String::from),
        }
    }
}

/// How strongly an input is required.
///
/// Stored as `2` (always), `1` (sometimes) and `0` (optional).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Mandatory {
    Optional,
    Sometimes,
    Always,
}

impl Mandatory {
    pub fn level(&self) -> u8 {
        match self {
            Mandatory::Optional => 0,
            Mandatory::Sometimes => 1,
            Mandatory::Always => 2,
        }
    }
}

/// A procedure input field (or parameter, see [`InputParam`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Mandatory in every call, rather than only in some.
    #[serde(default)]
    pub always: bool,
}

impl FieldEntry for InputField {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn with_field_name(&self, name: String) -> Self {
        Self {
            name,
            description: self.description.clone(),
            always: self.always,
        }
    }
}

/// A procedure input parameter that is not a table field.
pub type InputParam = InputField;

/// A procedure output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldEntry for OutputField {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn with_field_name(&self, name: String) -> Self {
        Self {
            name,
            description: self.description.clone(),
        }
    }
}

/// Metadata shared by both description variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Logical name of the entry point, assigned after collection.
    pub name: String,
    pub description: String,
    /// Tags in first-seen order, without duplicates.
    pub tags: Vec<String>,
    /// Business entity -> actions applied to it.
    pub entity_actions: BTreeMap<String, BTreeSet<String>>,
    /// Values computed and returned that are not table fields.
    pub output_data_values: Vec<NamedValue>,
    #[serde(skip)]
    validated: bool,
}

impl Metadata {
    fn check_identifiers(&self) -> Result<(), FieldReferenceError> {
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(FieldReferenceError::EmptyIdentifier {
                kind: ElementKind::Tag,
            });
        }
        for (entity, actions) in &self.entity_actions {
            if entity.trim().is_empty() {
                return Err(FieldReferenceError::EmptyIdentifier {
                    kind: ElementKind::BusinessEntity,
                });
            }
            if actions.iter().any(|a| a.trim().is_empty()) {
                return Err(FieldReferenceError::EmptyIdentifier {
                    kind: ElementKind::Action,
                });
            }
        }
        Ok(())
    }
}

/// Fluent setters for the metadata common to every description.
pub trait Describe: Sized {
    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    fn with_description(mut self, text: impl Into<String>) -> Self {
        self.metadata_mut().description = text.into();
        self
    }

    /// Adds a tag; adding an existing tag again has no effect.
    fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tags = &mut self.metadata_mut().tags;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
        self
    }

    /// Records that the entry point applies `action` to `entity`.
    fn with_entity_action(mut self, entity: impl Into<String>, action: impl Into<String>) -> Self {
        self.metadata_mut()
            .entity_actions
            .entry(entity.into())
            .or_default()
            .insert(action.into());
        self
    }

    fn with_output_data_value(mut self, name: impl Into<String>, description: Option<&str>) -> Self {
        self.metadata_mut()
            .output_data_values
            .push(NamedValue::new(name, description));
        self
    }
}

/// Description of a single SQL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDescription {
    #[serde(flatten)]
    pub meta: Metadata,
    pub request_type: RequestType,
    pub sql: SqlText,
    /// Tables the request touches.
    pub tables: Vec<String>,
    /// Configuration parameters the request reads.
    pub parameters: Vec<NamedValue>,
    pub selected_fields: Vec<String>,
    pub updated_fields: Vec<String>,
    pub inserted_fields: Vec<String>,
    pub upserted_fields: Vec<String>,
    pub condition_fields: Vec<String>,
    pub presentation_fields: Vec<String>,
}

impl RequestDescription {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            meta: Metadata::default(),
            request_type,
            sql: SqlText::default(),
            tables: Vec::new(),
            parameters: Vec::new(),
            selected_fields: Vec::new(),
            updated_fields: Vec::new(),
            inserted_fields: Vec::new(),
            upserted_fields: Vec::new(),
            condition_fields: Vec::new(),
            presentation_fields: Vec::new(),
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = SqlText::Single(sql.into());
        self
    }

    /// Adds one SQL variant, turning the text into a variant map.
    pub fn with_sql_variant(mut self, variant: impl Into<String>, sql: impl Into<String>) -> Self {
        match &mut self.sql {
            SqlText::Variants(variants) => {
                variants.insert(variant.into(), sql.into());
            }
            SqlText::Single(_) => {
                self.sql = SqlText::Variants(BTreeMap::from([(variant.into(), sql.into())]));
            }
        }
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !self.tables.contains(&table) {
            self.tables.push(table);
        }
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, description: Option<&str>) -> Self {
        self.parameters.push(NamedValue::new(name, description));
        self
    }

    pub fn with_selected_field(mut self, field: impl Into<String>) -> Self {
        self.selected_fields.push(field.into());
        self
    }

    pub fn with_updated_field(mut self, field: impl Into<String>) -> Self {
        self.updated_fields.push(field.into());
        self
    }

    pub fn with_inserted_field(mut self, field: impl Into<String>) -> Self {
        self.inserted_fields.push(field.into());
        self
    }

    pub fn with_upserted_field(mut self, field: impl Into<String>) -> Self {
        self.upserted_fields.push(field.into());
        self
    }

    pub fn with_condition_field(mut self, field: impl Into<String>) -> Self {
        self.condition_fields.push(field.into());
        self
    }

    pub fn with_presentation_field(mut self, field: impl Into<String>) -> Self {
        self.presentation_fields.push(field.into());
        self
    }

    /// Role lists in validation order.
    pub fn field_lists(&self) -> [(FieldRole, &[String]); 6] {
        [
            (FieldRole::Selected, self.selected_fields.as_slice()),
            (FieldRole::Updated, self.updated_fields.as_slice()),
            (FieldRole::Inserted, self.inserted_fields.as_slice()),
            (FieldRole::Upserted, self.upserted_fields.as_slice()),
            (FieldRole::Condition, self.condition_fields.as_slice()),
            (FieldRole::Presentation, self.presentation_fields.as_slice()),
        ]
    }

    fn check(&mut self, registry: &SchemaRegistry) -> Result<(), FieldReferenceError> {
        let selected = expand(FieldRole::Selected, &self.selected_fields, registry)?;
        let updated = expand(FieldRole::Updated, &self.updated_fields, registry)?;
        let inserted = expand(FieldRole::Inserted, &self.inserted_fields, registry)?;
        let upserted = expand(FieldRole::Upserted, &self.upserted_fields, registry)?;
        let condition = expand(FieldRole::Condition, &self.condition_fields, registry)?;
        let presentation = expand(FieldRole::Presentation, &self.presentation_fields, registry)?;
        self.meta.check_identifiers()?;

        self.selected_fields = selected;
        self.updated_fields = updated;
        self.inserted_fields = inserted;
        self.upserted_fields = upserted;
        self.condition_fields = condition;
        self.presentation_fields = presentation;
        Ok(())
    }
}

impl Describe for RequestDescription {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }
}

/// Description of a procedure built on top of requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcedureDescription {
    #[serde(flatten)]
    pub meta: Metadata,
    /// Names of the requests the procedure invokes.
    pub requests: Vec<String>,
    pub mandatory_input_fields: Vec<InputField>,
    pub optional_input_fields: Vec<InputField>,
    pub mandatory_input_params: Vec<InputParam>,
    pub optional_input_params: Vec<InputParam>,
    pub output_fields: Vec<OutputField>,
    pub output_values: Vec<NamedValue>,
    /// Whether the procedure returns several rows.
    pub multi_row: bool,
}

impl ProcedureDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.requests.push(request.into());
        self
    }

    /// Adds a mandatory input field; `always` marks it as required in every
    /// call rather than only in some.
    pub fn with_mandatory_input_field(
        mut self,
        field: impl Into<String>,
        description: Option<&str>,
        always: bool,
    ) -> Self {
        self.mandatory_input_fields.push(InputField {
            name: field.into(),
            description: description.map(String::from),
            always,
        });
        self
    }

    pub fn with_optional_input_field(
        mut self,
        field: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        self.optional_input_fields.push(InputField {
            name: field.into(),
            description: description.map(String::from),
            always: false,
        });
        self
    }

    pub fn with_mandatory_input_param(
        mut self,
        name: impl Into<String>,
        description: Option<&str>,
        always: bool,
    ) -> Self {
        self.mandatory_input_params.push(InputParam {
            name: name.into(),
            description: description.map(String::from),
            always,
        });
        self
    }

    pub fn with_optional_input_param(
        mut self,
        name: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        self.optional_input_params.push(InputParam {
            name: name.into(),
            description: description.map(String::from),
            always: false,
        });
        self
    }

    pub fn with_output_field(mut self, field: impl Into<String>, description: Option<&str>) -> Self {
        self.output_fields.push(OutputField {
            name: field.into(),
            description: description.map(String::from),
        });
        self
    }

    pub fn with_output_value(mut self, name: impl Into<String>, description: Option<&str>) -> Self {
        self.output_values.push(NamedValue::new(name, description));
        self
    }

    pub fn with_multi_row(mut self, multi_row: bool) -> Self {
        self.multi_row = multi_row;
        self
    }

    /// Input fields paired with their mandatory level.
    pub fn input_fields(&self) -> impl Iterator<Item = (&InputField, Mandatory)> {
        self.mandatory_input_fields
            .iter()
            .map(|f| (f, mandatory_level(true, f.always)))
            .chain(
                self.optional_input_fields
                    .iter()
                    .map(|f| (f, Mandatory::Optional)),
            )
    }

    /// Input parameters paired with their mandatory level.
    pub fn input_params(&self) -> impl Iterator<Item = (&InputParam, Mandatory)> {
        self.mandatory_input_params
            .iter()
            .map(|p| (p, mandatory_level(true, p.always)))
            .chain(
                self.optional_input_params
                    .iter()
                    .map(|p| (p, Mandatory::Optional)),
            )
    }

    fn check(&mut self, registry: &SchemaRegistry) -> Result<(), FieldReferenceError> {
        let mandatory = expand(
            FieldRole::MandatoryInput,
            &self.mandatory_input_fields,
            registry,
        )?;
        let optional = expand(
            FieldRole::OptionalInput,
            &self.optional_input_fields,
            registry,
        )?;
        let output = expand(FieldRole::Output, &self.output_fields, registry)?;
        self.meta.check_identifiers()?;

        self.mandatory_input_fields = mandatory;
        self.optional_input_fields = optional;
        self.output_fields = output;
        Ok(())
    }
}

impl Describe for ProcedureDescription {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }
}

fn mandatory_level(mandatory: bool, always: bool) -> Mandatory {
    match (mandatory, always) {
        (false, _) => Mandatory::Optional,
        (true, false) => Mandatory::Sometimes,
        (true, true) => Mandatory::Always,
    }
}

/// Variant of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    Request,
    Procedure,
}

impl fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionKind::Request => f.write_str("request"),
            DescriptionKind::Procedure => f.write_str("procedure"),
        }
    }
}

/// Documentation of one entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Description {
    Request(RequestDescription),
    Procedure(ProcedureDescription),
}

impl Description {
    pub fn kind(&self) -> DescriptionKind {
        match self {
            Description::Request(_) => DescriptionKind::Request,
            Description::Procedure(_) => DescriptionKind::Procedure,
        }
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            Description::Request(r) => &r.meta,
            Description::Procedure(p) => &p.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut Metadata {
        match self {
            Description::Request(r) => &mut r.meta,
            Description::Procedure(p) => &mut p.meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.meta_mut().name = name.into();
    }

    /// Whether [`check`](Self::check) has succeeded on this description.
    pub fn is_validated(&self) -> bool {
        self.meta().validated
    }

    /// Validates every field list against the registry and expands wildcards.
    ///
    /// Lists are checked in declaration order and validation stops at the
    /// first invalid entry. On failure no list is modified; on success every
    /// list holds only concrete `table.field` names. Checking an already
    /// validated description is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`FieldReferenceError`] for a malformed entry, an entry whose
    /// table is not in the registry, or an empty tag/entity/action name.
    pub fn check(&mut self, registry: &SchemaRegistry) -> Result<(), FieldReferenceError> {
        if self.is_validated() {
            return Ok(());
        }
        match self {
            Description::Request(r) => r.check(registry)?,
            Description::Procedure(p) => p.check(registry)?,
        }
        self.meta_mut().validated = true;
        Ok(())
    }

    pub fn as_request(&self) -> Option<&RequestDescription> {
        match self {
            Description::Request(r) => Some(r),
            Description::Procedure(_) => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcedureDescription> {
        match self {
            Description::Procedure(p) => Some(p),
            Description::Request(_) => None,
        }
    }
}

impl From<RequestDescription> for Description {
    fn from(request: RequestDescription) -> Self {
        Description::Request(request)
    }
}

impl From<ProcedureDescription> for Description {
    fn from(procedure: ProcedureDescription) -> Self {
        Description::Procedure(procedure)
    }
}
