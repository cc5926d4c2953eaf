//! Entry-point definitions stored as YAML files.
//!
//! [`DefinitionDir`] is a [`DefinitionSource`] backed by a directory tree:
//! every `*.yml` / `*.yaml` file below the root declares one entry point,
//! and its path relative to the root becomes the entry point's logical name.
//!
//! # Request file
//!
//! ```yaml
//! description: Fetch a user by id
//! type: select
//! sql: "SELECT {fields:user} FROM user WHERE id = :id"
//! tables: [user]
//! tags: [user]
//! entities:
//!   user: [select]
//! fields:
//!   selected: ["user.*"]
//!   condition: [user.id]
//! ```
//!
//! `{fields:<table>}` in SQL text expands to the comma-separated qualified
//! fields of that table in the live schema. `sql` may also be a map of
//! variant name to statement.
//!
//! # Procedure file
//!
//! ```yaml
//! description: Authenticate a user
//! requests: [user/get_by_login]
//! multi_row: false
//! mandatory_input_fields:
//!   - { name: user.login, always: true }
//! output_fields:
//!   - { name: user.id }
//! output_values:
//!   - { name: token, description: session token }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use dal_doc_core::{
    DefinitionSource, Describe, Description, DescriptionKind, EntryPoint, FieldLookup, InputField,
    LogicalName, NamedValue, OutputField, ProcedureDescription, RequestDescription, RequestType,
    SqlText,
};
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::{DatabaseError, Result};

static FIELDS_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{fields:([^{}\s]+)\}").expect("static regex must compile")
});

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Metadata keys shared by request and procedure files.
///
/// Each definition struct declares these keys inline; `#[serde(flatten)]`
/// would disable `deny_unknown_fields`.
struct Common<'a> {
    description: &'a str,
    tags: &'a [String],
    /// Business entity -> actions.
    entities: &'a BTreeMap<String, Vec<String>>,
    output_data_values: &'a [NamedValue],
}

impl Common<'_> {
    fn apply<D: Describe>(&self, mut target: D) -> D {
        target = target.with_description(self.description.to_string());
        for tag in self.tags {
            target = target.with_tag(tag.clone());
        }
        for (entity, actions) in self.entities {
            for action in actions {
                target = target.with_entity_action(entity.clone(), action.clone());
            }
        }
        for value in self.output_data_values {
            target = target.with_output_data_value(value.name.clone(), value.description.as_deref());
        }
        target
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestFields {
    #[serde(default)]
    selected: Vec<String>,
    #[serde(default)]
    updated: Vec<String>,
    #[serde(default)]
    inserted: Vec<String>,
    #[serde(default)]
    upserted: Vec<String>,
    #[serde(default)]
    condition: Vec<String>,
    #[serde(default)]
    presentation: Vec<String>,
}

/// A request declared in a definition file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    output_data_values: Vec<NamedValue>,
    #[serde(rename = "type")]
    request_type: RequestType,
    #[serde(default)]
    sql: Option<SqlText>,
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    parameters: Vec<NamedValue>,
    #[serde(default)]
    fields: RequestFields,
}

impl EntryPoint for RequestDefinition {
    fn description(&self, fields: &dyn FieldLookup) -> Description {
        let common = Common {
            description: &self.description,
            tags: &self.tags,
            entities: &self.entities,
            output_data_values: &self.output_data_values,
        };
        let mut request = common.apply(RequestDescription::new(self.request_type));

        request.sql = match &self.sql {
            Some(SqlText::Single(sql)) => SqlText::Single(expand_placeholders(sql, fields)),
            Some(SqlText::Variants(variants)) => SqlText::Variants(
                variants
                    .iter()
                    .map(|(variant, sql)| (variant.clone(), expand_placeholders(sql, fields)))
                    .collect(),
            ),
            None => SqlText::default(),
        };
        for table in &self.tables {
            request = request.with_table(table.clone());
        }
        for parameter in &self.parameters {
            request = request.with_parameter(parameter.name.clone(), parameter.description.as_deref());
        }

        request.selected_fields = self.fields.selected.clone();
        request.updated_fields = self.fields.updated.clone();
        request.inserted_fields = self.fields.inserted.clone();
        request.upserted_fields = self.fields.upserted.clone();
        request.condition_fields = self.fields.condition.clone();
        request.presentation_fields = self.fields.presentation.clone();
        request.into()
    }
}

/// A procedure declared in a definition file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcedureDefinition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    output_data_values: Vec<NamedValue>,
    #[serde(default)]
    requests: Vec<String>,
    #[serde(default)]
    multi_row: bool,
    #[serde(default)]
    mandatory_input_fields: Vec<InputField>,
    #[serde(default)]
    optional_input_fields: Vec<InputField>,
    #[serde(default)]
    mandatory_input_params: Vec<InputField>,
    #[serde(default)]
    optional_input_params: Vec<InputField>,
    #[serde(default)]
    output_fields: Vec<OutputField>,
    #[serde(default)]
    output_values: Vec<NamedValue>,
}

impl EntryPoint for ProcedureDefinition {
    fn description(&self, _fields: &dyn FieldLookup) -> Description {
        let common = Common {
            description: &self.description,
            tags: &self.tags,
            entities: &self.entities,
            output_data_values: &self.output_data_values,
        };
        let mut procedure = common
            .apply(ProcedureDescription::new())
            .with_multi_row(self.multi_row);

        procedure.requests = self.requests.clone();
        procedure.mandatory_input_fields = self.mandatory_input_fields.clone();
        procedure.optional_input_fields = optional(&self.optional_input_fields);
        procedure.mandatory_input_params = self.mandatory_input_params.clone();
        procedure.optional_input_params = optional(&self.optional_input_params);
        procedure.output_fields = self.output_fields.clone();
        procedure.output_values = self.output_values.clone();
        procedure.into()
    }
}

/// Optional inputs never carry the `always` flag.
fn optional(inputs: &[InputField]) -> Vec<InputField> {
    inputs
        .iter()
        .map(|input| InputField {
            always: false,
            ..input.clone()
        })
        .collect()
}

/// Replaces every `{fields:<table>}` with the table's qualified field list.
///
/// # Examples
///
/// ```
/// use dal_doc_db::expand_placeholders;
///
/// let lookup = |table: &str| {
///     if table == "user" {
///         vec!["id".to_string(), "login".to_string()]
///     } else {
///         Vec::new()
///     }
/// };
/// assert_eq!(
///     expand_placeholders("SELECT {fields:user} FROM user", &lookup),
///     "SELECT user.id, user.login FROM user"
/// );
/// ```
pub fn expand_placeholders(sql: &str, fields: &dyn FieldLookup) -> String {
    FIELDS_PLACEHOLDER
        .replace_all(sql, |caps: &Captures<'_>| {
            let table = &caps[1];
            fields
                .fields_of_table(table)
                .iter()
                .map(|field| format!("{table}.{field}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .into_owned()
}

/// Directory of YAML entry-point definitions.
///
/// # Examples
///
/// ```no_run
/// use dal_doc_core::{EntryPointCollector, RawSchema};
/// use dal_doc_db::DefinitionDir;
///
/// let requests = DefinitionDir::requests("definitions/requests");
/// let procedures = DefinitionDir::procedures("definitions/procedures");
/// let descriptions = EntryPointCollector::new(&requests, &procedures)
///     .collect(&RawSchema::new())
///     .unwrap();
/// println!("{} entry points", descriptions.len());
/// ```
#[derive(Debug, Clone)]
pub struct DefinitionDir {
    root: PathBuf,
    namespace: String,
    kind: DescriptionKind,
}

impl DefinitionDir {
    /// A root whose files declare requests.
    pub fn requests(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: "requests".to_string(),
            kind: DescriptionKind::Request,
        }
    }

    /// A root whose files declare procedures.
    pub fn procedures(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: "procedures".to_string(),
            kind: DescriptionKind::Procedure,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the definition file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the file cannot be read and
    /// [`DatabaseError::InvalidDefinition`] if it does not parse.
    pub fn load(&self, path: &Path) -> Result<Box<dyn EntryPoint>> {
        let raw = std::fs::read_to_string(path)?;
        let invalid = |e: serde_yaml::Error| DatabaseError::InvalidDefinition {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let entry_point: Box<dyn EntryPoint> = match self.kind {
            DescriptionKind::Request => {
                Box::new(serde_yaml::from_str::<RequestDefinition>(&raw).map_err(invalid)?)
            }
            DescriptionKind::Procedure => {
                Box::new(serde_yaml::from_str::<ProcedureDefinition>(&raw).map_err(invalid)?)
            }
        };
        Ok(entry_point)
    }

    /// Finds the file that declares `name`.
    fn file_for(&self, name: &LogicalName) -> Option<PathBuf> {
        let (last, parents) = name.segments().split_last()?;
        let mut dir = self.root.clone();
        for segment in parents {
            dir.push(segment);
        }
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{last}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

impl DefinitionSource for DefinitionDir {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn discover(&self) -> std::result::Result<Vec<LogicalName>, String> {
        let mut files = Vec::new();
        walk(&self.root, &mut files).map_err(|e| e.to_string())?;

        let mut names: BTreeMap<LogicalName, PathBuf> = BTreeMap::new();
        for file in files {
            let relative = file.strip_prefix(&self.root).map_err(|e| e.to_string())?;
            let name = LogicalName::from_relative_path(relative)
                .ok_or_else(|| format!("unsupported file name {}", relative.display()))?;
            if let Some(previous) = names.get(&name) {
                return Err(format!(
                    "{} and {} both declare '{name}'",
                    previous.display(),
                    file.display()
                ));
            }
            names.insert(name, file);
        }
        Ok(names.into_keys().collect())
    }

    fn instantiate(&self, name: &LogicalName) -> std::result::Result<Box<dyn EntryPoint>, String> {
        let path = self
            .file_for(name)
            .ok_or_else(|| format!("no definition file for '{name}' below {}", self.root.display()))?;
        self.load(&path).map_err(|e| e.to_string())
    }
}

/// Recursively collects definition files below `dir`.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}
