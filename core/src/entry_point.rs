//! Entry-point definitions and the sources they are discovered from.
//!
//! An [`EntryPoint`] produces the [`Description`] of one declared database
//! operation. Entry points are grouped under two roots (requests and
//! procedures); each root is a [`DefinitionSource`] that lists the logical
//! names it holds and instantiates the entry point behind a name.
//!
//! [`Manifest`] is the in-memory source for entry points defined in code.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use std::rc::Rc;

use crate::description::Description;
use crate::registry::FieldLookup;

/// A declared, parameterized database operation.
pub trait EntryPoint {
    /// Produces the description of this entry point.
    ///
    /// `fields` resolves table names against the live schema so the
    /// definition can derive SQL text and field lists from it.
    fn description(&self, fields: &dyn FieldLookup) -> Description;
}

/// Hierarchical name of an entry point, derived from its location below a root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use dal_doc_core::LogicalName;
///
/// let name = LogicalName::from_relative_path(Path::new("user/get_by_id.yml")).unwrap();
/// assert_eq!(name.to_string(), "user/get_by_id");
/// assert_eq!(name.qualified("requests"), "requests::user::get_by_id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalName {
    segments: Vec<String>,
}

impl LogicalName {
    /// Parses a `/`-separated name, ignoring empty segments.
    ///
    /// Returns `None` when no segment is left.
    pub fn parse(name: &str) -> Option<Self> {
        let segments: Vec<String> = name
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Builds a name from a path relative to its root, dropping the
    /// extension of the last component.
    ///
    /// Returns `None` for absolute paths, paths escaping the root, or empty paths.
    pub fn from_relative_path(path: &Path) -> Option<Self> {
        let stem = path.with_extension("");
        let mut segments = Vec::new();
        for component in stem.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Fully-qualified identifier below a namespace, e.g. `requests::user::get`.
    pub fn qualified(&self, namespace: &str) -> String {
        let mut parts = Vec::with_capacity(self.segments.len() + 1);
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        parts.extend(self.segments.iter().map(String::as_str));
        parts.join("::")
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A root that entry-point definitions are discovered under.
pub trait DefinitionSource {
    /// Namespace prefix of fully-qualified identifiers (e.g. `requests`).
    fn namespace(&self) -> &str;

    /// Human-readable location of the root, used in error messages.
    fn location(&self) -> String;

    /// Lists the logical names of every definition below the root, in a
    /// stable order.
    fn discover(&self) -> Result<Vec<LogicalName>, String>;

    /// Instantiates the definition behind a logical name.
    fn instantiate(&self, name: &LogicalName) -> Result<Box<dyn EntryPoint>, String>;
}

type Factory = Box<dyn Fn() -> Box<dyn EntryPoint>>;

/// Explicit registry of code-defined entry points.
///
/// Maps logical names to factories; [`discover`](DefinitionSource::discover)
/// returns names in sorted order.
///
/// # Examples
///
/// ```
/// use dal_doc_core::*;
///
/// let mut requests = Manifest::new("requests");
/// requests.register_fn("user/list", |fields: &dyn FieldLookup| {
///     let columns = fields.fields_of_table("user").join(", ");
///     RequestDescription::new(RequestType::Select)
///         .with_sql(format!("SELECT {columns} FROM user"))
///         .with_selected_field("user.*")
///         .into()
/// });
/// assert_eq!(requests.len(), 1);
/// ```
pub struct Manifest {
    namespace: String,
    factories: BTreeMap<LogicalName, Factory>,
}

impl Manifest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory under a `/`-separated logical name.
    ///
    /// A name without any segment is ignored. Registering a name twice
    /// replaces the earlier factory.
    pub fn register<F, E>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> E + 'static,
        E: EntryPoint + 'static,
    {
        if let Some(name) = LogicalName::parse(name) {
            self.factories
                .insert(name, Box::new(move || Box::new(factory()) as Box<dyn EntryPoint>));
        }
        self
    }

    /// Registers a function that builds the description directly.
    pub fn register_fn<F>(&mut self, name: &str, describe: F) -> &mut Self
    where
        F: Fn(&dyn FieldLookup) -> Description + 'static,
    {
        let describe: Rc<dyn Fn(&dyn FieldLookup) -> Description> = Rc::new(describe);
        self.register(name, move || FnEntryPoint(Rc::clone(&describe)))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("namespace", &self.namespace)
            .field("entries", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DefinitionSource for Manifest {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn location(&self) -> String {
        format!("manifest '{}'", self.namespace)
    }

    fn discover(&self) -> Result<Vec<LogicalName>, String> {
        Ok(self.factories.keys().cloned().collect())
    }

    fn instantiate(&self, name: &LogicalName) -> Result<Box<dyn EntryPoint>, String> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| format!("no factory registered for '{name}'"))
    }
}

struct FnEntryPoint(Rc<dyn Fn(&dyn FieldLookup) -> Description>);

impl EntryPoint for FnEntryPoint {
    fn description(&self, fields: &dyn FieldLookup) -> Description {
        (self.0)(fields)
    }
}
