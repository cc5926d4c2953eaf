//! Canonical view of the live database schema.
//!
//! [`RawSchema`] is the `table -> [fields]` map extracted from the source
//! database (or re-loaded from a snapshot). [`SchemaRegistry`] is the
//! read-only index built from it that descriptions are validated against.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementRepository};

/// Raw `table -> ordered fields` map as read from the source database.
///
/// Tables are kept sorted by name; each field list keeps the order reported
/// by the source.
///
/// # Examples
///
/// ```
/// use dal_doc_core::RawSchema;
///
/// let mut raw = RawSchema::new();
/// raw.insert_table("user", ["id", "login", "password"]);
/// assert_eq!(raw.fields("user").unwrap().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSchema(BTreeMap<String, Vec<String>>);

impl RawSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a table and its ordered field list.
    pub fn insert_table<I, S>(&mut self, table: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(table.into(), fields.into_iter().map(Into::into).collect());
    }

    pub fn fields(&self, table: &str) -> Option<&[String]> {
        self.0.get(table).map(Vec::as_slice)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for RawSchema {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RawSchema {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A concrete field known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    table: String,
    name: String,
    qualified: String,
}

impl Field {
    fn new(table: &str, name: &str) -> Self {
        Self {
            table: table.to_string(),
            name: name.to_string(),
            qualified: format!("{table}.{name}"),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `"<table>.<field>"` form used in descriptions and in the store.
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }
}

/// Read-only index of tables and their ordered fields.
///
/// Built once per run with [`SchemaRegistry::build`], which also registers a
/// table element and one field element per column in the run's
/// [`ElementRepository`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    fields_by_table: BTreeMap<String, Vec<Field>>,
}

impl SchemaRegistry {
    /// Builds the registry and populates table/field elements.
    ///
    /// Duplicate field names within a table are registered once, at the
    /// position of their first occurrence.
    pub fn build(raw: &RawSchema, repository: &mut ElementRepository) -> Self {
        let mut fields_by_table = BTreeMap::new();

        for (table, names) in raw {
            repository.add(Element::table(table.as_str()));

            let mut fields: Vec<Field> = Vec::with_capacity(names.len());
            for name in names {
                if fields.iter().any(|f| &f.name == name) {
                    continue;
                }
                repository.add(Element::field(table, name));
                fields.push(Field::new(table, name));
            }
            fields_by_table.insert(table.clone(), fields);
        }

        Self { fields_by_table }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.fields_by_table.contains_key(table)
    }

    /// Ordered fields of a table, or `None` for an unknown table.
    pub fn fields_of(&self, table: &str) -> Option<&[Field]> {
        self.fields_by_table.get(table).map(Vec::as_slice)
    }

    /// Looks up a single field by table and field name.
    pub fn field(&self, table: &str, name: &str) -> Option<&Field> {
        self.fields_of(table)?.iter().find(|f| f.name == name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.fields_by_table.keys().map(String::as_str)
    }

    pub fn table_count(&self) -> usize {
        self.fields_by_table.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields_by_table.values().map(Vec::len).sum()
    }
}

/// Resolves a table name to its ordered, unqualified field names.
///
/// Entry-point definitions receive a lookup while their description is
/// produced, so SQL text and field lists can be derived from the live schema
/// instead of hard-coding column names. Unknown tables resolve to an empty
/// list.
pub trait FieldLookup {
    fn fields_of_table(&self, table: &str) -> Vec<String>;
}

impl FieldLookup for SchemaRegistry {
    fn fields_of_table(&self, table: &str) -> Vec<String> {
        self.fields_of(table)
            .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }
}

impl FieldLookup for RawSchema {
    fn fields_of_table(&self, table: &str) -> Vec<String> {
        self.fields(table).map(<[String]>::to_vec).unwrap_or_default()
    }
}

impl<F> FieldLookup for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn fields_of_table(&self, table: &str) -> Vec<String> {
        self(table)
    }
}
