//! Field reference parsing and wildcard expansion.
//!
//! Descriptions refer to columns as `"table.field"` or `"table.*"`. Before a
//! description is persisted every list is run through [`expand`], which
//! verifies the table part against the [`SchemaRegistry`] and replaces each
//! wildcard with the table's concrete fields in registry order.
//!
//! Only the table part is checked. A concrete reference to a field the table
//! does not have is kept as written.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::element::ElementKind;
use crate::registry::SchemaRegistry;

static FIELD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.]+)\.([^.]+)$").expect("static regex must compile"));

/// The purpose a field plays within an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Selected,
    Updated,
    Inserted,
    Upserted,
    Condition,
    Presentation,
    MandatoryInput,
    OptionalInput,
    Output,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Selected => "selected",
            FieldRole::Updated => "updated",
            FieldRole::Inserted => "inserted",
            FieldRole::Upserted => "upserted",
            FieldRole::Condition => "condition",
            FieldRole::Presentation => "presentation",
            FieldRole::MandatoryInput => "mandatory input",
            FieldRole::OptionalInput => "optional input",
            FieldRole::Output => "output",
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating a description.
///
/// Validation stops at the first problem; the error names the offending
/// entry and the list it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldReferenceError {
    /// Entry has no dot or more than one dot.
    #[error("Invalid field name '{entry}' in {role} list: must follow table.name or table.*")]
    InvalidFieldName { role: FieldRole, entry: String },

    /// Table part of an entry is not in the registry.
    #[error("table {table} does not exist (referenced by '{entry}' in {role} list)")]
    UnknownTable {
        role: FieldRole,
        table: String,
        entry: String,
    },

    /// Tag, business entity or action name is empty.
    #[error("{kind} name cannot be empty")]
    EmptyIdentifier { kind: ElementKind },
}

/// A parsed field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    /// `table.field`
    Concrete { table: &'a str, field: &'a str },
    /// `table.*`
    Wildcard { table: &'a str },
}

impl<'a> FieldRef<'a> {
    /// Parses an entry, returning `None` when it is not `table.name` or `table.*`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dal_doc_core::FieldRef;
    ///
    /// assert_eq!(FieldRef::parse("user.*"), Some(FieldRef::Wildcard { table: "user" }));
    /// assert!(FieldRef::parse("user").is_none());
    /// assert!(FieldRef::parse("db.user.id").is_none());
    /// ```
    pub fn parse(entry: &'a str) -> Option<Self> {
        let captures = FIELD_PATTERN.captures(entry)?;
        let table = captures.get(1)?.as_str();
        let field = captures.get(2)?.as_str();
        if field == "*" {
            Some(FieldRef::Wildcard { table })
        } else {
            Some(FieldRef::Concrete { table, field })
        }
    }

    pub fn table(&self) -> &'a str {
        match self {
            FieldRef::Concrete { table, .. } | FieldRef::Wildcard { table } => table,
        }
    }
}

/// An item of a role list that is addressed by a field reference.
///
/// Plain strings are entries of request role lists; procedure lists carry a
/// description and a mandatory flag alongside the field name, and expansion
/// copies those onto every field a wildcard produces.
pub trait FieldEntry: Clone {
    fn field_name(&self) -> &str;

    /// Returns a copy of the entry pointing at another field.
    fn with_field_name(&self, name: String) -> Self;
}

impl FieldEntry for String {
    fn field_name(&self) -> &str {
        self
    }

    fn with_field_name(&self, name: String) -> Self {
        name
    }
}

/// Validates a role list and returns its expanded, concrete form.
///
/// The input is not modified. Wildcards are replaced in place by the table's
/// fields, so the returned list may be longer than the input.
///
/// # Errors
///
/// Returns the first [`FieldReferenceError`] encountered.
///
/// # Examples
///
/// ```
/// use dal_doc_core::{ElementRepository, FieldRole, RawSchema, SchemaRegistry, expand};
///
/// let mut raw = RawSchema::new();
/// raw.insert_table("user", ["id", "login"]);
/// let registry = SchemaRegistry::build(&raw, &mut ElementRepository::new());
///
/// let entries = vec!["user.*".to_string()];
/// let expanded = expand(FieldRole::Selected, &entries, &registry).unwrap();
/// assert_eq!(expanded, ["user.id", "user.login"]);
/// ```
pub fn expand<E: FieldEntry>(
    role: FieldRole,
    entries: &[E],
    registry: &SchemaRegistry,
) -> Result<Vec<E>, FieldReferenceError> {
    let mut expanded = Vec::with_capacity(entries.len());

    for entry in entries {
        let name = entry.field_name();
        let reference =
            FieldRef::parse(name).ok_or_else(|| FieldReferenceError::InvalidFieldName {
                role,
                entry: name.to_string(),
            })?;

        let table = reference.table();
        let Some(fields) = registry.fields_of(table) else {
            return Err(FieldReferenceError::UnknownTable {
                role,
                table: table.to_string(),
                entry: name.to_string(),
            });
        };

        match reference {
            FieldRef::Wildcard { .. } => expanded.extend(
                fields
                    .iter()
                    .map(|f| entry.with_field_name(f.qualified_name().to_string())),
            ),
            FieldRef::Concrete { .. } => expanded.push(entry.clone()),
        }
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementRepository;
    use crate::registry::RawSchema;

    fn registry() -> SchemaRegistry {
        let mut raw = RawSchema::new();
        raw.insert_table("user", ["id", "login", "password"]);
        raw.insert_table("session", ["token"]);
        SchemaRegistry::build(&raw, &mut ElementRepository::new())
    }

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_concrete() {
        assert_eq!(
            FieldRef::parse("user.id"),
            Some(FieldRef::Concrete {
                table: "user",
                field: "id"
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldRef::parse("").is_none());
        assert!(FieldRef::parse("user").is_none());
        assert!(FieldRef::parse("user.").is_none());
        assert!(FieldRef::parse(".id").is_none());
        assert!(FieldRef::parse("a.b.c").is_none());
    }

    #[test]
    fn test_wildcard_expands_in_place() {
        let entries = list(&["session.token", "user.*", "session.token"]);
        let expanded = expand(FieldRole::Selected, &entries, &registry()).unwrap();
        assert_eq!(
            expanded,
            [
                "session.token",
                "user.id",
                "user.login",
                "user.password",
                "session.token"
            ]
        );
    }

    #[test]
    fn test_unknown_table_is_named() {
        let entries = list(&["user.id", "orders.id"]);
        let err = expand(FieldRole::Condition, &entries, &registry()).unwrap_err();
        assert_eq!(
            err,
            FieldReferenceError::UnknownTable {
                role: FieldRole::Condition,
                table: "orders".into(),
                entry: "orders.id".into(),
            }
        );
        assert!(err.to_string().contains("table orders does not exist"));
    }

    #[test]
    fn test_malformed_entry_message() {
        let err = expand(FieldRole::Updated, &list(&["login"]), &registry()).unwrap_err();
        assert!(matches!(err, FieldReferenceError::InvalidFieldName { .. }));
        assert!(
            err.to_string()
                .contains("must follow table.name or table.*")
        );
    }

    #[test]
    fn test_unknown_field_of_known_table_is_kept() {
        let entries = list(&["user.nickname"]);
        let expanded = expand(FieldRole::Selected, &entries, &registry()).unwrap();
        assert_eq!(expanded, ["user.nickname"]);
    }

    #[test]
    fn test_empty_list() {
        let expanded = expand::<String>(FieldRole::Output, &[], &registry()).unwrap();
        assert!(expanded.is_empty());
    }
}
