//! Read access to a built documentation store.
//!
//! [`StoreQuery`] answers the questions the store exists for: which fields
//! a request touches in each role, what a procedure takes as input, and
//! which entry points touch a given field or business entity.
//!
//! [`StoreQuery::dump`] renders every row with ids replaced by natural keys,
//! so two builds from the same inputs compare equal even if ids differ.
//!
//! # Example
//!
//! ```no_run
//! use dal_doc_core::FieldRole;
//! use dal_doc_sqlite::StoreQuery;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("out/documentation.db").unwrap();
//! let query = StoreQuery::new(&conn, "doc_").unwrap();
//!
//! for field in query.request_fields("user/get_by_id", FieldRole::Selected).unwrap() {
//!     println!("{field}");
//! }
//! for usage in query.field_usage("user.id").unwrap() {
//!     println!("{} ({})", usage.entry_point, usage.role);
//! }
//! ```

use std::collections::BTreeMap;

use dal_doc_core::{DescriptionKind, FieldRole};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::{Result, SqliteError};
use crate::persist::{REQUEST_FIELD_TABLES, request_field_table};
use crate::schema::{JOIN_TABLES, PRIMARY_TABLES, validate_prefix};

/// One place where a field is referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUsage {
    pub kind: DescriptionKind,
    pub entry_point: String,
    pub role: FieldRole,
}

/// An entry point that applies an action to a business entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityUsage {
    pub kind: DescriptionKind,
    pub entry_point: String,
    pub action: String,
}

/// Query interface over a documentation store.
pub struct StoreQuery<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> StoreQuery<'a> {
    /// Creates a query interface for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Fields linked to a request in one role, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidQuery`] for roles that belong to
    /// procedures.
    pub fn request_fields(&self, request: &str, role: FieldRole) -> Result<Vec<String>> {
        let table = request_field_table(role).ok_or_else(|| {
            SqliteError::InvalidQuery(format!("{role} is not a request field role"))
        })?;
        let p = &self.prefix;
        self.strings(
            &format!(
                "SELECT f.name FROM {p}{table} j \
                 JOIN {p}request r ON r.id = j.request_id \
                 JOIN {p}field f ON f.id = j.field_id \
                 WHERE r.name = ?1 ORDER BY j.id"
            ),
            request,
        )
    }

    /// Input fields of a procedure with their mandatory level
    /// (2 always, 1 sometimes, 0 optional).
    pub fn procedure_input_fields(&self, procedure: &str) -> Result<Vec<(String, u8)>> {
        let p = &self.prefix;
        self.levelled(
            &format!(
                "SELECT f.name, j.mandatory FROM {p}procedure_input_field j \
                 JOIN {p}procedure o ON o.id = j.procedure_id \
                 JOIN {p}field f ON f.id = j.field_id \
                 WHERE o.name = ?1 ORDER BY j.id"
            ),
            procedure,
        )
    }

    /// Input parameters of a procedure with their mandatory level.
    pub fn procedure_input_params(&self, procedure: &str) -> Result<Vec<(String, u8)>> {
        let p = &self.prefix;
        self.levelled(
            &format!(
                "SELECT j.name, j.mandatory FROM {p}procedure_input_param j \
                 JOIN {p}procedure o ON o.id = j.procedure_id \
                 WHERE o.name = ?1 ORDER BY j.id"
            ),
            procedure,
        )
    }

    /// Requests invoked by a procedure.
    pub fn procedure_requests(&self, procedure: &str) -> Result<Vec<String>> {
        let p = &self.prefix;
        self.strings(
            &format!(
                "SELECT r.name FROM {p}procedure_request j \
                 JOIN {p}procedure o ON o.id = j.procedure_id \
                 JOIN {p}request r ON r.id = j.request_id \
                 WHERE o.name = ?1 ORDER BY j.id"
            ),
            procedure,
        )
    }

    /// Every entry point referencing `field` (`table.name`), sorted.
    pub fn field_usage(&self, field: &str) -> Result<Vec<FieldUsage>> {
        let p = &self.prefix;
        let mut usages = Vec::new();

        for (table, role) in REQUEST_FIELD_TABLES {
            for name in self.strings(
                &format!(
                    "SELECT r.name FROM {p}{table} j \
                     JOIN {p}request r ON r.id = j.request_id \
                     JOIN {p}field f ON f.id = j.field_id \
                     WHERE f.name = ?1"
                ),
                field,
            )? {
                usages.push(FieldUsage {
                    kind: DescriptionKind::Request,
                    entry_point: name,
                    role,
                });
            }
        }

        for (name, level) in self.levelled(
            &format!(
                "SELECT o.name, j.mandatory FROM {p}procedure_input_field j \
                 JOIN {p}procedure o ON o.id = j.procedure_id \
                 JOIN {p}field f ON f.id = j.field_id \
                 WHERE f.name = ?1"
            ),
            field,
        )? {
            let role = if level == 0 {
                FieldRole::OptionalInput
            } else {
                FieldRole::MandatoryInput
            };
            usages.push(FieldUsage {
                kind: DescriptionKind::Procedure,
                entry_point: name,
                role,
            });
        }

        for name in self.strings(
            &format!(
                "SELECT o.name FROM {p}procedure_output_field j \
                 JOIN {p}procedure o ON o.id = j.procedure_id \
                 JOIN {p}field f ON f.id = j.field_id \
                 WHERE f.name = ?1"
            ),
            field,
        )? {
            usages.push(FieldUsage {
                kind: DescriptionKind::Procedure,
                entry_point: name,
                role: FieldRole::Output,
            });
        }

        usages.sort_by(|a, b| {
            (a.kind as u8, &a.entry_point, a.role.as_str())
                .cmp(&(b.kind as u8, &b.entry_point, b.role.as_str()))
        });
        Ok(usages)
    }

    /// Every entry point acting on a business entity, sorted.
    pub fn entity_usage(&self, entity: &str) -> Result<Vec<EntityUsage>> {
        let p = &self.prefix;
        let mut usages = Vec::new();
        for (kind, owner) in [
            (DescriptionKind::Request, "request"),
            (DescriptionKind::Procedure, "procedure"),
        ] {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT o.name, a.name FROM {p}{owner}_entity_action j \
                 JOIN {p}{owner} o ON o.id = j.{owner}_id \
                 JOIN {p}entity e ON e.id = j.entity_id \
                 JOIN {p}action a ON a.id = j.action_id \
                 WHERE e.name = ?1 ORDER BY o.name, a.name"
            ))?;
            let rows = stmt.query_map(params![entity], |row| {
                Ok(EntityUsage {
                    kind,
                    entry_point: row.get(0)?,
                    action: row.get(1)?,
                })
            })?;
            for usage in rows {
                usages.push(usage?);
            }
        }
        Ok(usages)
    }

    /// Number of rows violating a foreign key, as reported by
    /// `PRAGMA foreign_key_check`.
    pub fn foreign_key_violations(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Renders every table as sorted lines of natural keys.
    ///
    /// Keys are the unprefixed table names. Generated ids never appear, so
    /// dumps of two stores built from the same inputs are equal.
    pub fn dump(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut dump = BTreeMap::new();
        for table in PRIMARY_TABLES.iter().chain(JOIN_TABLES.iter()) {
            let sql = dump_sql(&self.prefix, table);
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut lines = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            lines.sort();
            dump.insert((*table).to_string(), lines);
        }
        Ok(dump)
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn strings(&self, sql: &str, key: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn levelled(&self, sql: &str, key: &str) -> Result<Vec<(String, u8)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<(String, u8)>>>()?)
    }
}

/// Query rendering one row per line with parent ids resolved to names.
fn dump_sql(p: &str, table: &str) -> String {
    const SEP: &str = "' | '";
    match table {
        "table" | "entity" | "action" => format!("SELECT name FROM {p}{table}"),
        "tag" => format!("SELECT tag FROM {p}tag"),
        "field" => format!(
            "SELECT f.name || {SEP} || t.name FROM {p}field f JOIN {p}table t ON t.id = f.table_id"
        ),
        "request" => format!(
            "SELECT name || {SEP} || type || {SEP} || multi_sql || {SEP} || sql || {SEP} || \
             COALESCE(description, '') FROM {p}request"
        ),
        "procedure" => format!(
            "SELECT name || {SEP} || result_multi_row || {SEP} || COALESCE(description, '') \
             FROM {p}procedure"
        ),
        "request_tag" | "procedure_tag" => {
            let owner = owner_of(table);
            format!(
                "SELECT o.name || {SEP} || t.tag FROM {p}{table} j \
                 JOIN {p}{owner} o ON o.id = j.{owner}_id JOIN {p}tag t ON t.id = j.tag_id"
            )
        }
        "request_entity_action" | "procedure_entity_action" => {
            let owner = owner_of(table);
            format!(
                "SELECT o.name || {SEP} || e.name || {SEP} || a.name FROM {p}{table} j \
                 JOIN {p}{owner} o ON o.id = j.{owner}_id \
                 JOIN {p}entity e ON e.id = j.entity_id JOIN {p}action a ON a.id = j.action_id"
            )
        }
        "request_parameter_value"
        | "request_output_data_value"
        | "procedure_output_value"
        | "procedure_output_data_value" => {
            let owner = owner_of(table);
            format!(
                "SELECT o.name || {SEP} || j.name || {SEP} || COALESCE(j.description, '') \
                 FROM {p}{table} j JOIN {p}{owner} o ON o.id = j.{owner}_id"
            )
        }
        "procedure_request" => format!(
            "SELECT o.name || {SEP} || r.name FROM {p}procedure_request j \
             JOIN {p}procedure o ON o.id = j.procedure_id JOIN {p}request r ON r.id = j.request_id"
        ),
        "procedure_input_field" => format!(
            "SELECT o.name || {SEP} || f.name || {SEP} || j.mandatory || {SEP} || \
             COALESCE(j.description, '') FROM {p}procedure_input_field j \
             JOIN {p}procedure o ON o.id = j.procedure_id JOIN {p}field f ON f.id = j.field_id"
        ),
        "procedure_output_field" => format!(
            "SELECT o.name || {SEP} || f.name || {SEP} || COALESCE(j.description, '') \
             FROM {p}procedure_output_field j \
             JOIN {p}procedure o ON o.id = j.procedure_id JOIN {p}field f ON f.id = j.field_id"
        ),
        "procedure_input_param" => format!(
            "SELECT o.name || {SEP} || j.name || {SEP} || j.mandatory || {SEP} || \
             COALESCE(j.description, '') FROM {p}procedure_input_param j \
             JOIN {p}procedure o ON o.id = j.procedure_id"
        ),
        // request field-role tables
        _ => format!(
            "SELECT o.name || {SEP} || f.name FROM {p}{table} j \
             JOIN {p}request o ON o.id = j.request_id JOIN {p}field f ON f.id = j.field_id"
        ),
    }
}

fn owner_of(table: &str) -> &'static str {
    if table.starts_with("procedure") {
        "procedure"
    } else {
        "request"
    }
}
