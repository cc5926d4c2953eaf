//! SQL schema generation with customizable table prefixes.
//!
//! Generates the normalized `CREATE TABLE` statements of the documentation
//! store. All table names are prefixed with a configurable string so that
//! several documentation sets can live in the same SQLite database.
//!
//! # Table structure
//!
//! Element tables, each with a unique natural key:
//!
//! - `{prefix}table`, `{prefix}field`, `{prefix}tag`, `{prefix}entity`,
//!   `{prefix}action`
//!
//! Entry-point tables:
//!
//! - `{prefix}request` — SQL text (JSON when multi-variant), type, description
//! - `{prefix}procedure` — description and multi-row flag
//!
//! Join tables, listed in [`JOIN_TABLES`]. Every join table is unique on its
//! foreign-key tuple; the name/value tables are unique on `(owner, name)`.
//!
//! # Custom prefix
//!
//! Prefixes must be non-empty and contain only alphanumeric characters and
//! underscores, since they are interpolated into SQL identifiers.

use dal_doc_db::is_valid_prefix;

use crate::error::{Result, SqliteError};

/// Element and entry-point tables, in creation order.
pub const PRIMARY_TABLES: [&str; 7] = [
    "table",
    "field",
    "tag",
    "entity",
    "action",
    "request",
    "procedure",
];

/// Join tables, in creation order.
pub const JOIN_TABLES: [&str; 18] = [
    "request_selection_field",
    "request_update_field",
    "request_insert_field",
    "request_upsert_field",
    "request_condition_field",
    "request_presentation_field",
    "request_parameter_value",
    "request_tag",
    "request_output_data_value",
    "request_entity_action",
    "procedure_tag",
    "procedure_request",
    "procedure_input_field",
    "procedure_output_field",
    "procedure_input_param",
    "procedure_output_value",
    "procedure_output_data_value",
    "procedure_entity_action",
];

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if !is_valid_prefix(prefix) {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

fn field_link(prefix: &str, table: &str, owner: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}{table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {owner}_id INTEGER NOT NULL,
    field_id INTEGER NOT NULL,
    UNIQUE ({owner}_id, field_id),
    FOREIGN KEY ({owner}_id) REFERENCES {prefix}{owner}(id) ON DELETE CASCADE,
    FOREIGN KEY (field_id) REFERENCES {prefix}field(id) ON DELETE CASCADE
);
"#
    )
}

fn named_value(prefix: &str, table: &str, owner: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}{table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {owner}_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    UNIQUE ({owner}_id, name),
    FOREIGN KEY ({owner}_id) REFERENCES {prefix}{owner}(id) ON DELETE CASCADE
);
"#
    )
}

fn tag_link(prefix: &str, owner: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}{owner}_tag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {owner}_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    UNIQUE ({owner}_id, tag_id),
    FOREIGN KEY ({owner}_id) REFERENCES {prefix}{owner}(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES {prefix}tag(id) ON DELETE CASCADE
);
"#
    )
}

fn entity_action_link(prefix: &str, owner: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}{owner}_entity_action (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {owner}_id INTEGER NOT NULL,
    entity_id INTEGER NOT NULL,
    action_id INTEGER NOT NULL,
    UNIQUE ({owner}_id, entity_id, action_id),
    FOREIGN KEY ({owner}_id) REFERENCES {prefix}{owner}(id) ON DELETE CASCADE,
    FOREIGN KEY (entity_id) REFERENCES {prefix}entity(id) ON DELETE CASCADE,
    FOREIGN KEY (action_id) REFERENCES {prefix}action(id) ON DELETE CASCADE
);
"#
    )
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix contains characters
/// other than alphanumerics and underscores, or if it is empty.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let mut sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS {prefix}field (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    table_id INTEGER NOT NULL,
    FOREIGN KEY (table_id) REFERENCES {prefix}table(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}tag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS {prefix}entity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS {prefix}action (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS {prefix}request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL CHECK (type IN ('select', 'update', 'delete', 'insert', 'upsert')),
    sql TEXT NOT NULL,
    multi_sql INTEGER NOT NULL DEFAULT 0,
    description TEXT
);

CREATE TABLE IF NOT EXISTS {prefix}procedure (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    result_multi_row INTEGER NOT NULL DEFAULT 0
);
"#
    );

    for (table, _) in crate::persist::REQUEST_FIELD_TABLES {
        sql.push_str(&field_link(prefix, table, "request"));
    }
    sql.push_str(&named_value(prefix, "request_parameter_value", "request"));
    sql.push_str(&tag_link(prefix, "request"));
    sql.push_str(&named_value(prefix, "request_output_data_value", "request"));
    sql.push_str(&entity_action_link(prefix, "request"));

    sql.push_str(&tag_link(prefix, "procedure"));
    sql.push_str(&format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}procedure_request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_id INTEGER NOT NULL,
    request_id INTEGER NOT NULL,
    UNIQUE (procedure_id, request_id),
    FOREIGN KEY (procedure_id) REFERENCES {prefix}procedure(id) ON DELETE CASCADE,
    FOREIGN KEY (request_id) REFERENCES {prefix}request(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}procedure_input_field (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_id INTEGER NOT NULL,
    field_id INTEGER NOT NULL,
    mandatory INTEGER NOT NULL CHECK (mandatory IN (0, 1, 2)),
    description TEXT,
    UNIQUE (procedure_id, field_id),
    FOREIGN KEY (procedure_id) REFERENCES {prefix}procedure(id) ON DELETE CASCADE,
    FOREIGN KEY (field_id) REFERENCES {prefix}field(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}procedure_output_field (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_id INTEGER NOT NULL,
    field_id INTEGER NOT NULL,
    description TEXT,
    UNIQUE (procedure_id, field_id),
    FOREIGN KEY (procedure_id) REFERENCES {prefix}procedure(id) ON DELETE CASCADE,
    FOREIGN KEY (field_id) REFERENCES {prefix}field(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}procedure_input_param (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    mandatory INTEGER NOT NULL CHECK (mandatory IN (0, 1, 2)),
    description TEXT,
    UNIQUE (procedure_id, name),
    FOREIGN KEY (procedure_id) REFERENCES {prefix}procedure(id) ON DELETE CASCADE
);
"#
    ));
    sql.push_str(&named_value(prefix, "procedure_output_value", "procedure"));
    sql.push_str(&named_value(prefix, "procedure_output_data_value", "procedure"));
    sql.push_str(&entity_action_link(prefix, "procedure"));

    Ok(sql)
}

/// Generates SQL to drop all store tables, join tables first.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = JOIN_TABLES
        .iter()
        .rev()
        .chain(PRIMARY_TABLES.iter().rev())
        .map(|table| format!("DROP TABLE IF EXISTS {prefix}{table};\n"))
        .collect();
    Ok(sql)
}
