//! Row-level writes into the documentation store.
//!
//! Element rows and entry-point rows return their generated id. Join rows
//! are written with `INSERT OR IGNORE` and report whether a row was added,
//! so a field reached twice in the same role list (once directly and once
//! through a wildcard, say) yields a single link.
//!
//! Nothing here resolves names to ids; that is the job of
//! [`DocumentationBuilder`](crate::DocumentationBuilder), which owns the
//! element repository.

use dal_doc_core::{
    Element, ElementKind, FieldRole, InputParam, Mandatory, NamedValue, ProcedureDescription,
    RequestDescription,
};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::{Result, SqliteError};

/// Join tables holding a request's field roles.
pub(crate) const REQUEST_FIELD_TABLES: [(&str, FieldRole); 6] = [
    ("request_selection_field", FieldRole::Selected),
    ("request_update_field", FieldRole::Updated),
    ("request_insert_field", FieldRole::Inserted),
    ("request_upsert_field", FieldRole::Upserted),
    ("request_condition_field", FieldRole::Condition),
    ("request_presentation_field", FieldRole::Presentation),
];

/// Returns the join table of a request field role, if it has one.
pub(crate) fn request_field_table(role: FieldRole) -> Option<&'static str> {
    REQUEST_FIELD_TABLES
        .iter()
        .find(|(_, r)| *r == role)
        .map(|(table, _)| *table)
}

/// The entry-point table a join row hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Request,
    Procedure,
}

impl Owner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Owner::Request => "request",
            Owner::Procedure => "procedure",
        }
    }
}

/// Inserts an element row and returns its id.
///
/// Fields need the id of their owning table, passed as `table_id`.
pub fn insert_element(
    conn: &Connection,
    prefix: &str,
    element: &Element,
    table_id: Option<i64>,
) -> Result<i64> {
    match element.kind() {
        ElementKind::Table => conn.execute(
            &format!("INSERT INTO {prefix}table (name) VALUES (?1)"),
            params![element.name()],
        )?,
        ElementKind::Field => {
            let table_id = table_id.ok_or_else(|| {
                SqliteError::PersistenceError(format!(
                    "field {} has no owning table id",
                    element.name()
                ))
            })?;
            conn.execute(
                &format!("INSERT INTO {prefix}field (name, table_id) VALUES (?1, ?2)"),
                params![element.name(), table_id],
            )?
        }
        ElementKind::Tag => conn.execute(
            &format!("INSERT INTO {prefix}tag (tag) VALUES (?1)"),
            params![element.name()],
        )?,
        ElementKind::BusinessEntity => conn.execute(
            &format!("INSERT INTO {prefix}entity (name) VALUES (?1)"),
            params![element.name()],
        )?,
        ElementKind::Action => conn.execute(
            &format!("INSERT INTO {prefix}action (name) VALUES (?1)"),
            params![element.name()],
        )?,
    };
    Ok(conn.last_insert_rowid())
}

/// Inserts a request row and returns its id.
///
/// Multi-variant SQL is stored as a JSON object with `multi_sql = 1`.
pub fn insert_request(conn: &Connection, prefix: &str, request: &RequestDescription) -> Result<i64> {
    let sql = request.sql.to_stored().map_err(|e| {
        SqliteError::PersistenceError(format!(
            "cannot serialize SQL variants of {}: {e}",
            request.meta.name
        ))
    })?;
    conn.execute(
        &format!(
            "INSERT INTO {prefix}request (name, type, sql, multi_sql, description) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            request.meta.name,
            request.request_type.as_str(),
            sql,
            request.sql.is_multi(),
            request.meta.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a procedure row and returns its id.
pub fn insert_procedure(
    conn: &Connection,
    prefix: &str,
    procedure: &ProcedureDescription,
) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}procedure (name, description, result_multi_row) VALUES (?1, ?2, ?3)"
        ),
        params![
            procedure.meta.name,
            procedure.meta.description,
            procedure.multi_row
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Links a request to a field in one of the request field-role tables.
pub fn link_request_field(
    conn: &Connection,
    prefix: &str,
    table: &str,
    request_id: i64,
    field_id: i64,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}{table} (request_id, field_id) VALUES (?1, ?2)"
        ),
        params![request_id, field_id],
    )?;
    Ok(changed > 0)
}

pub fn link_tag(
    conn: &Connection,
    prefix: &str,
    owner: Owner,
    owner_id: i64,
    tag_id: i64,
) -> Result<bool> {
    let owner = owner.as_str();
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}{owner}_tag ({owner}_id, tag_id) VALUES (?1, ?2)"
        ),
        params![owner_id, tag_id],
    )?;
    Ok(changed > 0)
}

pub fn link_entity_action(
    conn: &Connection,
    prefix: &str,
    owner: Owner,
    owner_id: i64,
    entity_id: i64,
    action_id: i64,
) -> Result<bool> {
    let owner = owner.as_str();
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}{owner}_entity_action ({owner}_id, entity_id, action_id) \
             VALUES (?1, ?2, ?3)"
        ),
        params![owner_id, entity_id, action_id],
    )?;
    Ok(changed > 0)
}

/// Writes a name/description row into one of the value tables
/// (`request_parameter_value`, `procedure_output_value`, ...).
pub fn insert_named_value(
    conn: &Connection,
    prefix: &str,
    table: &str,
    owner: Owner,
    owner_id: i64,
    value: &NamedValue,
) -> Result<bool> {
    let owner = owner.as_str();
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}{table} ({owner}_id, name, description) VALUES (?1, ?2, ?3)"
        ),
        params![owner_id, value.name, value.description],
    )?;
    Ok(changed > 0)
}

pub fn link_procedure_request(
    conn: &Connection,
    prefix: &str,
    procedure_id: i64,
    request_id: i64,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}procedure_request (procedure_id, request_id) VALUES (?1, ?2)"
        ),
        params![procedure_id, request_id],
    )?;
    Ok(changed > 0)
}

/// Links a procedure to an input field with its mandatory level.
///
/// When a field is listed both as mandatory and optional, the first
/// written level wins.
pub fn insert_input_field(
    conn: &Connection,
    prefix: &str,
    procedure_id: i64,
    field_id: i64,
    mandatory: Mandatory,
    description: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}procedure_input_field (procedure_id, field_id, mandatory, description) \
             VALUES (?1, ?2, ?3, ?4)"
        ),
        params![procedure_id, field_id, mandatory.level(), description],
    )?;
    Ok(changed > 0)
}

pub fn insert_output_field(
    conn: &Connection,
    prefix: &str,
    procedure_id: i64,
    field_id: i64,
    description: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}procedure_output_field (procedure_id, field_id, description) \
             VALUES (?1, ?2, ?3)"
        ),
        params![procedure_id, field_id, description],
    )?;
    Ok(changed > 0)
}

pub fn insert_input_param(
    conn: &Connection,
    prefix: &str,
    procedure_id: i64,
    param: &InputParam,
    mandatory: Mandatory,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {prefix}procedure_input_param (procedure_id, name, mandatory, description) \
             VALUES (?1, ?2, ?3, ?4)"
        ),
        params![procedure_id, param.name, mandatory.level(), param.description],
    )?;
    Ok(changed > 0)
}

/// Counts of rows written during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertCounts {
    pub tables: usize,
    pub fields: usize,
    pub tags: usize,
    pub entities: usize,
    pub actions: usize,
    pub requests: usize,
    pub procedures: usize,
    /// Rows written to join tables.
    pub links: usize,
}

impl InsertCounts {
    /// Records one element row of the given kind.
    pub fn add_element(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Table => self.tables += 1,
            ElementKind::Field => self.fields += 1,
            ElementKind::Tag => self.tags += 1,
            ElementKind::BusinessEntity => self.entities += 1,
            ElementKind::Action => self.actions += 1,
        }
    }

    /// Records a join row if it was actually written.
    pub fn add_link(&mut self, written: bool) {
        if written {
            self.links += 1;
        }
    }
}
