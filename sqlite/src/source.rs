//! Live-schema extraction from a SQLite database.

use std::path::{Path, PathBuf};

use dal_doc_core::RawSchema;
use dal_doc_db::{DatabaseError, SchemaSource};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

/// Reads the schema of an existing SQLite database, opened read-only.
///
/// Every user table is listed (internal `sqlite_%` tables are skipped) with
/// its columns in declaration order.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extraction_error(&self, err: rusqlite::Error) -> DatabaseError {
        DatabaseError::SchemaExtraction {
            location: self.location(),
            reason: err.to_string(),
        }
    }
}

impl SchemaSource for SqliteSource {
    fn location(&self) -> String {
        format!("sqlite database {}", self.path.display())
    }

    fn extract_schema(&self) -> dal_doc_db::Result<RawSchema> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DatabaseError::Connection {
            location: self.location(),
            reason: e.to_string(),
        })?;

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                     ORDER BY name",
                )
                .map_err(|e| self.extraction_error(e))?;
            stmt.query_map([], |row| row.get(0))
                .and_then(|rows| rows.collect())
                .map_err(|e| self.extraction_error(e))?
        };

        let mut raw = RawSchema::new();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| self.extraction_error(e))?;
        for table in tables {
            let fields: Vec<String> = stmt
                .query_map([&table], |row| row.get(0))
                .and_then(|rows| rows.collect())
                .map_err(|e| self.extraction_error(e))?;
            debug!(table = %table, fields = fields.len(), "Extracted table");
            raw.insert_table(table, fields);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_tables_in_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT, login TEXT, password TEXT);
             CREATE TABLE session (token TEXT, user_id INTEGER);
             INSERT INTO user (login, password) VALUES ('a', 'b');",
        )
        .unwrap();
        drop(conn);

        let raw = SqliteSource::new(&path).extract_schema().unwrap();
        assert_eq!(raw.tables().collect::<Vec<_>>(), ["session", "user"]);
        assert_eq!(raw.fields("user").unwrap(), ["id", "login", "password"]);
        assert_eq!(raw.fields("session").unwrap(), ["token", "user_id"]);
    }

    #[test]
    fn test_missing_database_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteSource::new(dir.path().join("missing.db"))
            .extract_schema()
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Connection { .. }));
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_not_a_database_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, "definitely not sqlite, just some long enough text here").unwrap();
        assert!(SqliteSource::new(&path).extract_schema().is_err());
    }
}
