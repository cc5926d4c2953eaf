//! Lifecycle of the documentation store.
//!
//! [`DocumentationStore`] wraps the SQLite connection the build writes into.
//! It creates ([`up`](DocumentationStore::up)) and drops
//! ([`down`](DocumentationStore::down)) the prefixed tables and reports
//! row counts.
//!
//! # Example
//!
//! ```no_run
//! use dal_doc_sqlite::DocumentationStore;
//!
//! let mut store = DocumentationStore::open_fresh("out/documentation.db", "doc_").unwrap();
//! store.up().unwrap();
//!
//! let status = store.status().unwrap();
//! assert!(status.tables_exist);
//! ```

use std::path::Path;

use dal_doc_db::remove_if_exists;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::error::{BuildError, Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_prefix};

/// Suffixes of the files SQLite may keep next to a database.
const SIDE_FILES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// The normalized documentation store.
///
/// Table creation and removal run inside a transaction. Row writes made by
/// the builder do not: a failed build leaves the rows written so far.
#[derive(Debug)]
pub struct DocumentationStore {
    conn: Connection,
    prefix: String,
}

impl DocumentationStore {
    /// Wraps an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Deletes any store at `path` (with its journal files) and opens a new,
    /// empty one. Tables are not created; call [`up`](Self::up).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ArtifactIo`] if an old file cannot be removed
    /// or the parent directory cannot be created, and
    /// [`BuildError::Persistence`] if the database cannot be opened.
    pub fn open_fresh(path: impl AsRef<Path>, prefix: &str) -> std::result::Result<Self, BuildError> {
        let path = path.as_ref();
        validate_prefix(prefix)?;

        let mut stale = vec![path.to_path_buf()];
        for suffix in SIDE_FILES {
            let mut side = path.as_os_str().to_os_string();
            side.push(suffix);
            stale.push(side.into());
        }
        for file in &stale {
            remove_if_exists(file).map_err(|e| BuildError::ArtifactIo {
                path: file.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::ArtifactIo {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        debug!(path = %path.display(), "Opening fresh documentation store");
        let conn = Connection::open(path).map_err(SqliteError::from)?;
        Ok(Self::new(conn, prefix)?)
    }

    /// Creates all store tables.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it is safe to call multiple times.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Drops all store tables, join tables first.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Drops and recreates every table, leaving an empty store.
    pub fn reset(&mut self) -> Result<()> {
        self.down()?;
        self.up()
    }

    /// Reports whether the tables exist and how many rows the primary
    /// tables hold.
    pub fn status(&self) -> Result<StoreStatus> {
        if !self.tables_exist()? {
            return Ok(StoreStatus::default());
        }

        Ok(StoreStatus {
            tables_exist: true,
            table_count: self.count_rows("table")?,
            field_count: self.count_rows("field")?,
            tag_count: self.count_rows("tag")?,
            entity_count: self.count_rows("entity")?,
            action_count: self.count_rows("action")?,
            request_count: self.count_rows("request")?,
            procedure_count: self.count_rows("procedure")?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn tables_exist(&self) -> Result<bool> {
        let table_name = format!("{}request", self.prefix);
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([&table_name], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let full_table = format!("{}{}", self.prefix, table);
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT COUNT(*) FROM {full_table}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Row counts of a documentation store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    /// Whether the store tables exist.
    pub tables_exist: bool,
    pub table_count: usize,
    pub field_count: usize,
    pub tag_count: usize,
    pub entity_count: usize,
    pub action_count: usize,
    pub request_count: usize,
    pub procedure_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DocumentationStore {
        DocumentationStore::new(Connection::open_in_memory().unwrap(), "doc_").unwrap()
    }

    #[test]
    fn test_new_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(DocumentationStore::new(conn, "valid_prefix_").is_ok());

        let conn = Connection::open_in_memory().unwrap();
        assert!(DocumentationStore::new(conn, "").is_err());

        let conn = Connection::open_in_memory().unwrap();
        assert!(DocumentationStore::new(conn, "drop;--").is_err());
    }

    #[test]
    fn test_status_on_empty_database() {
        let status = store().status().unwrap();
        assert!(!status.tables_exist);
        assert_eq!(status.request_count, 0);
    }

    #[test]
    fn test_up_and_status() {
        let mut store = store();
        store.up().unwrap();
        let status = store.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.table_count, 0);
        assert_eq!(status.procedure_count, 0);
    }

    #[test]
    fn test_up_is_idempotent() {
        let mut store = store();
        store.up().unwrap();
        store.up().unwrap();
        assert!(store.status().unwrap().tables_exist);
    }

    #[test]
    fn test_down_removes_tables() {
        let mut store = store();
        store.up().unwrap();
        store.down().unwrap();
        assert!(!store.status().unwrap().tables_exist);
        store.down().unwrap();
    }

    #[test]
    fn test_reset_empties_tables() {
        let mut store = store();
        store.up().unwrap();
        store
            .connection()
            .execute("INSERT INTO doc_table (name) VALUES ('user')", [])
            .unwrap();
        assert_eq!(store.status().unwrap().table_count, 1);

        store.reset().unwrap();
        let status = store.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.table_count, 0);
    }

    #[test]
    fn test_open_fresh_discards_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/doc.db");

        let mut first = DocumentationStore::open_fresh(&path, "doc_").unwrap();
        first.up().unwrap();
        first
            .connection()
            .execute("INSERT INTO doc_tag (tag) VALUES ('auth')", [])
            .unwrap();
        drop(first);

        let second = DocumentationStore::open_fresh(&path, "doc_").unwrap();
        assert!(!second.status().unwrap().tables_exist);
    }

    #[test]
    fn test_open_fresh_rejects_bad_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentationStore::open_fresh(dir.path().join("doc.db"), "a-b").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Persistence(SqliteError::InvalidPrefix(_))
        ));
    }
}
