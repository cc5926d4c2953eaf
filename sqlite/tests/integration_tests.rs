//! Integration tests for the dal-doc-sqlite crate.

use std::fs;
use std::path::Path;

use dal_doc_core::{
    Describe, FieldRole, Manifest, ProcedureDescription, RawSchema, RequestDescription,
    RequestType,
};
use dal_doc_db::{
    BuildConfig, ConfigurationError, ResolvedConfig, SchemaInput, SchemaSource, SnapshotSource,
};
use dal_doc_sqlite::{
    BuildError, BuildInputs, DocumentationBuilder, JOIN_TABLES, StoreQuery, SqliteSource,
};
use rusqlite::Connection;

fn user_schema() -> RawSchema {
    let mut raw = RawSchema::new();
    raw.insert_table("user", ["id", "login", "password"]);
    raw.insert_table("session", ["token", "user_id"]);
    raw
}

fn requests() -> Manifest {
    let mut manifest = Manifest::new("requests");
    manifest
        .register_fn("user/all", |_| {
            RequestDescription::new(RequestType::Select)
                .with_sql("SELECT * FROM user")
                .with_table("user")
                .with_selected_field("user.*")
                .with_tag("user")
                .with_entity_action("user", "list")
                .into()
        })
        .register_fn("user/by_id", |_| {
            RequestDescription::new(RequestType::Select)
                .with_sql("SELECT login FROM user WHERE id = :id")
                .with_selected_field("user.login")
                .with_condition_field("user.id")
                .with_tag("user")
                .into()
        })
        .register_fn("session/open", |_| {
            RequestDescription::new(RequestType::Insert)
                .with_sql_variant("sqlite", "INSERT INTO session VALUES (:token, :user)")
                .with_sql_variant("pgsql", "INSERT INTO session VALUES ($1, $2)")
                .with_inserted_field("session.*")
                .with_parameter("token_length", Some("bytes of entropy"))
                .with_entity_action("session", "create")
                .into()
        });
    manifest
}

fn procedures() -> Manifest {
    let mut manifest = Manifest::new("procedures");
    manifest.register_fn("auth/login", |_| {
        ProcedureDescription::new()
            .with_request("user/by_id")
            .with_request("session/open")
            .with_mandatory_input_field("user.id", None, true)
            .with_optional_input_field("user.login", Some("shown in audit log"))
            .with_mandatory_input_param("password", None, false)
            .with_output_field("session.token", None)
            .with_output_data_value("expires_at", Some("unix time"))
            .with_tag("auth")
            .with_entity_action("session", "create")
            .into()
    });
    manifest
}

fn build(dir: &Path, raw: &RawSchema, requests: &Manifest, procedures: &Manifest) {
    DocumentationBuilder::new("doc_")
        .unwrap()
        .build(
            BuildInputs {
                source: raw,
                requests,
                procedures,
            },
            &dir.join("doc.db"),
            &dir.join("schema"),
        )
        .unwrap();
}

fn open(dir: &Path) -> Connection {
    Connection::open(dir.join("doc.db")).unwrap()
}

#[test]
fn test_wildcard_selection_rows() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let query = StoreQuery::new(&conn, "doc_").unwrap();
    assert_eq!(
        query.request_fields("user/all", FieldRole::Selected).unwrap(),
        ["user.id", "user.login", "user.password"]
    );
    assert_eq!(
        query.request_fields("session/open", FieldRole::Inserted).unwrap(),
        ["session.token", "session.user_id"]
    );
}

#[test]
fn test_mandatory_levels() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let query = StoreQuery::new(&conn, "doc_").unwrap();
    assert_eq!(
        query.procedure_input_fields("auth/login").unwrap(),
        [("user.id".to_string(), 2), ("user.login".to_string(), 0)]
    );
    assert_eq!(
        query.procedure_input_params("auth/login").unwrap(),
        [("password".to_string(), 1)]
    );
    assert_eq!(
        query.procedure_requests("auth/login").unwrap(),
        ["user/by_id", "session/open"]
    );
}

#[test]
fn test_shared_field_has_one_row() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM doc_field WHERE name = 'user.id'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);

    let query = StoreQuery::new(&conn, "doc_").unwrap();
    let usage: Vec<_> = query
        .field_usage("user.id")
        .unwrap()
        .into_iter()
        .map(|u| (u.entry_point, u.role))
        .collect();
    assert_eq!(
        usage,
        [
            ("user/all".to_string(), FieldRole::Selected),
            ("user/by_id".to_string(), FieldRole::Condition),
            ("auth/login".to_string(), FieldRole::MandatoryInput),
        ]
    );
}

#[test]
fn test_shared_elements_are_written_once() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let count = |sql: &str| -> i64 { conn.query_row(sql, [], |row| row.get(0)).unwrap() };
    assert_eq!(count("SELECT COUNT(*) FROM doc_tag"), 2);
    assert_eq!(count("SELECT COUNT(*) FROM doc_entity"), 2);
    assert_eq!(count("SELECT COUNT(*) FROM doc_action"), 2);
    assert_eq!(count("SELECT COUNT(*) FROM doc_table"), 2);
    assert_eq!(count("SELECT COUNT(*) FROM doc_field"), 5);

    let query = StoreQuery::new(&conn, "doc_").unwrap();
    let usage = query.entity_usage("session").unwrap();
    let names: Vec<_> = usage.iter().map(|u| u.entry_point.as_str()).collect();
    assert_eq!(names, ["session/open", "auth/login"]);
}

#[test]
fn test_referential_completeness() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let query = StoreQuery::new(&conn, "doc_").unwrap();
    assert_eq!(query.foreign_key_violations().unwrap(), 0);

    // Every join table's rows resolve to named parents in the dump.
    let dump = query.dump().unwrap();
    let linked: usize = JOIN_TABLES.iter().map(|t| dump[*t].len()).sum();
    let raw_rows: usize = JOIN_TABLES
        .iter()
        .map(|t| {
            conn.query_row(&format!("SELECT COUNT(*) FROM doc_{t}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap() as usize
        })
        .sum();
    assert_eq!(linked, raw_rows);
    assert!(linked > 0);
}

#[test]
fn test_rebuild_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let raw = user_schema();
    let (requests, procedures) = (requests(), procedures());

    build(dir.path(), &raw, &requests, &procedures);
    let first = {
        let conn = open(dir.path());
        StoreQuery::new(&conn, "doc_").unwrap().dump().unwrap()
    };

    build(dir.path(), &raw, &requests, &procedures);
    let second = {
        let conn = open(dir.path());
        StoreQuery::new(&conn, "doc_").unwrap().dump().unwrap()
    };

    assert_eq!(first, second);
    assert_eq!(first["request"].len(), 3);
}

#[test]
fn test_multi_variant_sql_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let conn = open(dir.path());
    let (sql, multi): (String, bool) = conn
        .query_row(
            "SELECT sql, multi_sql FROM doc_request WHERE name = 'session/open'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(multi);
    let variants: serde_json::Value = serde_json::from_str(&sql).unwrap();
    assert_eq!(variants["pgsql"], "INSERT INTO session VALUES ($1, $2)");
}

#[test]
fn test_unknown_table_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut requests = requests();
    requests.register_fn("orders/get", |_| {
        RequestDescription::new(RequestType::Select)
            .with_selected_field("orders.id")
            .into()
    });

    let err = DocumentationBuilder::new("doc_")
        .unwrap()
        .build(
            BuildInputs {
                source: &user_schema(),
                requests: &requests,
                procedures: &procedures(),
            },
            &dir.path().join("doc.db"),
            &dir.path().join("schema"),
        )
        .unwrap_err();

    assert!(err.to_string().contains("table orders does not exist"));
    assert!(!dir.path().join("doc.db").exists());
    assert!(!dir.path().join("schema").exists());
}

#[test]
fn test_unknown_procedure_request_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut procedures = Manifest::new("procedures");
    procedures.register_fn("auth/logout", |_| {
        ProcedureDescription::new()
            .with_request("session/close")
            .into()
    });

    let err = DocumentationBuilder::new("doc_")
        .unwrap()
        .build(
            BuildInputs {
                source: &user_schema(),
                requests: &requests(),
                procedures: &procedures,
            },
            &dir.path().join("doc.db"),
            &dir.path().join("schema"),
        )
        .unwrap_err();

    match err {
        BuildError::ReferentialIntegrity { owner, kind, name } => {
            assert_eq!(owner, "procedure auth/logout");
            assert_eq!(kind, "request");
            assert_eq!(name, "session/close");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Rows written before the failure stay; no snapshot is emitted.
    let conn = open(dir.path());
    let requests: i64 = conn
        .query_row("SELECT COUNT(*) FROM doc_request", [], |row| row.get(0))
        .unwrap();
    assert_eq!(requests, 3);
    assert!(!dir.path().join("schema").exists());
}

#[test]
fn test_snapshot_feeds_next_build() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), &user_schema(), &requests(), &procedures());

    let snapshot = SnapshotSource::new(dir.path().join("schema/schema.yml"));
    assert_eq!(snapshot.extract_schema().unwrap(), user_schema());

    let first = {
        let conn = open(dir.path());
        StoreQuery::new(&conn, "doc_").unwrap().dump().unwrap()
    };

    let second_dir = tempfile::tempdir().unwrap();
    DocumentationBuilder::new("doc_")
        .unwrap()
        .build(
            BuildInputs {
                source: &snapshot,
                requests: &requests(),
                procedures: &procedures(),
            },
            &second_dir.path().join("doc.db"),
            &second_dir.path().join("schema"),
        )
        .unwrap();
    let second = {
        let conn = open(second_dir.path());
        StoreQuery::new(&conn, "doc_").unwrap().dump().unwrap()
    };
    assert_eq!(first, second);
}

#[test]
fn test_build_from_sqlite_and_definition_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let app = root.join("app.db");
    Connection::open(&app)
        .unwrap()
        .execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY, login TEXT NOT NULL, password TEXT);
             CREATE TABLE session (token TEXT PRIMARY KEY, user_id INTEGER REFERENCES user(id));",
        )
        .unwrap();

    fs::create_dir_all(root.join("requests/user")).unwrap();
    fs::create_dir_all(root.join("procedures/auth")).unwrap();
    fs::write(
        root.join("requests/user/by_login.yml"),
        r#"
description: Find a user by login
type: select
sql: "SELECT {fields:user} FROM user WHERE login = :login"
tables: [user]
tags: [user]
entities:
  user: [select]
fields:
  selected: ["user.*"]
  condition: [user.login]
"#,
    )
    .unwrap();
    fs::write(
        root.join("procedures/auth/login.yaml"),
        r#"
description: Authenticate a user
requests: [user/by_login]
mandatory_input_fields:
  - { name: user.login, always: true }
  - { name: user.password }
output_fields:
  - { name: user.id }
output_values:
  - { name: token, description: session token }
"#,
    )
    .unwrap();

    let config = ResolvedConfig {
        source: SchemaInput::Sqlite(app.clone()),
        requests: root.join("requests"),
        procedures: root.join("procedures"),
        store: root.join("out/doc.db"),
        snapshot_dir: root.join("out/schema"),
        prefix: "doc_".to_string(),
    };
    let report = DocumentationBuilder::run(&config).unwrap();
    assert_eq!(report.counts.requests, 1);
    assert_eq!(report.counts.procedures, 1);
    assert_eq!(report.counts.fields, 5);
    assert!(report.snapshot.json.exists());

    let conn = Connection::open(&report.store).unwrap();
    let query = StoreQuery::new(&conn, "doc_").unwrap();
    assert_eq!(
        query.request_fields("user/by_login", FieldRole::Selected).unwrap(),
        ["user.id", "user.login", "user.password"]
    );
    assert_eq!(
        query.procedure_input_fields("auth/login").unwrap(),
        [("user.login".to_string(), 2), ("user.password".to_string(), 1)]
    );
    let sql: String = conn
        .query_row(
            "SELECT sql FROM doc_request WHERE name = 'user/by_login'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(
        sql,
        "SELECT user.id, user.login, user.password FROM user WHERE login = :login"
    );

    assert_eq!(
        SqliteSource::new(&app).extract_schema().unwrap(),
        SnapshotSource::new(&report.snapshot.json).extract_schema().unwrap()
    );
}

#[test]
fn test_missing_configuration_is_listed() {
    let err = DocumentationBuilder::run_config(BuildConfig::default()).unwrap_err();
    match err {
        BuildError::Configuration(problems) => {
            assert!(problems.contains(&ConfigurationError::MissingParameter("requests")));
            assert!(problems.contains(&ConfigurationError::MissingParameter("store")));
            assert!(problems.len() >= 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unreachable_source_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteSource::new(dir.path().join("missing.db"));
    let err = DocumentationBuilder::new("doc_")
        .unwrap()
        .build(
            BuildInputs {
                source: &source,
                requests: &requests(),
                procedures: &procedures(),
            },
            &dir.path().join("doc.db"),
            &dir.path().join("schema"),
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Connection(_)));
}

#[test]
fn test_store_cannot_overwrite_source_database() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let app = root.join("app.db");
    let conn = Connection::open(&app).unwrap();
    conn.execute_batch(
        "CREATE TABLE user (id INTEGER PRIMARY KEY, login TEXT);
         INSERT INTO user (login) VALUES ('alice');",
    )
    .unwrap();
    drop(conn);
    fs::create_dir_all(root.join("requests")).unwrap();
    fs::create_dir_all(root.join("procedures")).unwrap();

    let config = ResolvedConfig {
        source: SchemaInput::Sqlite(app.clone()),
        requests: root.join("requests"),
        procedures: root.join("procedures"),
        store: root.join(".").join("app.db"),
        snapshot_dir: root.join("schema"),
        prefix: "doc_".to_string(),
    };
    let err = DocumentationBuilder::run(&config).unwrap_err();
    assert!(matches!(
        &err,
        BuildError::Configuration(problems)
            if problems == &[ConfigurationError::Conflict("source.sqlite", "store")]
    ));

    let err = DocumentationBuilder::run_config(BuildConfig {
        source: dal_doc_db::SourceConfig {
            sqlite: Some(app.clone()),
            snapshot: None,
        },
        requests: Some(root.join("requests")),
        procedures: Some(root.join("procedures")),
        store: Some(app.clone()),
        snapshot_dir: Some(root.join("schema")),
        prefix: None,
    })
    .unwrap_err();
    assert!(matches!(err, BuildError::Configuration(_)));

    let rows: i64 = Connection::open(&app)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM user", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    assert!(!root.join("schema").exists());
}
