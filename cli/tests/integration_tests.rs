use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn dal_doc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dal-doc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dal-doc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Source database with `user` and `session` tables.
fn write_source_db(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("app.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE user (id INTEGER PRIMARY KEY, login TEXT, password TEXT);
         CREATE TABLE session (token TEXT PRIMARY KEY, user_id INTEGER);",
    )
    .unwrap();
    path
}

fn write_definitions(dir: &TempDir) {
    write(
        dir.path(),
        "defs/requests/user/by_id.yml",
        r#"
description: Fetch a user
type: select
sql: "SELECT {fields:user} FROM user WHERE id = :id"
tags: [user]
entities:
  user: [read]
fields:
  selected: ["user.*"]
  condition: [user.id]
"#,
    );
    write(
        dir.path(),
        "defs/requests/session/open.yml",
        r#"
type: insert
sql: "INSERT INTO session ({fields:session}) VALUES (:token, :user)"
fields:
  inserted: ["session.*"]
"#,
    );
    write(
        dir.path(),
        "defs/procedures/auth/login.yml",
        r#"
description: Authenticate
requests: [user/by_id, session/open]
mandatory_input_fields:
  - { name: user.login, always: true }
output_fields:
  - { name: session.token }
"#,
    );
}

fn write_config(dir: &TempDir) -> PathBuf {
    write(
        dir.path(),
        "doc.yml",
        "source:\n  sqlite: app.db\nrequests: defs/requests\nprocedures: defs/procedures\nstore: out/doc.db\nsnapshot_dir: out/schema\n",
    )
}

fn build_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_source_db(&dir);
    write_definitions(&dir);
    let config = write_config(&dir);

    let output = dal_doc(&["build", "--config", path_str(&config)]);
    assert!(output.status.success(), "build failed: {}", stderr(&output));
    dir
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

#[test]
fn build_from_config_writes_store_and_snapshot() {
    let dir = build_fixture();

    assert!(dir.path().join("out/doc.db").exists());
    assert!(dir.path().join("out/schema/schema.json").exists());
    assert!(dir.path().join("out/schema/schema.yml").exists());
}

#[test]
fn build_prints_counts() {
    let dir = TempDir::new().unwrap();
    write_source_db(&dir);
    write_definitions(&dir);
    let config = write_config(&dir);

    let output = dal_doc(&["build", "--config", path_str(&config)]);
    assert!(output.status.success(), "build failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Build complete"), "stdout: {out}");
    assert!(out.contains("Requests: 2"), "stdout: {out}");
    assert!(out.contains("Procedures: 1"), "stdout: {out}");
    assert!(out.contains("Fields: 5"), "stdout: {out}");
}

#[test]
fn build_overrides_complete_missing_config() {
    let dir = TempDir::new().unwrap();
    let db = write_source_db(&dir);
    write_definitions(&dir);
    let config = write(
        dir.path(),
        "partial.yml",
        "requests: defs/requests\nprocedures: defs/procedures\n",
    );
    let store = dir.path().join("custom/doc.db");
    let snapshots = dir.path().join("custom/schema");

    let output = dal_doc(&[
        "build",
        "--config",
        path_str(&config),
        "--source-db",
        path_str(&db),
        "--store",
        path_str(&store),
        "--snapshot-dir",
        path_str(&snapshots),
    ]);
    assert!(output.status.success(), "build failed: {}", stderr(&output));
    assert!(store.exists());
    assert!(snapshots.join("schema.yml").exists());
}

#[test]
fn build_lists_every_missing_parameter() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "doc.yml", "prefix: doc_\n");

    let output = dal_doc(&["build", "--config", path_str(&config)]);
    assert!(!output.status.success());

    let err = stderr(&output);
    assert!(err.starts_with("error: invalid configuration"), "stderr: {err}");
    for parameter in ["source", "requests", "procedures", "store", "snapshot_dir"] {
        assert!(err.contains(parameter), "missing {parameter} in: {err}");
    }
}

#[test]
fn build_with_unknown_field_fails_without_output() {
    let dir = TempDir::new().unwrap();
    write_source_db(&dir);
    write_definitions(&dir);
    write(
        dir.path(),
        "defs/requests/audit/list.yml",
        "type: select\nsql: SELECT * FROM audit\nfields:\n  selected: [audit.id]\n",
    );
    let config = write_config(&dir);

    let output = dal_doc(&["build", "--config", path_str(&config)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("audit"), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("out/doc.db").exists());
    assert!(!dir.path().join("out/schema").exists());
}

#[test]
fn build_from_snapshot_matches_sqlite_source() {
    let dir = build_fixture();
    let snapshot = dir.path().join("out/schema/schema.json");
    let store = dir.path().join("again/doc.db");

    let output = dal_doc(&[
        "build",
        "--schema",
        path_str(&snapshot),
        "--requests",
        path_str(&dir.path().join("defs/requests")),
        "--procedures",
        path_str(&dir.path().join("defs/procedures")),
        "--store",
        path_str(&store),
        "--snapshot-dir",
        path_str(&dir.path().join("again/schema")),
    ]);
    assert!(output.status.success(), "build failed: {}", stderr(&output));

    let first = dal_doc(&["dump", "--store", path_str(&dir.path().join("out/doc.db"))]);
    let second = dal_doc(&["dump", "--store", path_str(&store)]);
    assert!(first.status.success());
    assert_eq!(stdout(&first), stdout(&second));
}

// ---------------------------------------------------------------------------
// check / snapshot
// ---------------------------------------------------------------------------

#[test]
fn check_does_not_need_store_locations() {
    let dir = TempDir::new().unwrap();
    let db = write_source_db(&dir);
    write_definitions(&dir);

    let output = dal_doc(&[
        "check",
        "--source-db",
        path_str(&db),
        "--requests",
        path_str(&dir.path().join("defs/requests")),
        "--procedures",
        path_str(&dir.path().join("defs/procedures")),
    ]);
    assert!(output.status.success(), "check failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("2 requests and 1 procedures"), "stdout: {out}");
    assert!(out.contains("2 tables (5 fields)"), "stdout: {out}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn check_reports_missing_source() {
    let dir = TempDir::new().unwrap();
    write_definitions(&dir);

    let output = dal_doc(&[
        "check",
        "--requests",
        path_str(&dir.path().join("defs/requests")),
        "--procedures",
        path_str(&dir.path().join("defs/procedures")),
    ]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("missing required parameter: source"), "stderr: {err}");
    assert!(!err.contains("store"), "stderr: {err}");
}

#[test]
fn snapshot_writes_both_formats() {
    let dir = TempDir::new().unwrap();
    let db = write_source_db(&dir);
    let out_dir = dir.path().join("snap");

    let output = dal_doc(&[
        "snapshot",
        "--source-db",
        path_str(&db),
        "--output",
        path_str(&out_dir),
    ]);
    assert!(output.status.success(), "snapshot failed: {}", stderr(&output));
    assert!(stdout(&output).contains("2 tables"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("schema.json")).unwrap()).unwrap();
    assert_eq!(json["user"], serde_json::json!(["id", "login", "password"]));
    assert!(out_dir.join("schema.yml").exists());
}

#[test]
fn snapshot_of_missing_database_fails() {
    let dir = TempDir::new().unwrap();
    let output = dal_doc(&[
        "snapshot",
        "--source-db",
        path_str(&dir.path().join("missing.db")),
        "--output",
        path_str(&dir.path().join("snap")),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot connect"));
}

// ---------------------------------------------------------------------------
// status / usage / dump
// ---------------------------------------------------------------------------

#[test]
fn status_reports_row_counts() {
    let dir = build_fixture();
    let store = dir.path().join("out/doc.db");

    let output = dal_doc(&["status", "--store", path_str(&store)]);
    assert!(output.status.success(), "status failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Tables exist: yes"), "stdout: {out}");
    assert!(out.contains("Request count: 2"), "stdout: {out}");

    let output = dal_doc(&["status", "--store", path_str(&store), "--format", "json"]);
    let status: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(status["procedure_count"], 1);
    assert_eq!(status["field_count"], 5);
}

#[test]
fn status_with_other_prefix_sees_no_tables() {
    let dir = build_fixture();
    let store = dir.path().join("out/doc.db");

    let output = dal_doc(&["status", "--store", path_str(&store), "--prefix", "api_"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Tables exist: no"));
}

#[test]
fn status_of_missing_store_fails() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("nope.db");

    let output = dal_doc(&["status", "--store", path_str(&store)]);
    assert!(!output.status.success());
    assert!(!store.exists());
}

#[test]
fn usage_lists_entry_points_of_a_field() {
    let dir = build_fixture();
    let store = dir.path().join("out/doc.db");

    let output = dal_doc(&["usage", "--store", path_str(&store), "--field", "user.login"]);
    assert!(output.status.success(), "usage failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("request user/by_id (selected)"), "stdout: {out}");
    assert!(out.contains("procedure auth/login (mandatory input)"), "stdout: {out}");
}

#[test]
fn usage_of_entity_as_json() {
    let dir = build_fixture();
    let store = dir.path().join("out/doc.db");

    let output = dal_doc(&[
        "usage",
        "--store",
        path_str(&store),
        "--entity",
        "user",
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "usage failed: {}", stderr(&output));
    let usage: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(usage[0]["entry_point"], "user/by_id");
    assert_eq!(usage[0]["action"], "read");
    assert_eq!(usage[0]["kind"], "request");
}

#[test]
fn dump_lists_rows_by_table() {
    let dir = build_fixture();
    let store = dir.path().join("out/doc.db");

    let output = dal_doc(&["dump", "--store", path_str(&store)]);
    assert!(output.status.success(), "dump failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[request]"), "stdout: {out}");
    assert!(out.contains("user/by_id"), "stdout: {out}");
}
