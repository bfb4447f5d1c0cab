use crate::error::{RegistryError, ToolError};
use crate::registry::Registry;
use crate::store::{self, SqliteRegistryStore};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::json;
use std::sync::Arc;

fn new_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    store::migrate(&conn).unwrap();
    conn
}

fn insert_tool(
    conn: &Connection,
    name: &str,
    handler_type: &str,
    mode: &str,
    handler_config: serde_json::Value,
    input_schema: serde_json::Value,
) {
    conn.execute(
        "INSERT INTO dynamic_tools
            (tool_name, tool_category, description, input_schema, handler_type,
             handler_config, mode, is_active, version, created_at, updated_at)
         VALUES (?1, 'test', '', ?2, ?3, ?4, ?5, 1, 1, 0, 0)",
        params![
            name,
            input_schema.to_string(),
            handler_type,
            handler_config.to_string(),
            mode,
        ],
    )
    .unwrap();
}

fn new_registry(conn: Arc<Mutex<Connection>>) -> Registry {
    let store: Arc<dyn store::RegistryStore> = Arc::new(SqliteRegistryStore::new(conn.clone()));
    Registry::new(store, conn)
}

#[test]
fn load_then_execute_readonly_sql_query() {
    let conn = new_conn();
    conn.execute("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)", []).unwrap();
    conn.execute("INSERT INTO widgets (id, name) VALUES (1, 'sprocket')", []).unwrap();
    insert_tool(
        &conn,
        "get_widget",
        "sql_query",
        "readonly",
        json!({"sql": "SELECT * FROM widgets WHERE id = {{id}}"}),
        json!({"required": ["id"]}),
    );

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let outcome = registry.execute("get_widget", "*", json!({"id": 1})).unwrap();
    let row = outcome.unwrap();
    assert_eq!(row["name"], "sprocket");
}

#[test]
fn readonly_mode_rejects_sql_script_tool() {
    let conn = new_conn();
    insert_tool(&conn, "bad", "sql_script", "readonly", json!({"script": "DELETE FROM x"}), json!({}));

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let err = registry.execute("bad", "*", json!({})).unwrap_err();
    assert!(matches!(err, RegistryError::ReadonlyScriptRejected(_)));
}

#[test]
fn readonly_sql_query_must_be_statically_non_mutating() {
    let conn = new_conn();
    insert_tool(&conn, "sneaky", "sql_query", "readonly", json!({"sql": "DELETE FROM widgets"}), json!({}));

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let err = registry.execute("sneaky", "*", json!({})).unwrap_err();
    assert!(matches!(err, RegistryError::ReadonlyNonSelect(_)));
}

#[test]
fn missing_required_parameter_is_a_protocol_error() {
    let conn = new_conn();
    insert_tool(
        &conn,
        "get_widget",
        "sql_query",
        "readonly",
        json!({"sql": "SELECT 1"}),
        json!({"required": ["id"]}),
    );

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let err = registry.execute("get_widget", "*", json!({})).unwrap_err();
    assert!(matches!(err, RegistryError::MissingParameter(p) if p == "id"));
}

#[test]
fn unknown_tool_is_a_protocol_error() {
    let conn = new_conn();
    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let err = registry.execute("does_not_exist", "*", json!({})).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownTool(_)));
}

#[test]
fn policy_denial_is_a_tool_error_not_a_protocol_error() {
    let conn = new_conn();
    insert_tool(&conn, "secret", "sql_query", "readonly", json!({"sql": "SELECT 1"}), json!({}));
    conn.execute(
        "INSERT INTO tool_policy (tool_name, role, effect) VALUES ('secret', '*', 'deny')",
        [],
    )
    .unwrap();

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let outcome = registry.execute("secret", "guest", json!({})).unwrap();
    assert!(matches!(outcome.unwrap_err(), ToolError::PolicyDenied { .. }));
}

#[test]
fn sql_script_runs_transactionally_and_reports_affected_rows() {
    let conn = new_conn();
    conn.execute("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)", []).unwrap();
    insert_tool(
        &conn,
        "seed",
        "sql_script",
        "readwrite",
        json!({"script": "INSERT INTO widgets (id, name) VALUES (1, 'a'), (2, 'b')", "return_affected_rows": true}),
        json!({}),
    );

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();

    let outcome = registry.execute("seed", "*", json!({})).unwrap();
    let result = outcome.unwrap();
    assert_eq!(result["affected_rows"], 2);
}

#[test]
fn native_function_dispatch() {
    let conn = new_conn();
    insert_tool(&conn, "double", "native_function", "readwrite", json!({}), json!({"required": ["n"]}));

    let registry = new_registry(Arc::new(Mutex::new(conn)));
    registry.load_tools().unwrap();
    registry.register_native_function(
        "double",
        Arc::new(|params| {
            let n = params["n"].as_i64().ok_or("n must be an integer")?;
            Ok(json!({ "result": n * 2 }))
        }),
    );

    let outcome = registry.execute("double", "*", json!({"n": 21})).unwrap();
    assert_eq!(outcome.unwrap()["result"], 42);
}

#[test]
fn update_increments_version_and_appends_history() {
    let conn = new_conn();
    insert_tool(&conn, "t", "sql_query", "readonly", json!({"sql": "SELECT 1"}), json!({}));

    conn.execute("UPDATE dynamic_tools SET description = 'v2' WHERE tool_name = 't'", []).unwrap();

    let version: i64 = conn
        .query_row("SELECT version FROM dynamic_tools WHERE tool_name = 't'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, 2);

    let history_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM dynamic_tools_history WHERE tool_name = 't'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(history_count, 2); // one on insert, one on update
}
