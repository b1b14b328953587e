use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sql_shuttle::prelude::*;

fn memory_runtime() -> WorkerRuntime {
    let mut runtime = WorkerRuntime::new(ExtensionRegistry::new(), None);
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("start");
    runtime
}

#[test]
fn setup_is_idempotent() {
    let mut runtime = memory_runtime();
    runtime
        .execute(DbRequest::Exec {
            sql: "CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)".into(),
        })
        .expect("create");
    runtime
        .execute(DbRequest::Run {
            sql: "INSERT INTO t (id, val) VALUES (?, ?)".into(),
            params: vec![RowValues::Int(1), RowValues::Text("seed".into())],
            cached_only: false,
        })
        .expect("insert");

    // A second Start must not reopen the connection: an in-memory database
    // would lose its tables if it did.
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("second start");

    let value = runtime
        .execute(DbRequest::Get {
            sql: "SELECT val FROM t WHERE id = ?".into(),
            params: vec![RowValues::Int(1)],
            cached_only: false,
        })
        .expect("get");
    let QueryValue::Row(row) = value else {
        panic!("expected a row, got {value:?}");
    };
    assert_eq!(row.get("val").unwrap().as_text(), Some("seed"));
}

#[test]
fn run_reports_change_metadata() {
    let mut runtime = memory_runtime();
    runtime
        .execute(DbRequest::Exec {
            sql: "CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)".into(),
        })
        .expect("create");

    let value = runtime
        .execute(DbRequest::Run {
            sql: "INSERT INTO t (val) VALUES (?)".into(),
            params: vec![RowValues::Text("a".into())],
            cached_only: false,
        })
        .expect("insert");
    assert_eq!(
        value,
        QueryValue::Run(RunResult {
            changes: 1,
            last_insert_rowid: 1,
        })
    );

    let value = runtime
        .execute(DbRequest::All {
            sql: "SELECT id, val FROM t".into(),
            params: vec![],
            cached_only: false,
        })
        .expect("all");
    let QueryValue::Rows(rows) = value else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 1);
}

#[test]
fn get_returns_none_for_missing_row() {
    let mut runtime = memory_runtime();
    runtime
        .execute(DbRequest::Exec {
            sql: "CREATE TABLE t (id INTEGER PRIMARY KEY)".into(),
        })
        .expect("create");
    let value = runtime
        .execute(DbRequest::Get {
            sql: "SELECT id FROM t WHERE id = ?".into(),
            params: vec![RowValues::Int(42)],
            cached_only: false,
        })
        .expect("get");
    assert_eq!(value, QueryValue::None);
}

#[test]
fn one_failing_query_does_not_poison_the_worker() {
    let mut runtime = memory_runtime();
    let err = runtime
        .execute(DbRequest::Exec {
            sql: "NOT VALID SQL".into(),
        })
        .unwrap_err();
    assert!(matches!(err, ShuttleDbError::SqliteError(_)));

    // The same runtime keeps servicing unrelated requests.
    runtime
        .execute(DbRequest::Exec {
            sql: "CREATE TABLE t (id INTEGER PRIMARY KEY)".into(),
        })
        .expect("create after failure");
    let value = runtime
        .execute(DbRequest::All {
            sql: "SELECT id FROM t".into(),
            params: vec![],
            cached_only: false,
        })
        .expect("all after failure");
    assert_eq!(value, QueryValue::Rows(ResultSet::default()));
}

#[test]
fn error_handler_may_substitute_a_result() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_handler = Arc::clone(&seen);
    let handler: sql_shuttle::worker::ErrorHandler = Arc::new(move |_err, _request| {
        seen_in_handler.fetch_add(1, Ordering::Relaxed);
        Some(QueryValue::None)
    });
    let mut runtime = WorkerRuntime::new(ExtensionRegistry::new(), Some(handler));
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("start");

    let value = runtime
        .execute(DbRequest::Exec {
            sql: "NOT VALID SQL".into(),
        })
        .expect("handler suppressed the error");
    assert_eq!(value, QueryValue::None);
    assert_eq!(seen.load(Ordering::Relaxed), 1);
}

#[test]
fn error_handler_misses_still_propagate() {
    let handler: sql_shuttle::worker::ErrorHandler = Arc::new(|_err, _request| None);
    let mut runtime = WorkerRuntime::new(ExtensionRegistry::new(), Some(handler));
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("start");

    let err = runtime
        .execute(DbRequest::Exec {
            sql: "NOT VALID SQL".into(),
        })
        .unwrap_err();
    assert!(matches!(err, ShuttleDbError::SqliteError(_)));
}
