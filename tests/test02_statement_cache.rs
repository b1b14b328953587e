use sql_shuttle::prelude::*;

#[test]
fn cache_keys_are_trimmed_and_nothing_else() {
    let mut runtime = WorkerRuntime::new(ExtensionRegistry::new(), None);
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("start");

    let first = runtime
        .execute(DbRequest::Prepare {
            sql: " SELECT 1 ".into(),
        })
        .expect("prepare");
    let second = runtime
        .execute(DbRequest::Prepare {
            sql: "SELECT 1".into(),
        })
        .expect("prepare");
    // Leading/trailing whitespace shares one cache entry.
    assert_eq!(first, QueryValue::Key("SELECT 1".into()));
    assert_eq!(second, QueryValue::Key("SELECT 1".into()));

    // The trimmed key satisfies a cached-only lookup.
    runtime
        .execute(DbRequest::Get {
            sql: "SELECT 1".into(),
            params: vec![],
            cached_only: true,
        })
        .expect("cached get");

    // Internal whitespace is a different key entirely.
    let err = runtime
        .execute(DbRequest::Get {
            sql: "SELECT  1".into(),
            params: vec![],
            cached_only: true,
        })
        .unwrap_err();
    assert!(
        matches!(err, ShuttleDbError::MissingStatement(ref key) if key == "SELECT  1"),
        "got {err:?}"
    );
}

#[test]
fn cached_only_requires_a_prior_prepare() {
    let mut runtime = WorkerRuntime::new(ExtensionRegistry::new(), None);
    runtime
        .execute(DbRequest::Start {
            options: StartOptions::in_memory(),
        })
        .expect("start");
    runtime
        .execute(DbRequest::Exec {
            sql: "CREATE TABLE t (id INTEGER PRIMARY KEY)".into(),
        })
        .expect("create");

    let err = runtime
        .execute(DbRequest::Run {
            sql: "INSERT INTO t (id) VALUES (?)".into(),
            params: vec![RowValues::Int(1)],
            cached_only: true,
        })
        .unwrap_err();
    assert!(matches!(err, ShuttleDbError::MissingStatement(_)));

    // Exec bypasses the cache on purpose, so raw SQL never seeds it.
    runtime
        .execute(DbRequest::Exec {
            sql: "INSERT INTO t (id) VALUES (7)".into(),
        })
        .expect("exec");
    let err = runtime
        .execute(DbRequest::Run {
            sql: "INSERT INTO t (id) VALUES (7)".into(),
            params: vec![],
            cached_only: true,
        })
        .unwrap_err();
    assert!(matches!(err, ShuttleDbError::MissingStatement(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn statement_handle_round_trips_through_the_worker()
-> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(StartOptions::in_memory(), ExtensionRegistry::new(), None)?;
    manager
        .exec("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
        .await?;

    let insert = manager
        .prepare(" INSERT INTO t (id, val) VALUES (?, ?) ")
        .await?;
    // The handle is just the trimmed SQL text.
    assert_eq!(insert.sql(), "INSERT INTO t (id, val) VALUES (?, ?)");
    assert_eq!(insert.to_string(), insert.sql());
    assert_eq!(
        serde_json::to_string(&insert)?,
        "\"INSERT INTO t (id, val) VALUES (?, ?)\""
    );

    let result = insert
        .run(&[RowValues::Int(1), RowValues::Text("a".into())])
        .await?;
    assert_eq!(result.changes, 1);

    let select = manager.prepare("SELECT val FROM t WHERE id = ?").await?;
    let row = select.get(&[RowValues::Int(1)]).await?.expect("row");
    assert_eq!(row.get("val").unwrap().as_text(), Some("a"));

    let rows = select.all(&[RowValues::Int(1)]).await?;
    assert_eq!(rows.len(), 1);
    Ok(())
}
