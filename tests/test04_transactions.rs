use sql_shuttle::prelude::*;

fn ledger_extension() -> Extension {
    Extension::new()
        .on_start(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ledger (
                     id INTEGER PRIMARY KEY,
                     account TEXT NOT NULL,
                     amount INTEGER NOT NULL
                 );
                 INSERT INTO ledger (account, amount) VALUES ('boot', 0);",
            )?;
            Ok(())
        })
        .with_statement(
            "ledger_total",
            "SELECT COALESCE(SUM(amount), 0) AS total FROM ledger",
        )
        .with_function("negate", |args| {
            let value = args
                .first()
                .and_then(RowValues::as_int)
                .copied()
                .unwrap_or(0);
            Ok(RowValues::Int(-value))
        })
        .with_transaction("post_pair", |env, params| {
            let account = params
                .first()
                .and_then(RowValues::as_text)
                .unwrap_or("unknown")
                .to_owned();
            env.run(
                "INSERT INTO ledger (account, amount) VALUES (?, ?)",
                &[RowValues::Text(account.clone()), RowValues::Int(10)],
            )?;
            env.run(
                "INSERT INTO ledger (account, amount) VALUES (?, ?)",
                &[RowValues::Text(account), RowValues::Int(-10)],
            )?;
            let row = env
                .get("SELECT COUNT(*) AS cnt FROM ledger", &[])?
                .expect("count row");
            Ok(QueryValue::Row(row))
        })
        .with_transaction("post_then_fail", |env, _params| {
            env.run(
                "INSERT INTO ledger (account, amount) VALUES (?, ?)",
                &[RowValues::Text("doomed".into()), RowValues::Int(99)],
            )?;
            Err(ShuttleDbError::ExecutionError("deliberate failure".into()))
        })
}

fn registry() -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();
    registry.register("ledger", ledger_extension());
    registry
}

fn options() -> StartOptions {
    StartOptions::in_memory().with_extension("ledger")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_hook_and_bundled_statement_are_live()
-> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(options(), registry(), None)?;

    // The startup hook created and seeded the table.
    let row = manager
        .get("SELECT COUNT(*) AS cnt FROM ledger", &[])
        .await?
        .expect("row");
    assert_eq!(row.get("cnt").unwrap().as_int(), Some(&1));

    // The bundled statement was cached at load time; a cached-only lookup
    // succeeds with no prepare round trip.
    let mut runtime = WorkerRuntime::new(registry(), None);
    runtime.execute(DbRequest::Start { options: options() })?;
    let value = runtime.execute(DbRequest::Get {
        sql: "SELECT COALESCE(SUM(amount), 0) AS total FROM ledger".into(),
        params: vec![],
        cached_only: true,
    })?;
    let QueryValue::Row(row) = value else {
        panic!("expected the total row, got {value:?}");
    };
    assert_eq!(row.get("total").unwrap().as_int(), Some(&0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registered_function_is_callable_from_sql() -> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(options(), registry(), None)?;
    let row = manager
        .get("SELECT negate(21) AS n", &[])
        .await?
        .expect("row");
    assert_eq!(row.get("n").unwrap().as_int(), Some(&-21));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn named_transaction_commits_and_returns_its_value()
-> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(options(), registry(), None)?;
    let value = manager
        .transaction("post_pair", &[RowValues::Text("alice".into())])
        .await?;
    let QueryValue::Row(row) = value else {
        panic!("expected the count row, got {value:?}");
    };
    assert_eq!(row.get("cnt").unwrap().as_int(), Some(&3));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_transaction_rolls_back_its_writes() -> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(options(), registry(), None)?;
    let err = manager.transaction("post_then_fail", &[]).await.unwrap_err();
    assert!(matches!(err, ShuttleDbError::ExecutionError(_)));

    // The write made before the failure must not have been committed.
    let row = manager
        .get(
            "SELECT COUNT(*) AS cnt FROM ledger WHERE account = ?",
            &[RowValues::Text("doomed".into())],
        )
        .await?
        .expect("row");
    assert_eq!(row.get("cnt").unwrap().as_int(), Some(&0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_transaction_with_live_connection_errors()
-> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(options(), registry(), None)?;
    let err = manager.transaction("no_such_name", &[]).await.unwrap_err();
    assert!(matches!(err, ShuttleDbError::UnknownTransaction(ref name) if name == "no_such_name"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn extension_load_is_idempotent_per_path() -> Result<(), Box<dyn std::error::Error>> {
    // Not loaded at startup; loaded twice explicitly.
    let manager = DbManager::worker(StartOptions::in_memory(), registry(), None)?;
    manager.load_extension("ledger").await?;
    manager.load_extension("ledger").await?;

    // The startup hook ran exactly once: one boot row.
    let row = manager
        .get(
            "SELECT COUNT(*) AS cnt FROM ledger WHERE account = ?",
            &[RowValues::Text("boot".into())],
        )
        .await?
        .expect("row");
    assert_eq!(row.get("cnt").unwrap().as_int(), Some(&1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unregistered_extension_key_is_a_config_error()
-> Result<(), Box<dyn std::error::Error>> {
    let manager = DbManager::worker(StartOptions::in_memory(), registry(), None)?;
    let err = manager.load_extension("missing").await.unwrap_err();
    assert!(matches!(err, ShuttleDbError::ConfigError(_)));
    Ok(())
}
