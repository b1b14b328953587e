use std::path::Path;
use std::sync::Arc;

use crate::error::ShuttleDbError;
use crate::protocol::{DbRequest, QueryValue, StartOptions};
use crate::results::{ResultSet, Row, RunResult};
use crate::statement::Statement;
use crate::transport::PoolTransport;
use crate::types::RowValues;
use crate::worker::{ErrorHandler, ExtensionRegistry, WorkerHandle};

/// The facade application code talks to.
///
/// Every method builds one [`DbRequest`] and routes it: on the parent side
/// through the pool transport, on a worker side straight to the process-local
/// worker runtime. Two sequential calls may land on different workers; use a
/// named transaction for anything that needs one connection atomically.
#[derive(Clone)]
pub struct DbManager {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Proxy(Arc<dyn PoolTransport>),
    Worker(WorkerHandle),
}

impl DbManager {
    /// Parent-side facade: a pure proxy over the pool transport, holding no
    /// driver state.
    #[must_use]
    pub fn proxy(transport: Arc<dyn PoolTransport>) -> Self {
        Self {
            backend: Backend::Proxy(transport),
        }
    }

    /// Worker-side facade backed by a process-local runtime. The connection
    /// is opened eagerly, before the first request.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if the worker thread cannot be started.
    pub fn worker(
        options: StartOptions,
        extensions: ExtensionRegistry,
        error_handler: Option<ErrorHandler>,
    ) -> Result<Self, ShuttleDbError> {
        Ok(Self {
            backend: Backend::Worker(WorkerHandle::spawn(options, extensions, error_handler)?),
        })
    }

    /// Pick the side from the transport's parent flag: parent processes get
    /// a proxy, everything else executes directly.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if the worker-side runtime cannot be started.
    pub fn attach(
        transport: Arc<dyn PoolTransport>,
        options: StartOptions,
        extensions: ExtensionRegistry,
        error_handler: Option<ErrorHandler>,
    ) -> Result<Self, ShuttleDbError> {
        if transport.is_parent() {
            Ok(Self::proxy(transport))
        } else {
            Self::worker(options, extensions, error_handler)
        }
    }

    /// No-op. The parent holds no driver state; a worker opened its
    /// connection at construction time.
    ///
    /// # Errors
    /// Never fails; the `Result` keeps the call sites uniform.
    pub async fn setup(&self) -> Result<(), ShuttleDbError> {
        Ok(())
    }

    pub(crate) async fn submit(
        &self,
        request: DbRequest,
    ) -> Result<QueryValue, ShuttleDbError> {
        match &self.backend {
            Backend::Proxy(transport) => transport.query(request).await,
            Backend::Worker(worker) => worker.query(request).await,
        }
    }

    /// Execute a query and return all rows.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn all(
        &self,
        sql: impl Into<String>,
        params: &[RowValues],
    ) -> Result<ResultSet, ShuttleDbError> {
        let value = self
            .submit(DbRequest::All {
                sql: sql.into(),
                params: params.to_vec(),
                cached_only: false,
            })
            .await?;
        expect_rows(value)
    }

    /// Execute a query and return the first row, if any.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn get(
        &self,
        sql: impl Into<String>,
        params: &[RowValues],
    ) -> Result<Option<Row>, ShuttleDbError> {
        let value = self
            .submit(DbRequest::Get {
                sql: sql.into(),
                params: params.to_vec(),
                cached_only: false,
            })
            .await?;
        expect_row(value)
    }

    /// Execute a mutating statement and return change metadata.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn run(
        &self,
        sql: impl Into<String>,
        params: &[RowValues],
    ) -> Result<RunResult, ShuttleDbError> {
        let value = self
            .submit(DbRequest::Run {
                sql: sql.into(),
                params: params.to_vec(),
                cached_only: false,
            })
            .await?;
        expect_run(value)
    }

    /// Execute raw, unparameterized SQL (schema migrations and the like).
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn exec(&self, sql: impl Into<String>) -> Result<RunResult, ShuttleDbError> {
        let value = self.submit(DbRequest::Exec { sql: sql.into() }).await?;
        expect_run(value)
    }

    /// Compile and cache a statement on the worker, returning a handle keyed
    /// by the trimmed SQL text.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if compilation fails.
    pub async fn prepare(&self, sql: &str) -> Result<Statement, ShuttleDbError> {
        let value = self
            .submit(DbRequest::Prepare {
                sql: sql.to_owned(),
            })
            .await?;
        let key = expect_key(value)?;
        Ok(Statement::new(self.clone(), Arc::new(key)))
    }

    /// Invoke a registered named transaction atomically on one worker.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::UnknownTransaction` for an unregistered name
    /// (with a live connection), or whatever the transaction body reports.
    pub async fn transaction(
        &self,
        name: impl Into<String>,
        params: &[RowValues],
    ) -> Result<QueryValue, ShuttleDbError> {
        self.submit(DbRequest::Transaction {
            name: name.into(),
            params: params.to_vec(),
        })
        .await
    }

    /// Load a registered extension bundle into the servicing worker.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::ConfigError` for an unregistered key.
    pub async fn load_extension(
        &self,
        path: impl Into<String>,
    ) -> Result<(), ShuttleDbError> {
        self.submit(DbRequest::LoadExtension { path: path.into() })
            .await?;
        Ok(())
    }

    /// Read a SQL file and execute its contents as one batch. This is how
    /// schema migrations are bootstrapped.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::IoError` if the file cannot be read, or any
    /// execution error.
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<RunResult, ShuttleDbError> {
        let sql = tokio::fs::read_to_string(path).await?;
        self.exec(sql).await
    }

    pub(crate) async fn run_cached(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RunResult, ShuttleDbError> {
        let value = self
            .submit(DbRequest::Run {
                sql: sql.to_owned(),
                params: params.to_vec(),
                cached_only: true,
            })
            .await?;
        expect_run(value)
    }

    pub(crate) async fn get_cached(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Row>, ShuttleDbError> {
        let value = self
            .submit(DbRequest::Get {
                sql: sql.to_owned(),
                params: params.to_vec(),
                cached_only: true,
            })
            .await?;
        expect_row(value)
    }

    pub(crate) async fn all_cached(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, ShuttleDbError> {
        let value = self
            .submit(DbRequest::All {
                sql: sql.to_owned(),
                params: params.to_vec(),
                cached_only: true,
            })
            .await?;
        expect_rows(value)
    }
}

impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Proxy(_) => "proxy",
            Backend::Worker(_) => "worker",
        };
        f.debug_struct("DbManager").field("backend", &backend).finish()
    }
}

fn expect_rows(value: QueryValue) -> Result<ResultSet, ShuttleDbError> {
    match value {
        QueryValue::Rows(rows) => Ok(rows),
        QueryValue::None => Ok(ResultSet::default()),
        other => Err(unexpected("rows", &other)),
    }
}

fn expect_row(value: QueryValue) -> Result<Option<Row>, ShuttleDbError> {
    match value {
        QueryValue::Row(row) => Ok(Some(row)),
        QueryValue::None => Ok(None),
        other => Err(unexpected("row", &other)),
    }
}

fn expect_run(value: QueryValue) -> Result<RunResult, ShuttleDbError> {
    match value {
        QueryValue::Run(result) => Ok(result),
        QueryValue::None => Ok(RunResult::default()),
        other => Err(unexpected("change metadata", &other)),
    }
}

fn expect_key(value: QueryValue) -> Result<String, ShuttleDbError> {
    match value {
        QueryValue::Key(key) => Ok(key),
        other => Err(unexpected("statement key", &other)),
    }
}

fn unexpected(wanted: &str, got: &QueryValue) -> ShuttleDbError {
    ShuttleDbError::TransportError(format!("expected {wanted}, got {got:?}"))
}
