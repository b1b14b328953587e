use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use tracing::warn;

use crate::convert;
use crate::error::ShuttleDbError;
use crate::protocol::{DbRequest, QueryValue, StartOptions};
use crate::results::RunResult;
use crate::types::RowValues;

use super::extension::{ExtensionRegistry, ScalarFn, TransactionFn, TxEnv};

/// Callback invoked with any driver error that escapes request execution.
/// Returning `Some(value)` makes `value` the request's result; `None`
/// propagates the error to the caller.
pub type ErrorHandler =
    Arc<dyn Fn(&ShuttleDbError, &DbRequest) -> Option<QueryValue> + Send + Sync>;

/// Cache-key normalization: trim, and nothing else.
///
/// Two statements that differ only in leading/trailing whitespace share one
/// cache entry; any internal difference (even whitespace) makes a distinct
/// entry.
#[must_use]
pub(crate) fn normalize(sql: &str) -> &str {
    sql.trim()
}

/// Per-worker execution state: one lazily opened connection, one statement
/// cache, one named-transaction registry.
///
/// The runtime executes exactly one request at a time to completion; the
/// driver is synchronous, so there is no interleaving to guard against
/// within a worker. Compiled statements live in the driver's own
/// prepared-statement cache, addressed by the same trimmed text held in
/// `prepared`.
pub struct WorkerRuntime {
    connection: Option<Connection>,
    prepared: HashSet<String>,
    transactions: HashMap<String, TransactionFn>,
    extensions: ExtensionRegistry,
    loaded: HashSet<String>,
    error_handler: Option<ErrorHandler>,
    ready: bool,
}

impl WorkerRuntime {
    #[must_use]
    pub fn new(extensions: ExtensionRegistry, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            connection: None,
            prepared: HashSet::new(),
            transactions: HashMap::new(),
            extensions,
            loaded: HashSet::new(),
            error_handler,
            ready: false,
        }
    }

    /// True once a connection is open. Degraded mode stays `false`.
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Execute one request to completion.
    ///
    /// This is the single error boundary: any driver error is routed through
    /// the configured error handler. Caller bugs (`MissingStatement`,
    /// `UnknownTransaction`) bypass the handler and always surface.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` when execution fails and the handler does not
    /// supply a substitute result.
    pub fn execute(&mut self, request: DbRequest) -> Result<QueryValue, ShuttleDbError> {
        match self.dispatch(&request) {
            Err(err) if !is_caller_bug(&err) => match self.error_handler.clone() {
                Some(handler) => match handler(&err, &request) {
                    Some(value) => Ok(value),
                    None => Err(err),
                },
                None => {
                    warn!(?request, %err, "query failed");
                    Err(err)
                }
            },
            other => other,
        }
    }

    fn dispatch(&mut self, request: &DbRequest) -> Result<QueryValue, ShuttleDbError> {
        match request {
            DbRequest::Start { options } => {
                self.setup(options)?;
                Ok(QueryValue::None)
            }
            DbRequest::LoadExtension { path } => {
                self.load_extension(path)?;
                Ok(QueryValue::None)
            }
            DbRequest::Prepare { sql } => {
                if self.connection.is_none() {
                    // Degraded: the key is just text, hand it back uncached.
                    return Ok(QueryValue::Key(normalize(sql).to_owned()));
                }
                Ok(QueryValue::Key(self.get_or_prepare(sql)?))
            }
            DbRequest::Run {
                sql,
                params,
                cached_only,
            } => {
                if self.connection.is_none() {
                    return Ok(QueryValue::Run(RunResult::default()));
                }
                let key = self.resolve(sql, *cached_only)?;
                let conn = self.connection_ref()?;
                let values = convert::to_sqlite_values(params);
                let refs = convert::as_tosql(&values);
                let mut stmt = conn.prepare_cached(&key)?;
                let changes = stmt.execute(&refs[..])?;
                Ok(QueryValue::Run(RunResult {
                    changes,
                    last_insert_rowid: conn.last_insert_rowid(),
                }))
            }
            DbRequest::Get {
                sql,
                params,
                cached_only,
            } => {
                if self.connection.is_none() {
                    return Ok(QueryValue::None);
                }
                let key = self.resolve(sql, *cached_only)?;
                let conn = self.connection_ref()?;
                let values = convert::to_sqlite_values(params);
                let mut stmt = conn.prepare_cached(&key)?;
                let rows = convert::query_rows(&mut stmt, &values)?;
                Ok(match rows.into_iter().next() {
                    Some(row) => QueryValue::Row(row),
                    None => QueryValue::None,
                })
            }
            DbRequest::All {
                sql,
                params,
                cached_only,
            } => {
                if self.connection.is_none() {
                    return Ok(QueryValue::Rows(crate::results::ResultSet::default()));
                }
                let key = self.resolve(sql, *cached_only)?;
                let conn = self.connection_ref()?;
                let values = convert::to_sqlite_values(params);
                let mut stmt = conn.prepare_cached(&key)?;
                Ok(QueryValue::Rows(convert::query_rows(&mut stmt, &values)?))
            }
            DbRequest::Exec { sql } => {
                let Some(conn) = self.connection.as_ref() else {
                    return Ok(QueryValue::Run(RunResult::default()));
                };
                conn.execute_batch(sql)?;
                // The driver reports no aggregate count for a batch.
                Ok(QueryValue::Run(RunResult::default()))
            }
            DbRequest::Transaction { name, params } => self.run_transaction(name, params),
        }
    }

    /// Open the connection if it has not been opened yet; repeated calls are
    /// no-ops. An open failure (or `disabled`) leaves the runtime in degraded
    /// mode rather than failing the worker.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` only if loading the configured extension
    /// fails; connection problems degrade silently.
    pub fn setup(&mut self, options: &StartOptions) -> Result<(), ShuttleDbError> {
        if self.ready {
            return Ok(());
        }
        self.ready = true;

        if options.disabled {
            warn!("database driver disabled; running degraded");
        } else {
            let opened = match &options.path {
                Some(path) => Connection::open(path),
                None => Connection::open_in_memory(),
            };
            match opened {
                Ok(conn) => {
                    if let Some(capacity) = options.cache_capacity {
                        conn.set_prepared_statement_cache_capacity(capacity);
                    }
                    self.connection = Some(conn);
                }
                Err(err) => {
                    warn!(%err, "could not open database; running degraded");
                }
            }
        }

        if let Some(key) = options.extension.clone() {
            self.load_extension(&key)?;
        }
        Ok(())
    }

    /// Load a registered extension bundle. Idempotent per key.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::ConfigError` for an unregistered key, or any
    /// driver error raised while registering functions and statements.
    pub fn load_extension(&mut self, key: &str) -> Result<(), ShuttleDbError> {
        if self.loaded.contains(key) {
            return Ok(());
        }
        let Some(extension) = self.extensions.get(key).cloned() else {
            return Err(ShuttleDbError::ConfigError(format!(
                "unknown extension '{key}'"
            )));
        };

        if let Some(conn) = self.connection.as_ref() {
            for (name, func) in &extension.functions {
                register_scalar(conn, name, Arc::clone(func))?;
            }
        }
        if self.connection.is_some() {
            for (_, sql) in &extension.statements {
                self.get_or_prepare(sql)?;
            }
        }
        for (name, func) in extension.transactions {
            self.transactions.insert(name, func);
        }
        if let (Some(hook), Some(conn)) = (&extension.on_start, self.connection.as_ref()) {
            hook(conn)?;
        }

        self.loaded.insert(key.to_owned());
        Ok(())
    }

    /// The single chokepoint all statement caching routes through: trim, look
    /// up, compile-and-insert on miss. Returns the cache key.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if no connection exists or compilation fails.
    pub fn get_or_prepare(&mut self, sql: &str) -> Result<String, ShuttleDbError> {
        let key = normalize(sql);
        if self.prepared.contains(key) {
            return Ok(key.to_owned());
        }
        let conn = self.connection_ref()?;
        // Compile now so later executions reuse the driver's cache entry.
        conn.prepare_cached(key)?;
        self.prepared.insert(key.to_owned());
        Ok(key.to_owned())
    }

    fn resolve(&mut self, sql: &str, cached_only: bool) -> Result<String, ShuttleDbError> {
        if cached_only {
            let key = normalize(sql);
            if !self.prepared.contains(key) {
                return Err(ShuttleDbError::MissingStatement(key.to_owned()));
            }
            Ok(key.to_owned())
        } else {
            self.get_or_prepare(sql)
        }
    }

    fn run_transaction(
        &mut self,
        name: &str,
        params: &[RowValues],
    ) -> Result<QueryValue, ShuttleDbError> {
        if self.connection.is_none() {
            return Ok(QueryValue::None);
        }
        let Some(func) = self.transactions.get(name).cloned() else {
            return Err(ShuttleDbError::UnknownTransaction(name.to_owned()));
        };
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| ShuttleDbError::ConnectionError("no database connection".into()))?;
        let tx = conn.transaction()?;
        let env = TxEnv::new(&tx, &self.prepared);
        match func(&env, params) {
            Ok(value) => {
                drop(env);
                tx.commit()?;
                Ok(value)
            }
            // Dropping the transaction rolls it back.
            Err(err) => Err(err),
        }
    }

    fn connection_ref(&self) -> Result<&Connection, ShuttleDbError> {
        self.connection
            .as_ref()
            .ok_or_else(|| ShuttleDbError::ConnectionError("no database connection".into()))
    }
}

impl std::fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRuntime")
            .field("ready", &self.ready)
            .field("has_connection", &self.connection.is_some())
            .field("prepared", &self.prepared.len())
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

fn is_caller_bug(err: &ShuttleDbError) -> bool {
    matches!(
        err,
        ShuttleDbError::MissingStatement(_) | ShuttleDbError::UnknownTransaction(_)
    )
}

fn register_scalar(
    conn: &Connection,
    name: &str,
    func: ScalarFn,
) -> Result<(), ShuttleDbError> {
    conn.create_scalar_function(name, -1, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let mut args = Vec::with_capacity(ctx.len());
        for i in 0..ctx.len() {
            args.push(convert::from_sqlite_value(Value::try_from(ctx.get_raw(i))?));
        }
        let out = func(&args).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(convert::to_sqlite_value(&out))
    })?;
    Ok(())
}
