use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rusqlite::Connection;

use crate::convert;
use crate::error::ShuttleDbError;
use crate::protocol::QueryValue;
use crate::results::{ResultSet, Row, RunResult};
use crate::types::RowValues;

use super::runtime::normalize;

/// A scalar SQL function registered by an extension.
pub type ScalarFn =
    Arc<dyn Fn(&[RowValues]) -> Result<RowValues, ShuttleDbError> + Send + Sync>;

/// A named transaction body. Runs inside one driver transaction; returning
/// `Err` rolls the whole transaction back.
pub type TransactionFn = Arc<
    dyn Fn(&TxEnv<'_>, &[RowValues]) -> Result<QueryValue, ShuttleDbError> + Send + Sync,
>;

/// Hook invoked with the live connection once it is open.
pub type StartHook = Arc<dyn Fn(&Connection) -> Result<(), ShuttleDbError> + Send + Sync>;

/// A bundle of functions, named transactions, pre-built statements, and a
/// startup hook, loaded into a worker at setup time.
///
/// Extensions are registered statically under a path-like key and resolved
/// from an [`ExtensionRegistry`]; nothing is loaded dynamically.
#[derive(Clone, Default)]
pub struct Extension {
    pub(crate) functions: Vec<(String, ScalarFn)>,
    pub(crate) transactions: Vec<(String, TransactionFn)>,
    pub(crate) statements: Vec<(String, String)>,
    pub(crate) on_start: Option<StartHook>,
}

impl Extension {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scalar SQL function under `name`.
    #[must_use]
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&[RowValues]) -> Result<RowValues, ShuttleDbError> + Send + Sync + 'static,
    ) -> Self {
        self.functions.push((name.into(), Arc::new(func)));
        self
    }

    /// Register a named transaction under `name`.
    #[must_use]
    pub fn with_transaction(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&TxEnv<'_>, &[RowValues]) -> Result<QueryValue, ShuttleDbError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.transactions.push((name.into(), Arc::new(func)));
        self
    }

    /// Bundle a statement to prepare and cache at load time. The cache key is
    /// the statement's own trimmed SQL text, not `name`.
    #[must_use]
    pub fn with_statement(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.statements.push((name.into(), sql.into()));
        self
    }

    /// Run `hook` with the live connection once at load time.
    #[must_use]
    pub fn on_start(
        mut self,
        hook: impl Fn(&Connection) -> Result<(), ShuttleDbError> + Send + Sync + 'static,
    ) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("functions", &self.functions.len())
            .field("transactions", &self.transactions.len())
            .field("statements", &self.statements.len())
            .field("on_start", &self.on_start.is_some())
            .finish()
    }
}

/// Statically registered extensions, keyed the way dynamic module paths were.
/// Registering a key twice replaces the earlier bundle.
#[derive(Clone, Default, Debug)]
pub struct ExtensionRegistry {
    map: HashMap<String, Extension>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extension` under `key`, replacing any earlier registration.
    pub fn register(&mut self, key: impl Into<String>, extension: Extension) {
        self.map.insert(key.into(), extension);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Extension> {
        self.map.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Execution environment handed to a named transaction body.
///
/// Exposes the worker's live connection and its statement cache so the body
/// can mix ad hoc SQL and cached statements inside one atomic transaction.
pub struct TxEnv<'a> {
    conn: &'a Connection,
    prepared: &'a HashSet<String>,
}

impl<'a> TxEnv<'a> {
    pub(crate) fn new(conn: &'a Connection, prepared: &'a HashSet<String>) -> Self {
        Self { conn, prepared }
    }

    /// The live connection, inside the open transaction.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    /// Look up an already-cached statement by its trimmed SQL text.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::MissingStatement` if the key was never
    /// prepared on this worker.
    pub fn cached(&self, sql: &str) -> Result<rusqlite::CachedStatement<'_>, ShuttleDbError> {
        let key = normalize(sql);
        if !self.prepared.contains(key) {
            return Err(ShuttleDbError::MissingStatement(key.to_owned()));
        }
        Ok(self.conn.prepare_cached(key)?)
    }

    /// Execute a mutating statement inside the transaction.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if compilation or execution fails.
    pub fn run(&self, sql: &str, params: &[RowValues]) -> Result<RunResult, ShuttleDbError> {
        let values = convert::to_sqlite_values(params);
        let refs = convert::as_tosql(&values);
        let mut stmt = self.conn.prepare_cached(normalize(sql))?;
        let changes = stmt.execute(&refs[..])?;
        Ok(RunResult {
            changes,
            last_insert_rowid: self.conn.last_insert_rowid(),
        })
    }

    /// Execute a query inside the transaction and return the first row.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if compilation or execution fails.
    pub fn get(&self, sql: &str, params: &[RowValues]) -> Result<Option<Row>, ShuttleDbError> {
        let values = convert::to_sqlite_values(params);
        let mut stmt = self.conn.prepare_cached(normalize(sql))?;
        let rows = convert::query_rows(&mut stmt, &values)?;
        Ok(rows.into_iter().next())
    }

    /// Execute a query inside the transaction and return all rows.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if compilation or execution fails.
    pub fn all(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, ShuttleDbError> {
        let values = convert::to_sqlite_values(params);
        let mut stmt = self.conn.prepare_cached(normalize(sql))?;
        convert::query_rows(&mut stmt, &values)
    }
}
