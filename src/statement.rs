use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::ShuttleDbError;
use crate::manager::DbManager;
use crate::results::{ResultSet, Row, RunResult};
use crate::types::RowValues;

/// Handle to a statement prepared and cached on the worker side.
///
/// The handle holds only the trimmed SQL text, which doubles as the cache
/// key: it carries no native resource and is safe to clone, log, or
/// serialize. Executing it asks the worker for the already-cached statement
/// and fails loudly if the worker no longer has it.
#[derive(Clone)]
pub struct Statement {
    manager: DbManager,
    source: Arc<String>,
}

impl Statement {
    pub(crate) fn new(manager: DbManager, source: Arc<String>) -> Self {
        Self { manager, source }
    }

    /// Execute as a mutating statement, returning change metadata.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::MissingStatement` if the worker servicing the
    /// request never cached this statement, or any execution error.
    pub async fn run(&self, params: &[RowValues]) -> Result<RunResult, ShuttleDbError> {
        self.manager.run_cached(self.source.as_str(), params).await
    }

    /// Execute as a query and return the first row, if any.
    ///
    /// # Errors
    /// Same failure modes as [`Statement::run`].
    pub async fn get(&self, params: &[RowValues]) -> Result<Option<Row>, ShuttleDbError> {
        self.manager.get_cached(self.source.as_str(), params).await
    }

    /// Execute as a query and return all rows.
    ///
    /// # Errors
    /// Same failure modes as [`Statement::run`].
    pub async fn all(&self, params: &[RowValues]) -> Result<ResultSet, ShuttleDbError> {
        self.manager.all_cached(self.source.as_str(), params).await
    }

    /// The trimmed SQL text (also the cache key).
    #[must_use]
    pub fn sql(&self) -> &str {
        self.source.as_str()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source.as_str())
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Statement").field(&self.source).finish()
    }
}

impl Serialize for Statement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.source.as_str())
    }
}
