//! The closed set of requests a worker can execute, and the plain-data
//! results it sends back.
//!
//! Every operation the engine performs is expressible as one [`DbRequest`]
//! variant, which is what makes the facade process-transparent: a request can
//! be serialized, routed to any worker, and executed identically. No variant
//! carries a native resource handle; prepared statements are addressed by
//! their trimmed SQL text, transactions by their registered name.

use serde::{Deserialize, Serialize};

use crate::results::{ResultSet, Row, RunResult};
use crate::types::RowValues;

/// A single database operation, ready to cross a process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbRequest {
    /// Compile a statement and cache it under its trimmed SQL text.
    Prepare { sql: String },
    /// Execute a mutating statement and return change metadata.
    Run {
        sql: String,
        params: Vec<RowValues>,
        /// Only look up an already-cached statement; never compile.
        #[serde(default)]
        cached_only: bool,
    },
    /// Execute a query and return the first row, if any.
    Get {
        sql: String,
        params: Vec<RowValues>,
        #[serde(default)]
        cached_only: bool,
    },
    /// Execute a query and return every row.
    All {
        sql: String,
        params: Vec<RowValues>,
        #[serde(default)]
        cached_only: bool,
    },
    /// Run raw, unparameterized SQL (schema migrations and the like).
    /// Bypasses the statement cache.
    Exec { sql: String },
    /// Invoke a registered named transaction atomically.
    Transaction { name: String, params: Vec<RowValues> },
    /// Worker-only: open the connection with the given options.
    Start { options: StartOptions },
    /// Load a registered extension bundle into the worker.
    LoadExtension { path: String },
}

/// Result of a [`DbRequest`], as plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    /// No value (missing row, degraded mode, side-effect-only requests).
    None,
    /// A single row.
    Row(Row),
    /// All matching rows.
    Rows(ResultSet),
    /// Change metadata from a mutating statement.
    Run(RunResult),
    /// A statement cache key (trimmed SQL text).
    Key(String),
}

impl QueryValue {
    /// True for the `None` variant.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Connection options carried by [`DbRequest::Start`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Database file path; `None` opens an in-memory database.
    pub path: Option<String>,
    /// Extension bundle to load once the connection is open, addressed by
    /// its registry key.
    pub extension: Option<String>,
    /// Run without a driver connection. Every operation degrades to a
    /// zero-value result instead of failing.
    #[serde(default)]
    pub disabled: bool,
    /// Capacity of the driver's prepared-statement cache.
    pub cache_capacity: Option<usize>,
}

impl StartOptions {
    /// In-memory database with default options.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed database at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Degraded mode: no connection is ever opened.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Load the given registered extension at startup.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>) -> Self {
        self.extension = Some(key.into());
        self
    }

    /// Size the driver's prepared-statement cache.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }
}
