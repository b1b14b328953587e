//! Typed CRUD statement generation bound to a [`DbManager`].
//!
//! A [`Table`] owns no data; it renders parameterized SQL on demand and
//! executes it through the facade. Every value is bound through a `?`
//! placeholder — nothing is ever interpolated into the statement text.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::ShuttleDbError;
use crate::manager::DbManager;
use crate::results::{ResultSet, Row, RunResult};
use crate::types::RowValues;

mod dml;
mod select;

/// Name and primary-key column of one table. Pure data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub primary_key: String,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
        }
    }
}

/// Explicit table registry, owned by the application's composition root so
/// tests can construct isolated instances.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    specs: HashMap<String, TableSpec>,
}

impl TableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its table name, replacing any earlier entry.
    pub fn register(&mut self, spec: TableSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&TableSpec> {
        self.specs.get(name)
    }

    /// Bind a registered table to a manager.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::ConfigError` if `name` was never registered.
    pub fn table<T: TableModel>(
        &self,
        name: &str,
        manager: DbManager,
    ) -> Result<Table<T>, ShuttleDbError> {
        let spec = self
            .spec(name)
            .cloned()
            .ok_or_else(|| ShuttleDbError::ConfigError(format!("unknown table '{name}'")))?;
        Ok(Table::new(manager, spec))
    }
}

/// Row shape for a [`Table`]: ordered column/value pairs out, typed rows in.
///
/// `columns` defines both the column list and the value order of generated
/// INSERT statements, so the pairing is positional by construction.
pub trait TableModel: Sized {
    /// The row as ordered `(column, value)` pairs.
    fn columns(&self) -> Vec<(&'static str, RowValues)>;

    /// Decode a full row back into the model.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if a required column is missing or has an
    /// unexpected type.
    fn from_row(row: &Row) -> Result<Self, ShuttleDbError>;
}

/// A WHERE fragment and the parameters bound to its placeholders.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub clause: String,
    pub params: Vec<RowValues>,
}

impl Filter {
    #[must_use]
    pub fn new(clause: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }
}

/// Stateless statement generator for one table, bound to a manager for
/// execution.
pub struct Table<T> {
    pub(crate) manager: DbManager,
    pub(crate) spec: TableSpec,
    _model: PhantomData<T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            spec: self.spec.clone(),
            _model: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("spec", &self.spec).finish()
    }
}

impl<T: TableModel> Table<T> {
    #[must_use]
    pub fn new(manager: DbManager, spec: TableSpec) -> Self {
        Self {
            manager,
            spec,
            _model: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.spec.primary_key
    }

    /// Escape hatch: execute a mutating statement the builder cannot express.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn run(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RunResult, ShuttleDbError> {
        self.manager.run(sql, params).await
    }

    /// Escape hatch: execute a query the builder cannot express.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn all(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, ShuttleDbError> {
        self.manager.all(sql, params).await
    }
}
