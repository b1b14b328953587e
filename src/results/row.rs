use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::RowValues;

/// A row from a query result.
///
/// Column names are shared across all rows of one result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// The column names for this row (shared across the result set)
    pub columns: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValues>,
}

impl Row {
    /// Create a new row from shared column names and values.
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    /// Get the index of a column by name.
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == column_name)
    }

    /// Get a value by column name, or `None` if the column is absent.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column index, or `None` if out of bounds.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }
}
