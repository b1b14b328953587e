use crate::error::ShuttleDbError;
use crate::results::{ResultSet, Row};
use crate::types::RowValues;

use super::{Filter, Table, TableModel};

impl<T: TableModel> Table<T> {
    /// Select every matching row.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn select_all(
        &self,
        columns: &[&str],
        filter: Option<&Filter>,
    ) -> Result<ResultSet, ShuttleDbError> {
        let (sql, params) = render_select(&self.spec.name, columns, filter, None);
        self.manager.all(sql, &params).await
    }

    /// Select at most one row; an effective `LIMIT 1` is always applied.
    /// Returns `Ok(None)` when nothing matches.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn select_one(
        &self,
        columns: &[&str],
        filter: Option<&Filter>,
    ) -> Result<Option<Row>, ShuttleDbError> {
        let (sql, params) = render_select(&self.spec.name, columns, filter, Some(1));
        self.manager.get(sql, &params).await
    }

    /// Shorthand for [`Table::select_one`] filtered by primary-key equality.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn get(
        &self,
        columns: &[&str],
        key: RowValues,
    ) -> Result<Option<Row>, ShuttleDbError> {
        let filter = Filter::new(format!("{} = ?", self.spec.primary_key), vec![key]);
        self.select_one(columns, Some(&filter)).await
    }

    /// Fetch the full row for `key` and decode it into the model.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution or decoding fails.
    pub async fn fetch(&self, key: RowValues) -> Result<Option<T>, ShuttleDbError> {
        match self.get(&["*"], key).await? {
            Some(row) => Ok(Some(T::from_row(&row)?)),
            None => Ok(None),
        }
    }
}

pub(super) fn render_select(
    table: &str,
    columns: &[&str],
    filter: Option<&Filter>,
    limit: Option<u32>,
) -> (String, Vec<RowValues>) {
    let column_list = if columns.is_empty() {
        "*".to_owned()
    } else {
        columns.join(", ")
    };
    let mut sql = format!("SELECT {column_list} FROM {table}");
    let mut params = Vec::new();
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.clause);
        params.extend(filter.params.iter().cloned());
    }
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        params.push(RowValues::Int(i64::from(limit)));
    }
    (sql, params)
}
