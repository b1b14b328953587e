use crate::error::ShuttleDbError;
use crate::results::RunResult;
use crate::types::RowValues;

use super::{Filter, Table, TableModel};

impl<T: TableModel> Table<T> {
    /// Insert one row, with optional extra columns appended after the row's
    /// own. Column names and bound values are paired positionally from the
    /// same iteration.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn insert(
        &self,
        row: &T,
        extra: Option<&[(&str, RowValues)]>,
    ) -> Result<RunResult, ShuttleDbError> {
        self.write(row, extra, false).await
    }

    /// Insert one row, replacing any existing row with the same key.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn replace(
        &self,
        row: &T,
        extra: Option<&[(&str, RowValues)]>,
    ) -> Result<RunResult, ShuttleDbError> {
        self.write(row, extra, true).await
    }

    async fn write(
        &self,
        row: &T,
        extra: Option<&[(&str, RowValues)]>,
        replace: bool,
    ) -> Result<RunResult, ShuttleDbError> {
        let mut names = Vec::new();
        let mut values = Vec::new();
        for (name, value) in row.columns() {
            names.push(name);
            values.push(value);
        }
        if let Some(extra) = extra {
            for (name, value) in extra {
                names.push(name);
                values.push(value.clone());
            }
        }
        let sql = render_write(&self.spec.name, &names, replace);
        self.manager.run(sql, &values).await
    }

    /// Update every matching row with the given `SET` pairs.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn update_all(
        &self,
        patch: &[(&str, RowValues)],
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<RunResult, ShuttleDbError> {
        let (sql, params) = render_update(&self.spec.name, patch, filter, limit);
        self.manager.run(sql, &params).await
    }

    /// Update at most one matching row.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn update_one(
        &self,
        patch: &[(&str, RowValues)],
        filter: Option<&Filter>,
    ) -> Result<RunResult, ShuttleDbError> {
        self.update_all(patch, filter, Some(1)).await
    }

    /// Delete every matching row.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn delete_all(
        &self,
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<RunResult, ShuttleDbError> {
        let (sql, params) = render_delete(&self.spec.name, filter, limit);
        self.manager.run(sql, &params).await
    }

    /// Delete at most one matching row; other matching rows remain.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn delete_one(&self, filter: &Filter) -> Result<RunResult, ShuttleDbError> {
        self.delete_all(Some(filter), Some(1)).await
    }

    /// Delete the row whose primary key equals `key`.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if execution fails.
    pub async fn delete(&self, key: RowValues) -> Result<RunResult, ShuttleDbError> {
        let filter = Filter::new(format!("{} = ?", self.spec.primary_key), vec![key]);
        self.delete_all(Some(&filter), None).await
    }
}

pub(super) fn render_write(table: &str, names: &[&str], replace: bool) -> String {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    let columns = names.join(", ");
    let placeholders = vec!["?"; names.len()].join(", ");
    format!("{verb} INTO {table} ({columns}) VALUES ({placeholders})")
}

pub(super) fn render_update(
    table: &str,
    patch: &[(&str, RowValues)],
    filter: Option<&Filter>,
    limit: Option<u32>,
) -> (String, Vec<RowValues>) {
    let assignments = patch
        .iter()
        .map(|(name, _)| format!("{name} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("UPDATE {table} SET {assignments}");
    let mut params: Vec<RowValues> = patch.iter().map(|(_, value)| value.clone()).collect();
    append_scope(&mut sql, &mut params, table, filter, limit);
    (sql, params)
}

pub(super) fn render_delete(
    table: &str,
    filter: Option<&Filter>,
    limit: Option<u32>,
) -> (String, Vec<RowValues>) {
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::new();
    append_scope(&mut sql, &mut params, table, filter, limit);
    (sql, params)
}

// Stock SQLite builds reject LIMIT on UPDATE/DELETE, so a bounded scope is
// expressed through a rowid subquery instead.
fn append_scope(
    sql: &mut String,
    params: &mut Vec<RowValues>,
    table: &str,
    filter: Option<&Filter>,
    limit: Option<u32>,
) {
    match (filter, limit) {
        (Some(filter), None) => {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.clause);
            params.extend(filter.params.iter().cloned());
        }
        (Some(filter), Some(limit)) => {
            sql.push_str(&format!(
                " WHERE rowid IN (SELECT rowid FROM {table} WHERE {} LIMIT ?)",
                filter.clause
            ));
            params.extend(filter.params.iter().cloned());
            params.push(RowValues::Int(i64::from(limit)));
        }
        (None, Some(limit)) => {
            sql.push_str(&format!(
                " WHERE rowid IN (SELECT rowid FROM {table} LIMIT ?)"
            ));
            params.push(RowValues::Int(i64::from(limit)));
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_pairs_columns_and_values_positionally() {
        let sql = render_write("t", &["id", "name"], false);
        assert_eq!(sql, "INSERT INTO t (id, name) VALUES (?, ?)");
        let sql = render_write("t", &["name", "id"], false);
        assert_eq!(sql, "INSERT INTO t (name, id) VALUES (?, ?)");
    }

    #[test]
    fn replace_uses_insert_or_replace() {
        let sql = render_write("t", &["id"], true);
        assert_eq!(sql, "INSERT OR REPLACE INTO t (id) VALUES (?)");
    }

    #[test]
    fn update_orders_set_then_filter_then_limit() {
        let filter = Filter::new("id = ?", vec![RowValues::Int(9)]);
        let (sql, params) = render_update(
            "t",
            &[("a", RowValues::Int(1)), ("b", RowValues::Text("x".into()))],
            Some(&filter),
            Some(1),
        );
        assert_eq!(
            sql,
            "UPDATE t SET a = ?, b = ? WHERE rowid IN (SELECT rowid FROM t WHERE id = ? LIMIT ?)"
        );
        assert_eq!(
            params,
            vec![
                RowValues::Int(1),
                RowValues::Text("x".into()),
                RowValues::Int(9),
                RowValues::Int(1),
            ]
        );
    }

    #[test]
    fn delete_without_limit_uses_plain_where() {
        let filter = Filter::new("name = ?", vec![RowValues::Text("a".into())]);
        let (sql, params) = render_delete("t", Some(&filter), None);
        assert_eq!(sql, "DELETE FROM t WHERE name = ?");
        assert_eq!(params, vec![RowValues::Text("a".into())]);
    }

    #[test]
    fn delete_with_limit_scopes_through_rowid() {
        let filter = Filter::new("name = ?", vec![RowValues::Text("a".into())]);
        let (sql, params) = render_delete("t", Some(&filter), Some(1));
        assert_eq!(
            sql,
            "DELETE FROM t WHERE rowid IN (SELECT rowid FROM t WHERE name = ? LIMIT ?)"
        );
        assert_eq!(
            params,
            vec![RowValues::Text("a".into()), RowValues::Int(1)]
        );
    }
}
