use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::ShuttleDbError;
use crate::results::{ResultSet, Row};
use crate::types::RowValues;

/// Convert a single `RowValues` into a driver value.
#[must_use]
pub(crate) fn to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

#[must_use]
pub(crate) fn to_sqlite_values(params: &[RowValues]) -> Vec<Value> {
    params.iter().map(to_sqlite_value).collect()
}

/// Borrowed parameter slice suitable for driver execution.
#[must_use]
pub(crate) fn as_tosql(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// Convert a driver value back into a `RowValues`.
#[must_use]
pub(crate) fn from_sqlite_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Run a query statement and materialize every row.
///
/// Column names are captured once and shared by all rows.
pub(crate) fn query_rows(
    stmt: &mut Statement,
    values: &[Value],
) -> Result<ResultSet, ShuttleDbError> {
    let columns: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );
    let column_count = columns.len();

    let param_refs = as_tosql(values);
    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut result_set = ResultSet::default();
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: Value = row.get(i)?;
            row_values.push(from_sqlite_value(value));
        }
        result_set.push(Row::new(Arc::clone(&columns), row_values));
    }
    Ok(result_set)
}
