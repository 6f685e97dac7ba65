//! Row mapping traits and untyped result tables.

use crate::error::{ChainError, ChainResult};
use crate::value::Value;
use serde::Serialize;
use tokio_postgres::Row;

/// Trait for converting a database row into a Rust struct.
///
/// Usually implemented through [`data_object!`](crate::data_object).
///
/// # Example
///
/// ```ignore
/// use sqlchain::{FromRow, RowExt, ChainResult};
///
/// struct Employee {
///     employee_key: i32,
///     first_name: String,
/// }
///
/// impl FromRow for Employee {
///     fn from_row(row: &tokio_postgres::Row) -> ChainResult<Self> {
///         Ok(Self {
///             employee_key: row.try_get_column("employee_key")?,
///             first_name: row.try_get_column("first_name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> ChainResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning ChainError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> ChainResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;

    /// Read a column by position as a [`Value`].
    fn value_at(&self, index: usize) -> ChainResult<Value>;

    /// Every column of the row as `(name, value)` pairs.
    fn values(&self) -> ChainResult<Vec<(String, Value)>>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> ChainResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| ChainError::decode(column, e.to_string()))
    }

    fn value_at(&self, index: usize) -> ChainResult<Value> {
        self.try_get(index).map_err(|e| {
            let column = self
                .columns()
                .get(index)
                .map_or_else(|| index.to_string(), |c| c.name().to_string());
            ChainError::decode(column, e.to_string())
        })
    }

    fn values(&self) -> ChainResult<Vec<(String, Value)>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(i, c)| Ok((c.name().to_string(), self.value_at(i)?)))
            .collect()
    }
}

/// Rows without a target type: column names plus one [`Value`] per cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn from_rows(rows: &[Row]) -> ChainResult<Self> {
        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| row.value_at(i)).collect())
            .collect::<ChainResult<_>>()?;
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// A cell by row number and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_ignores_case() {
        let table = DataTable {
            columns: vec!["EmployeeKey".to_string(), "FirstName".to_string()],
            rows: vec![vec![Value::I32(1), Value::Text("Ada".to_string())]],
        };
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "firstname"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(table.get(1, "FirstName"), None);
        assert_eq!(table.get(0, "Missing"), None);
    }

    #[test]
    fn table_serializes_values_untagged() {
        let table = DataTable {
            columns: vec!["n".to_string()],
            rows: vec![vec![Value::I64(3)], vec![Value::Null]],
        };
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({ "columns": ["n"], "rows": [[3], [null]] }));
    }
}
