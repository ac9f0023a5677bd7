//! SQLite [`DbConnector`], grounded on the same `rusqlite` conventions as
//! [`crate::schema_registry::SqliteIntrospector`].

use super::{DbConnector, DbQuery};
use crate::error::DbExecutionError;
use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::types::Value;

/// Opens a fresh `rusqlite::Connection` per call and runs one read-only query.
#[derive(Debug, Default)]
pub struct SqliteConnector;

impl SqliteConnector {
    /// Creates a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DbConnector for SqliteConnector {
    async fn execute(&self, query: &DbQuery) -> Result<(Vec<String>, Vec<Vec<String>>), DbExecutionError> {
        let path = query.connection_string.clone();
        let sql = query.sql.clone();
        let max_rows = query.max_rows as usize;

        tokio::task::spawn_blocking(move || run_blocking(&path, &sql, max_rows))
            .await
            .map_err(|e| DbExecutionError::Driver(format!("task panicked: {e}")))?
    }
}

fn run_blocking(path: &str, sql: &str, max_rows: usize) -> Result<(Vec<String>, Vec<Vec<String>>), DbExecutionError> {
    let conn = Connection::open(path).map_err(|e| DbExecutionError::Driver(e.to_string()))?;
    let mut stmt = conn.prepare(sql).map_err(|e| DbExecutionError::Driver(e.to_string()))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| (*s).to_string()).collect();
    let col_count = columns.len();

    let mut rows_iter = stmt.query([]).map_err(|e| DbExecutionError::Driver(e.to_string()))?;
    let mut rows = Vec::new();
    while rows.len() < max_rows {
        let Some(row) = rows_iter.next().map_err(|e| DbExecutionError::Driver(e.to_string()))? else {
            break;
        };
        let values: Vec<String> = (0..col_count)
            .map(|i| row.get::<_, Value>(i).map(format_value).unwrap_or_default())
            .collect();
        rows.push(values);
    }

    Ok((columns, rows))
}

fn format_value(value: Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(_) => "<blob>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_db(path: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Orders (Id INTEGER PRIMARY KEY, CustomerId INTEGER);
             INSERT INTO Orders (Id, CustomerId) VALUES (1, 10), (2, 20), (3, 30);",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn executes_select_and_returns_rows() {
        let path = format!("{}/smartrag_exec_test_{}.db", std::env::temp_dir().display(), std::process::id());
        seed_db(&path);

        let connector = SqliteConnector::new();
        let query = DbQuery {
            database_id: "a".to_string(),
            connection_string: path.clone(),
            sql: "SELECT Id, CustomerId FROM Orders ORDER BY Id".to_string(),
            max_rows: 100,
        };
        let (columns, rows) = connector.execute(&query).await.unwrap();
        assert_eq!(columns, vec!["Id".to_string(), "CustomerId".to_string()]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["1".to_string(), "10".to_string()]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn respects_max_rows_cap() {
        let path = format!("{}/smartrag_exec_test_cap_{}.db", std::env::temp_dir().display(), std::process::id());
        seed_db(&path);

        let connector = SqliteConnector::new();
        let query = DbQuery {
            database_id: "a".to_string(),
            connection_string: path.clone(),
            sql: "SELECT Id FROM Orders ORDER BY Id".to_string(),
            max_rows: 2,
        };
        let (_, rows) = connector.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn invalid_sql_surfaces_driver_error() {
        let path = format!("{}/smartrag_exec_test_bad_{}.db", std::env::temp_dir().display(), std::process::id());
        seed_db(&path);

        let connector = SqliteConnector::new();
        let query = DbQuery {
            database_id: "a".to_string(),
            connection_string: path.clone(),
            sql: "SELECT * FROM NoSuchTable".to_string(),
            max_rows: 100,
        };
        assert!(connector.execute(&query).await.is_err());

        let _ = std::fs::remove_file(&path);
    }
}
