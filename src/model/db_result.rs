//! `DbResult`: per-database execution result, produced by the [`crate::executor`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of executing one generated SQL statement against one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbResult {
    /// The database this result came from.
    pub database_id: String,
    /// The SQL that was actually executed (or attempted).
    pub executed_sql: String,
    /// Column headers, in query order.
    pub columns: Vec<String>,
    /// Rows, each an ordered tuple of string-rendered cell values (one per column).
    pub rows: Vec<Vec<String>>,
    /// Whether execution succeeded.
    pub success: bool,
    /// Error text if `success` is `false`.
    pub error: Option<String>,
    /// Wall-clock execution time.
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,
    /// Set if this result was produced by cancellation rather than completion or failure.
    pub cancelled: bool,
}

impl DbResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(
        database_id: impl Into<String>,
        executed_sql: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        execution_time: Duration,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            executed_sql: executed_sql.into(),
            columns,
            rows,
            success: true,
            error: None,
            execution_time,
            cancelled: false,
        }
    }

    /// Builds a failed result; peers are unaffected (spec §4.5).
    #[must_use]
    pub fn failed(database_id: impl Into<String>, executed_sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            executed_sql: executed_sql.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            success: false,
            error: Some(error.into()),
            execution_time: Duration::ZERO,
            cancelled: false,
        }
    }

    /// Builds a result for a query aborted by cancellation.
    #[must_use]
    pub fn cancelled(database_id: impl Into<String>, executed_sql: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            executed_sql: executed_sql.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            success: false,
            error: Some("query cancelled".to_string()),
            execution_time: Duration::ZERO,
            cancelled: true,
        }
    }

    /// Number of rows returned.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the index of a column by case-insensitive name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_carries_rows() {
        let result = DbResult::success(
            "db1",
            "SELECT 1",
            vec!["x".to_string()],
            vec![vec!["1".to_string()]],
            Duration::from_millis(5),
        );
        assert!(result.success);
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn failed_result_has_no_rows_and_an_error() {
        let result = DbResult::failed("db1", "SELECT * FROM x", "syntax error");
        assert!(!result.success);
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.error.as_deref(), Some("syntax error"));
    }

    #[test]
    fn cancelled_result_is_marked() {
        let result = DbResult::cancelled("db1", "SELECT 1");
        assert!(result.cancelled);
        assert!(!result.success);
    }

    #[test]
    fn column_index_is_case_insensitive() {
        let result = DbResult::success("db1", "SELECT CustomerId", vec!["CustomerId".to_string()], vec![], Duration::ZERO);
        assert_eq!(result.column_index("customerid"), Some(0));
        assert_eq!(result.column_index("nope"), None);
    }
}
