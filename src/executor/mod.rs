//! Database Executor (spec §4.5): runs generated SQL against every selected
//! database concurrently, each bounded by its own timeout and row cap.

mod sqlite_connector;

pub use sqlite_connector::SqliteConnector;

use crate::error::DbExecutionError;
use crate::model::DbResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Maps a [`crate::model::Dialect`] to the connector-map key used by
/// [`DatabaseExecutor::new`]'s `connectors` argument and by
/// [`crate::merger::ResultMerger`]'s missing-target retry.
#[must_use]
pub fn dialect_key(dialect: crate::model::Dialect) -> String {
    format!("{dialect:?}").to_lowercase()
}

/// One statement to run against one database.
#[derive(Debug, Clone)]
pub struct DbQuery {
    /// The database to run against (matches a [`crate::schema_registry::SchemaRegistry`] id).
    pub database_id: String,
    /// The connection string/path used by the connector to open a fresh connection.
    pub connection_string: String,
    /// The validated SQL to execute.
    pub sql: String,
    /// Row cap applied by the connector (spec §6 `MaxRowsPerQuery`).
    pub max_rows: u32,
}

/// Opens a fresh connection and executes one query (spec §4.5: "each task
/// opens a fresh connection... and closes the connection").
///
/// Implementations must be `Send + Sync` and cheap to clone/share: the
/// executor holds one `Arc<dyn DbConnector>` per dialect.
#[async_trait]
pub trait DbConnector: Send + Sync {
    /// Executes `query.sql`, returning column headers and row data.
    ///
    /// # Errors
    ///
    /// Returns [`DbExecutionError`] on connection failure or a driver-level query error.
    async fn execute(&self, query: &DbQuery) -> Result<(Vec<String>, Vec<Vec<String>>), DbExecutionError>;
}

/// Executes [`DbQuery`]s across databases in parallel, bounded by a
/// per-query timeout, and honoring a request-scoped [`CancellationToken`].
pub struct DatabaseExecutor {
    connectors: std::collections::HashMap<String, Arc<dyn DbConnector>>,
    timeout: Duration,
}

impl DatabaseExecutor {
    /// Creates an executor dispatching by dialect name (e.g. `"sqlite"`) to `connectors`.
    #[must_use]
    pub fn new(connectors: std::collections::HashMap<String, Arc<dyn DbConnector>>, timeout: Duration) -> Self {
        Self { connectors, timeout }
    }

    /// Runs every query in `queries` concurrently via one [`JoinSet`] task each.
    ///
    /// Returns when every task has settled (completed, failed, timed out, or
    /// was cancelled) — never early. Order of the returned [`DbResult`]s is
    /// unspecified (spec §4.5 "not ordered").
    pub async fn execute_all(&self, queries: Vec<(DbQuery, String)>, cancel: CancellationToken) -> Vec<DbResult> {
        let mut set: JoinSet<DbResult> = JoinSet::new();

        for (query, dialect) in queries {
            let Some(connector) = self.connectors.get(&dialect).cloned() else {
                set.spawn(async move {
                    DbResult::failed(
                        query.database_id.clone(),
                        query.sql.clone(),
                        format!("no connector registered for dialect {dialect}"),
                    )
                });
                continue;
            };
            let timeout = self.timeout;
            let cancel = cancel.clone();
            set.spawn(async move { run_one(connector, query, timeout, cancel).await });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => warn!(error = %err, "database executor task panicked"),
            }
        }
        results
    }
}

async fn run_one(connector: Arc<dyn DbConnector>, query: DbQuery, timeout: Duration, cancel: CancellationToken) -> DbResult {
    let started = Instant::now();
    tokio::select! {
        biased;
        () = cancel.cancelled() => DbResult::cancelled(query.database_id, query.sql),
        outcome = tokio::time::timeout(timeout, connector.execute(&query)) => {
            match outcome {
                Ok(Ok((columns, rows))) => DbResult::success(query.database_id, query.sql, columns, rows, started.elapsed()),
                Ok(Err(err)) => {
                    warn!(database_id = %query.database_id, error = %err, "database query failed");
                    DbResult::failed(query.database_id, query.sql, err.to_string())
                }
                Err(_elapsed) => {
                    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    warn!(database_id = %query.database_id, millis, "database query timed out");
                    DbResult::failed(query.database_id, query.sql, DbExecutionError::Timeout { millis }.to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct SlowConnector(Duration);

    #[async_trait]
    impl DbConnector for SlowConnector {
        async fn execute(&self, _query: &DbQuery) -> Result<(Vec<String>, Vec<Vec<String>>), DbExecutionError> {
            tokio::time::sleep(self.0).await;
            Ok((vec!["x".to_string()], vec![vec!["1".to_string()]]))
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl DbConnector for FailingConnector {
        async fn execute(&self, _query: &DbQuery) -> Result<(Vec<String>, Vec<Vec<String>>), DbExecutionError> {
            Err(DbExecutionError::Driver("syntax error".to_string()))
        }
    }

    fn query(id: &str) -> DbQuery {
        DbQuery {
            database_id: id.to_string(),
            connection_string: format!("{id}.db"),
            sql: "SELECT 1".to_string(),
            max_rows: 100,
        }
    }

    #[tokio::test]
    async fn runs_queries_concurrently_and_settles_all() {
        let mut connectors: HashMap<String, Arc<dyn DbConnector>> = HashMap::new();
        connectors.insert("sqlite".to_string(), Arc::new(SlowConnector(Duration::from_millis(5))));
        let executor = DatabaseExecutor::new(connectors, Duration::from_secs(5));

        let results = executor
            .execute_all(
                vec![(query("a"), "sqlite".to_string()), (query("b"), "sqlite".to_string())],
                CancellationToken::new(),
            )
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_peers() {
        let mut connectors: HashMap<String, Arc<dyn DbConnector>> = HashMap::new();
        connectors.insert("sqlite".to_string(), Arc::new(FailingConnector));
        connectors.insert("pg".to_string(), Arc::new(SlowConnector(Duration::from_millis(1))));
        let executor = DatabaseExecutor::new(connectors, Duration::from_secs(5));

        let results = executor
            .execute_all(
                vec![(query("a"), "sqlite".to_string()), (query("b"), "pg".to_string())],
                CancellationToken::new(),
            )
            .await;
        assert_eq!(results.len(), 2);
        let a = results.iter().find(|r| r.database_id == "a").unwrap();
        let b = results.iter().find(|r| r.database_id == "b").unwrap();
        assert!(!a.success);
        assert!(b.success);
    }

    #[tokio::test]
    async fn timeout_marks_failure_without_panicking() {
        let mut connectors: HashMap<String, Arc<dyn DbConnector>> = HashMap::new();
        connectors.insert("sqlite".to_string(), Arc::new(SlowConnector(Duration::from_millis(50))));
        let executor = DatabaseExecutor::new(connectors, Duration::from_millis(5));

        let results = executor.execute_all(vec![(query("a"), "sqlite".to_string())], CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn cancellation_marks_results_cancelled() {
        let mut connectors: HashMap<String, Arc<dyn DbConnector>> = HashMap::new();
        connectors.insert("sqlite".to_string(), Arc::new(SlowConnector(Duration::from_secs(5))));
        let executor = DatabaseExecutor::new(connectors, Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = executor.execute_all(vec![(query("a"), "sqlite".to_string())], cancel).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].cancelled);
    }

    #[tokio::test]
    async fn missing_connector_yields_failed_result() {
        let executor = DatabaseExecutor::new(HashMap::new(), Duration::from_secs(5));
        let results = executor.execute_all(vec![(query("a"), "oracle".to_string())], CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }
}
