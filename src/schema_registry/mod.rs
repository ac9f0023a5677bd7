//! Schema Registry (spec §4.1): discovers and caches metadata for every
//! configured database.
//!
//! Concrete introspection is implemented for the SQLite dialect via
//! `rusqlite`; the three network dialects (`SqlServer`/`MySQL`/`PostgreSQL`)
//! get their metadata-query banks specified as data behind the
//! [`SchemaIntrospector`] trait so an operator plugs in whichever driver
//! their deployment uses.

mod sqlite_introspector;

pub use sqlite_introspector::SqliteIntrospector;

use crate::error::{Error, Result, SchemaError};
use crate::model::{CrossDatabaseMapping, DatabaseSchema, Dialect, SchemaStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// One configured database connection (spec §6 "Database Connection Config").
#[derive(Debug, Clone)]
pub struct DatabaseConnectionConfig {
    /// Operator-assigned name; if absent the registry derives an id from dialect + database name.
    pub name: Option<String>,
    /// Driver-specific connection string (a file path for SQLite).
    pub connection_string: String,
    /// The database's SQL dialect.
    pub dialect: Dialect,
    /// Whether this connection is analyzed and queried.
    pub enabled: bool,
    /// If non-empty, only these tables are introspected.
    pub included_tables: Vec<String>,
    /// Tables to skip during introspection even if `included_tables` is empty.
    pub excluded_tables: Vec<String>,
    /// Row cap applied by the executor for queries against this database.
    pub max_rows_per_query: u32,
    /// Operator-declared cross-database join aliases touching this database.
    pub cross_database_mappings: Vec<CrossDatabaseMapping>,
    /// Optional human-readable description surfaced to the intent analyzer's prompt.
    pub description: Option<String>,
}

impl DatabaseConnectionConfig {
    /// The stable registry id for this connection (spec §3 `DatabaseSchema.id`).
    #[must_use]
    pub fn id(&self, database_name: &str) -> String {
        DatabaseSchema::derive_id(self.name.as_deref(), self.dialect, database_name)
    }

    fn table_allowed(&self, table: &str) -> bool {
        let excluded = self.excluded_tables.iter().any(|t| t.eq_ignore_ascii_case(table));
        if excluded {
            return false;
        }
        self.included_tables.is_empty() || self.included_tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }
}

/// Per-dialect metadata introspection (spec §4.1's "dialect-specific metadata queries").
///
/// Implementations must be `Send + Sync`: the registry's `initialize` runs
/// one introspection per configured connection concurrently.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// The dialect this introspector serves.
    fn dialect(&self) -> Dialect;

    /// Connects (transiently) and builds the full [`DatabaseSchema`] for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] on connection failure, auth failure, or a
    /// failed metadata query. Per spec §4.1 the registry converts this into
    /// a `Failed`-status entry rather than propagating.
    async fn analyze(&self, config: &DatabaseConnectionConfig) -> Result<DatabaseSchema, SchemaError>;
}

/// Caches [`DatabaseSchema`] for every configured database (spec §4.1).
///
/// Readers are lock-free after initialization (`DashMap`); `refresh`
/// replaces one entry atomically without disturbing readers of others
/// (spec §5).
pub struct SchemaRegistry {
    connections: Vec<(String, DatabaseConnectionConfig)>,
    introspectors: Vec<Arc<dyn SchemaIntrospector>>,
    cache: DashMap<String, DatabaseSchema>,
}

impl SchemaRegistry {
    /// Creates a registry over `connections`, resolved against `introspectors`
    /// by dialect. Connections with `enabled = false` are recorded but never analyzed.
    #[must_use]
    pub fn new(connections: Vec<DatabaseConnectionConfig>, introspectors: Vec<Arc<dyn SchemaIntrospector>>) -> Self {
        let connections = connections
            .into_iter()
            .map(|c| {
                // database_name is not known before analysis for most dialects; use the
                // connection string as a stand-in database-name component for id derivation
                // when no operator name was given (matches spec §3: "type+database-name").
                let id = c.id(&c.connection_string);
                (id, c)
            })
            .collect();
        Self {
            connections,
            introspectors,
            cache: DashMap::new(),
        }
    }

    fn introspector_for(&self, dialect: Dialect) -> Option<&Arc<dyn SchemaIntrospector>> {
        self.introspectors.iter().find(|i| i.dialect() == dialect)
    }

    /// Analyzes every enabled connection in parallel, populating the cache.
    ///
    /// Per-database failures are recorded as `SchemaStatus::Failed` entries
    /// and do not abort analysis of the remaining connections (spec §4.1):
    /// each enabled connection runs as its own task, mirroring the
    /// parallel-fan-out-with-independent-failure shape used by the
    /// [`crate::executor::DatabaseExecutor`] for the analogous query stage.
    pub async fn initialize(&self) {
        let mut set = tokio::task::JoinSet::new();
        for (id, config) in &self.connections {
            if !config.enabled {
                continue;
            }
            let id = id.clone();
            let config = config.clone();
            let introspector = self.introspector_for(config.dialect).cloned();
            set.spawn(async move { (id.clone(), analyze(&id, &config, introspector).await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, schema)) => {
                    self.cache.insert(id, schema);
                }
                Err(err) => tracing::warn!(error = %err, "schema analysis task panicked"),
            }
        }
    }

    async fn analyze_one(&self, id: &str, config: &DatabaseConnectionConfig) {
        let introspector = self.introspector_for(config.dialect).cloned();
        let schema = analyze(id, config, introspector).await;
        self.cache.insert(id.to_string(), schema);
    }

    /// Returns the cached schema for `id`, if analyzed.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<DatabaseSchema> {
        self.cache.get(id).map(|entry| entry.value().clone())
    }

    /// Returns every cached schema.
    #[must_use]
    pub fn get_all(&self) -> Vec<DatabaseSchema> {
        self.cache.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Re-runs analysis for a single connection by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `id` is not a configured connection.
    pub async fn refresh(&self, id: &str) -> Result<()> {
        let Some((_, config)) = self.connections.iter().find(|(cid, _)| cid == id) else {
            return Err(Error::Schema(SchemaError::Unreachable {
                database_id: id.to_string(),
                reason: "not a configured connection".to_string(),
            }));
        };
        self.analyze_one(id, config).await;
        Ok(())
    }

    /// Returns every cross-database mapping touching `database_id`/`table`,
    /// across all configured connections (used by the merger, spec §4.6 step B.1).
    #[must_use]
    pub fn mappings_touching(&self, database_id: &str, table: &str) -> Vec<CrossDatabaseMapping> {
        self.connections
            .iter()
            .flat_map(|(_, c)| c.cross_database_mappings.iter())
            .filter(|m| m.touches(database_id, table))
            .cloned()
            .collect()
    }

    /// Returns every configured connection id, enabled or not.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<String> {
        self.connections.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Returns the configuration for a connection by id, used by the merger's
    /// missing-target retry to build a fresh query against that database
    /// (spec §4.6 step C).
    #[must_use]
    pub fn connection_config(&self, id: &str) -> Option<&DatabaseConnectionConfig> {
        self.connections.iter().find(|(cid, _)| cid == id).map(|(_, c)| c)
    }

    /// Returns every cross-database mapping across all configured connections.
    #[must_use]
    pub fn all_mappings(&self) -> Vec<CrossDatabaseMapping> {
        self.connections
            .iter()
            .flat_map(|(_, c)| c.cross_database_mappings.iter())
            .cloned()
            .collect()
    }
}

async fn analyze(id: &str, config: &DatabaseConnectionConfig, introspector: Option<Arc<dyn SchemaIntrospector>>) -> DatabaseSchema {
    match introspector {
        Some(introspector) => match introspector.analyze(config).await {
            Ok(mut schema) => {
                schema.tables.retain(|t| config.table_allowed(&t.name));
                schema
            }
            Err(err) => failed_schema(id, config.dialect, &err.to_string()),
        },
        None => failed_schema(id, config.dialect, &format!("no schema introspector registered for {:?}", config.dialect)),
    }
}

fn failed_schema(id: &str, dialect: Dialect, reason: &str) -> DatabaseSchema {
    DatabaseSchema {
        id: id.to_string(),
        dialect,
        database_name: id.to_string(),
        tables: Vec::new(),
        status: SchemaStatus::Failed {
            reason: reason.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Table};

    struct FailingIntrospector(Dialect);

    #[async_trait]
    impl SchemaIntrospector for FailingIntrospector {
        fn dialect(&self) -> Dialect {
            self.0
        }

        async fn analyze(&self, config: &DatabaseConnectionConfig) -> Result<DatabaseSchema, SchemaError> {
            Err(SchemaError::Unreachable {
                database_id: config.connection_string.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct WorkingIntrospector(Dialect);

    #[async_trait]
    impl SchemaIntrospector for WorkingIntrospector {
        fn dialect(&self) -> Dialect {
            self.0
        }

        async fn analyze(&self, config: &DatabaseConnectionConfig) -> Result<DatabaseSchema, SchemaError> {
            Ok(DatabaseSchema {
                id: config.id(&config.connection_string),
                dialect: self.0,
                database_name: config.connection_string.clone(),
                tables: vec![
                    Table {
                        name: "Orders".to_string(),
                        columns: vec![Column {
                            name: "Id".to_string(),
                            data_type: "int".to_string(),
                            nullable: false,
                            max_length: None,
                            is_primary_key: true,
                            is_foreign_key: false,
                        }],
                        foreign_keys: vec![],
                        row_count_estimate: 1,
                        sample_rows: vec![],
                    },
                    Table {
                        name: "Internal".to_string(),
                        columns: vec![],
                        foreign_keys: vec![],
                        row_count_estimate: 0,
                        sample_rows: vec![],
                    },
                ],
                status: SchemaStatus::Ready,
            })
        }
    }

    fn connection(name: &str, dialect: Dialect) -> DatabaseConnectionConfig {
        DatabaseConnectionConfig {
            name: Some(name.to_string()),
            connection_string: format!("{name}.db"),
            dialect,
            enabled: true,
            included_tables: Vec::new(),
            excluded_tables: Vec::new(),
            max_rows_per_query: 100,
            cross_database_mappings: Vec::new(),
            description: None,
        }
    }

    #[tokio::test]
    async fn failed_connection_yields_failed_status_without_aborting_others() {
        let registry = SchemaRegistry::new(
            vec![connection("a", Dialect::Sqlite), connection("b", Dialect::PostgreSql)],
            vec![
                Arc::new(FailingIntrospector(Dialect::Sqlite)),
                Arc::new(WorkingIntrospector(Dialect::PostgreSql)),
            ],
        );
        registry.initialize().await;

        let a = registry.get("a").unwrap();
        assert!(!a.is_ready());
        let b = registry.get("b").unwrap();
        assert!(b.is_ready());
    }

    #[tokio::test]
    async fn excluded_tables_are_filtered_out() {
        let mut conn = connection("a", Dialect::PostgreSql);
        conn.excluded_tables.push("Internal".to_string());
        let registry = SchemaRegistry::new(vec![conn], vec![Arc::new(WorkingIntrospector(Dialect::PostgreSql))]);
        registry.initialize().await;

        let schema = registry.get("a").unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].name, "Orders");
    }

    #[tokio::test]
    async fn disabled_connection_is_never_analyzed() {
        let mut conn = connection("a", Dialect::Sqlite);
        conn.enabled = false;
        let registry = SchemaRegistry::new(vec![conn], vec![Arc::new(FailingIntrospector(Dialect::Sqlite))]);
        registry.initialize().await;
        assert!(registry.get("a").is_none());
    }

    #[tokio::test]
    async fn refresh_unknown_connection_errors() {
        let registry = SchemaRegistry::new(Vec::new(), Vec::new());
        assert!(registry.refresh("nope").await.is_err());
    }

    #[test]
    fn mappings_touching_filters_by_endpoint() {
        use crate::model::MappingEndpoint;
        let mapping = CrossDatabaseMapping {
            source: MappingEndpoint {
                database_id: "a".to_string(),
                table: "Orders".to_string(),
                column: "CustomerId".to_string(),
            },
            target: MappingEndpoint {
                database_id: "b".to_string(),
                table: "Customers".to_string(),
                column: "Id".to_string(),
            },
        };
        let mut conn = connection("a", Dialect::Sqlite);
        conn.cross_database_mappings.push(mapping);
        let registry = SchemaRegistry::new(vec![conn], Vec::new());
        assert_eq!(registry.mappings_touching("a", "Orders").len(), 1);
        assert_eq!(registry.mappings_touching("a", "NoTable").len(), 0);
    }
}
