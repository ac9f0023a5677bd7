//! SQLite schema introspection via `rusqlite`: connection-open conventions
//! and `PRAGMA` queries for tables, columns, and foreign keys.

use super::{DatabaseConnectionConfig, SchemaIntrospector};
use crate::error::SchemaError;
use crate::model::{Column, DatabaseSchema, Dialect, ForeignKey, SchemaStatus, Table};
use async_trait::async_trait;
use rusqlite::Connection;

/// Introspects SQLite databases via `PRAGMA table_info`/`PRAGMA foreign_key_list`.
#[derive(Debug, Default)]
pub struct SqliteIntrospector;

impl SqliteIntrospector {
    /// Creates a new introspector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SchemaIntrospector for SqliteIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn analyze(&self, config: &DatabaseConnectionConfig) -> Result<DatabaseSchema, SchemaError> {
        let path = config.connection_string.clone();
        let id = config.id(&path);

        tokio::task::spawn_blocking(move || analyze_blocking(&id, &path))
            .await
            .map_err(|e| SchemaError::IntrospectionFailed {
                database_id: "unknown".to_string(),
                reason: format!("introspection task panicked: {e}"),
            })?
    }
}

fn analyze_blocking(id: &str, path: &str) -> Result<DatabaseSchema, SchemaError> {
    let conn = Connection::open(path).map_err(|e| SchemaError::Unreachable {
        database_id: id.to_string(),
        reason: e.to_string(),
    })?;

    let table_names = list_tables(&conn, id)?;
    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        tables.push(analyze_table(&conn, id, &name)?);
    }

    Ok(DatabaseSchema {
        id: id.to_string(),
        dialect: Dialect::Sqlite,
        database_name: path.to_string(),
        tables,
        status: SchemaStatus::Ready,
    })
}

fn list_tables(conn: &Connection, id: &str) -> Result<Vec<String>, SchemaError> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .map_err(|e| introspection_failed(id, e))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| introspection_failed(id, e))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| introspection_failed(id, e))
}

fn analyze_table(conn: &Connection, id: &str, name: &str) -> Result<Table, SchemaError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({name})"))
        .map_err(|e| introspection_failed(id, e))?;
    let columns = stmt
        .query_map([], |row| {
            let col_name: String = row.get(1)?;
            let data_type: String = row.get(2)?;
            let notnull: i64 = row.get(3)?;
            let pk: i64 = row.get(5)?;
            Ok(Column {
                name: col_name,
                data_type,
                nullable: notnull == 0,
                max_length: None,
                is_primary_key: pk != 0,
                is_foreign_key: false,
            })
        })
        .map_err(|e| introspection_failed(id, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| introspection_failed(id, e))?;

    let foreign_keys = list_foreign_keys(conn, id, name)?;
    let mut columns = columns;
    for fk in &foreign_keys {
        if let Some(col) = columns.iter_mut().find(|c| c.name == fk.column) {
            col.is_foreign_key = true;
        }
    }

    let row_count_estimate: u64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get::<_, i64>(0))
        .map_err(|e| introspection_failed(id, e))
        .map(|n| u64::try_from(n).unwrap_or(0))?;

    let sample_rows = sample_rows(conn, id, name, &columns)?;

    Ok(Table {
        name: name.to_string(),
        columns,
        foreign_keys,
        row_count_estimate,
        sample_rows,
    })
}

fn list_foreign_keys(conn: &Connection, id: &str, table: &str) -> Result<Vec<ForeignKey>, SchemaError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA foreign_key_list({table})"))
        .map_err(|e| introspection_failed(id, e))?;
    let rows = stmt
        .query_map([], |row| {
            let referenced_table: String = row.get(2)?;
            let column: String = row.get(3)?;
            let referenced_column: String = row.get(4)?;
            Ok(ForeignKey {
                column,
                referenced_table,
                referenced_column,
            })
        })
        .map_err(|e| introspection_failed(id, e))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| introspection_failed(id, e))
}

fn sample_rows(conn: &Connection, id: &str, table: &str, columns: &[Column]) -> Result<Vec<String>, SchemaError> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {table} LIMIT 3"))
        .map_err(|e| introspection_failed(id, e))?;
    let col_count = columns.len();
    let rows = stmt
        .query_map([], |row| {
            let values: Vec<String> = (0..col_count)
                .map(|i| row.get::<_, rusqlite::types::Value>(i).map(format_value).unwrap_or_default())
                .collect();
            Ok(values.join(", "))
        })
        .map_err(|e| introspection_failed(id, e))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| introspection_failed(id, e))
}

fn format_value(value: rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(_) => "<blob>".to_string(),
    }
}

fn introspection_failed(id: &str, err: rusqlite::Error) -> SchemaError {
    SchemaError::IntrospectionFailed {
        database_id: id.to_string(),
        reason: err.to_string(),
    }
}
