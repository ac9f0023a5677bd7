//! `DatabaseSchema`: cached metadata for one configured database.

use serde::{Deserialize, Serialize};

/// The SQL syntax family of a configured database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Dialect {
    /// Embedded SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    SqlServer,
    /// MySQL / MariaDB.
    MySql,
    /// PostgreSQL.
    PostgreSql,
}

/// A column in a [`Table`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name, in the casing the database reports it.
    pub name: String,
    /// Database-reported type name (dialect-specific, e.g. `"varchar"`, `"INTEGER"`).
    pub data_type: String,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
    /// Maximum length/precision, if the type carries one (text/varchar columns).
    pub max_length: Option<u32>,
    /// Whether this column is (part of) the table's primary key.
    pub is_primary_key: bool,
    /// Whether this column participates in a foreign key.
    pub is_foreign_key: bool,
}

/// A foreign key: a column referencing another table's column.
///
/// `referenced_table` is only guaranteed to resolve to an existing table
/// within the same [`DatabaseSchema`]; a foreign key recorded via
/// [`crate::model::CrossDatabaseMapping`] that points at a different database
/// keeps `referenced_table` as a literal string that will not resolve here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// The column on this table that holds the reference.
    pub column: String,
    /// The referenced table's qualified name.
    pub referenced_table: String,
    /// The referenced column name.
    pub referenced_column: String,
}

/// One table in a [`DatabaseSchema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Qualified table name (schema-qualified where the dialect supports it).
    pub name: String,
    /// Ordered column list, as reported by the database.
    pub columns: Vec<Column>,
    /// Foreign keys declared on this table.
    pub foreign_keys: Vec<ForeignKey>,
    /// Estimated row count (`SELECT COUNT(*)` at analysis time).
    pub row_count_estimate: u64,
    /// Up to 3 sample rows, pre-formatted as dialect-quoted display text.
    pub sample_rows: Vec<String>,
}

impl Table {
    /// Finds a column by case-insensitive name, returning it with its exact stored casing.
    #[must_use]
    pub fn find_column_ci(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns columns whose type looks like free text and which are not PK/FK —
    /// the "descriptive column" heuristic used by the merger's missing-target retry
    /// (see [`crate::merger`]) when schema type information is unavailable.
    #[must_use]
    pub fn descriptive_columns(&self, limit: usize) -> Vec<&Column> {
        let is_text_like = |c: &Column| {
            let ty = c.data_type.to_ascii_lowercase();
            ty.contains("char") || ty.contains("text") || ty.contains("clob")
        };

        let mut by_type: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| !c.is_primary_key && !c.is_foreign_key)
            .filter(|c| is_text_like(c) && c.max_length.is_none_or(|len| len > 10))
            .collect();

        if by_type.is_empty() {
            const NAME_HINTS: [&str; 6] = ["name", "title", "description", "city", "address", "label"];
            by_type = self
                .columns
                .iter()
                .filter(|c| !c.is_primary_key && !c.is_foreign_key)
                .filter(|c| {
                    let lower = c.name.to_ascii_lowercase();
                    NAME_HINTS.iter().any(|hint| lower.contains(hint))
                })
                .collect();
        }

        if by_type.is_empty() {
            by_type = self
                .columns
                .iter()
                .filter(|c| !c.is_primary_key && !c.is_foreign_key)
                .collect();
        }

        by_type.truncate(limit);
        by_type
    }
}

/// Status of a schema analysis attempt, per [`crate::schema_registry::SchemaRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchemaStatus {
    /// Analysis succeeded; the schema is usable for SQL generation.
    Ready,
    /// Analysis failed (connection refused, auth failure, database missing, ...).
    ///
    /// The registry entry is still present with an empty table list so
    /// downstream routing can skip this database rather than erroring out.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Cached metadata for one configured database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// Stable id: the connection's configured name, or derived from `{dialect}:{database}` if absent.
    pub id: String,
    /// The database's SQL dialect.
    pub dialect: Dialect,
    /// Database name as reported by the connection.
    pub database_name: String,
    /// Tables discovered during analysis (empty when `status` is `Failed`).
    pub tables: Vec<Table>,
    /// Result of the most recent analysis attempt.
    pub status: SchemaStatus,
}

impl DatabaseSchema {
    /// Derives a stable schema id from an optional configured name, the dialect, and database name.
    #[must_use]
    pub fn derive_id(name: Option<&str>, dialect: Dialect, database_name: &str) -> String {
        name.map(str::to_string)
            .unwrap_or_else(|| format!("{dialect:?}:{database_name}"))
    }

    /// Finds a table by case-insensitive name, returning it with its exact stored casing.
    #[must_use]
    pub fn find_table_ci(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Returns `true` if analysis succeeded and the schema can be queried.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, SchemaStatus::Ready)
    }
}
