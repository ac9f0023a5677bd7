//! SQL generation: per-dialect strategies plus the AI-driven generator that
//! turns a [`crate::model::DatabaseQueryIntent`] into validated SQL (spec §4.4).

pub mod dialect;
pub mod generator;

pub use dialect::{PostgreSqlDialect, SqlDialect, SqlFeatures, SqliteDialect, SqlServerDialect, MySqlDialect, dialect_strategy};
pub use generator::SqlGenerator;
