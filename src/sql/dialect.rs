//! Per-dialect SQL syntax and prompt strategy (spec §4.4).
//!
//! Each [`crate::model::Dialect`] gets a [`SqlDialect`] implementation
//! supplying the bits the SQL generator needs to both prompt the AI
//! correctly and quote/paginate the resulting statement: a system-prompt
//! preamble, an identifier quoting rule, the `LIMIT`/`TOP` clause shape,
//! and dialect-specific validation (e.g. PostgreSQL's case-sensitive
//! double-quoted identifiers).

use crate::model::{Dialect, Table};

/// SQL syntax features that vary across dialects, surfaced to the prompt
/// builder so it can mention only what the target database supports.
#[derive(Debug, Clone, Copy)]
pub struct SqlFeatures {
    /// Supports `WITH` common table expressions.
    pub supports_cte: bool,
    /// Supports window functions (`ROW_NUMBER() OVER (...)`, etc.).
    pub supports_window_functions: bool,
    /// Identifiers are case-sensitive when quoted.
    pub case_sensitive_identifiers: bool,
}

/// Dialect-specific SQL syntax and safety strategy.
///
/// Implementations must be `Send + Sync`: the SQL generator holds them
/// behind `Arc<dyn SqlDialect>` shared across concurrent per-database
/// generation tasks (spec §4.5).
pub trait SqlDialect: Send + Sync {
    /// The dialect this strategy handles.
    fn dialect(&self) -> Dialect;

    /// Display name used in prompts (e.g. `"PostgreSQL"`).
    fn name(&self) -> &'static str;

    /// System-prompt preamble teaching the AI this dialect's syntax and safety rules.
    fn system_prompt(&self) -> String;

    /// Syntax features this dialect supports.
    fn features(&self) -> SqlFeatures;

    /// Dialect-specific SQL validation beyond the cross-dialect safety rules
    /// the generator already applies (forbidden keywords, SELECT-only).
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason the statement is invalid for this dialect.
    fn validate_sql(&self, sql: &str) -> Result<(), String>;

    /// Quotes an identifier per this dialect's rules.
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Renders a `LIMIT`/`TOP`-equivalent clause for `limit` rows.
    fn limit_clause(&self, limit: u32) -> String;

    /// Formats one table's schema for inclusion in a prompt.
    fn format_table(&self, table: &Table) -> String {
        let mut out = format!("Table: {}\n", self.quote_identifier(&table.name));
        for col in &table.columns {
            let mut line = format!("  - {} ({})", col.name, col.data_type);
            if col.is_primary_key {
                line.push_str(" PRIMARY KEY");
            }
            if col.is_foreign_key {
                line.push_str(" FOREIGN KEY");
            }
            if !col.nullable {
                line.push_str(" NOT NULL");
            }
            line.push('\n');
            out.push_str(&line);
        }
        out
    }
}

/// PostgreSQL dialect strategy.
pub struct PostgreSqlDialect;

impl SqlDialect for PostgreSqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn system_prompt(&self) -> String {
        "You are an expert PostgreSQL query generator. Generate ONLY a single read-only \
         SELECT statement: no explanations, no markdown fences, no DDL or DML. \
         PostgreSQL identifiers are case-sensitive only when double-quoted; prefer \
         unquoted lowercase identifiers unless the schema shows mixed case. \
         Use CTEs and window functions where they simplify the query."
            .to_string()
    }

    fn features(&self) -> SqlFeatures {
        SqlFeatures {
            supports_cte: true,
            supports_window_functions: true,
            case_sensitive_identifiers: true,
        }
    }

    fn validate_sql(&self, sql: &str) -> Result<(), String> {
        if sql.contains('`') {
            return Err("PostgreSQL does not use backtick identifiers".to_string());
        }
        Ok(())
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        if identifier.chars().any(char::is_uppercase) || identifier.contains(['-', ' ']) {
            format!("\"{}\"", identifier.replace('"', "\"\""))
        } else {
            identifier.to_string()
        }
    }

    fn limit_clause(&self, limit: u32) -> String {
        format!("LIMIT {limit}")
    }
}

/// MySQL / MariaDB dialect strategy.
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn system_prompt(&self) -> String {
        "You are an expert MySQL query generator. Generate ONLY a single read-only \
         SELECT statement: no explanations, no markdown fences, no DDL or DML. \
         Quote identifiers with backticks only when they contain special characters \
         or reserved words. Use LIMIT offset, count for pagination."
            .to_string()
    }

    fn features(&self) -> SqlFeatures {
        SqlFeatures {
            supports_cte: true,
            supports_window_functions: true,
            case_sensitive_identifiers: false,
        }
    }

    fn validate_sql(&self, sql: &str) -> Result<(), String> {
        if sql.contains('"') {
            return Err("use backticks, not double quotes, for MySQL identifiers".to_string());
        }
        Ok(())
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn limit_clause(&self, limit: u32) -> String {
        format!("LIMIT {limit}")
    }
}

/// Microsoft SQL Server dialect strategy.
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn system_prompt(&self) -> String {
        "You are an expert Microsoft SQL Server (T-SQL) query generator. Generate ONLY \
         a single read-only SELECT statement: no explanations, no markdown fences, no \
         DDL or DML. Use TOP (n) for row limiting, never LIMIT. Quote identifiers with \
         square brackets only when necessary."
            .to_string()
    }

    fn features(&self) -> SqlFeatures {
        SqlFeatures {
            supports_cte: true,
            supports_window_functions: true,
            case_sensitive_identifiers: false,
        }
    }

    fn validate_sql(&self, sql: &str) -> Result<(), String> {
        let upper = sql.to_uppercase();
        if upper.contains("LIMIT ") {
            return Err("SQL Server uses TOP (n), not LIMIT".to_string());
        }
        Ok(())
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("[{identifier}]")
    }

    fn limit_clause(&self, limit: u32) -> String {
        format!("TOP ({limit})")
    }
}

/// Embedded SQLite dialect strategy.
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn system_prompt(&self) -> String {
        "You are an expert SQLite query generator. Generate ONLY a single read-only \
         SELECT statement: no explanations, no markdown fences, no DDL or DML. SQLite \
         has dynamic typing; prefer simple joins and avoid features SQLite lacks \
         (no RIGHT/FULL OUTER JOIN, no stored procedures)."
            .to_string()
    }

    fn features(&self) -> SqlFeatures {
        SqlFeatures {
            supports_cte: true,
            supports_window_functions: true,
            case_sensitive_identifiers: false,
        }
    }

    fn validate_sql(&self, sql: &str) -> Result<(), String> {
        let upper = sql.to_uppercase();
        if upper.contains("RIGHT JOIN") || upper.contains("FULL OUTER JOIN") {
            return Err("SQLite does not support RIGHT/FULL OUTER JOIN".to_string());
        }
        Ok(())
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn limit_clause(&self, limit: u32) -> String {
        format!("LIMIT {limit}")
    }
}

/// Returns the [`SqlDialect`] strategy for a given dialect.
#[must_use]
pub fn dialect_strategy(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::PostgreSql => Box::new(PostgreSqlDialect),
        Dialect::MySql => Box::new(MySqlDialect),
        Dialect::SqlServer => Box::new(SqlServerDialect),
        Dialect::Sqlite => Box::new(SqliteDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_quotes_mixed_case_identifiers() {
        let dialect = PostgreSqlDialect;
        assert_eq!(dialect.quote_identifier("customers"), "customers");
        assert_eq!(dialect.quote_identifier("Customers"), "\"Customers\"");
    }

    #[test]
    fn mysql_always_backtick_quotes() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.quote_identifier("customers"), "`customers`");
    }

    #[test]
    fn sql_server_rejects_limit_keyword() {
        let dialect = SqlServerDialect;
        assert!(dialect.validate_sql("SELECT TOP (10) * FROM customers").is_ok());
        assert!(dialect.validate_sql("SELECT * FROM customers LIMIT 10").is_err());
    }

    #[test]
    fn sqlite_rejects_full_outer_join() {
        let dialect = SqliteDialect;
        assert!(dialect.validate_sql("SELECT * FROM a JOIN b ON a.id = b.id").is_ok());
        assert!(dialect.validate_sql("SELECT * FROM a FULL OUTER JOIN b ON a.id = b.id").is_err());
    }

    #[test]
    fn dialect_strategy_resolves_all_four_dialects() {
        assert_eq!(dialect_strategy(Dialect::PostgreSql).dialect(), Dialect::PostgreSql);
        assert_eq!(dialect_strategy(Dialect::MySql).dialect(), Dialect::MySql);
        assert_eq!(dialect_strategy(Dialect::SqlServer).dialect(), Dialect::SqlServer);
        assert_eq!(dialect_strategy(Dialect::Sqlite).dialect(), Dialect::Sqlite);
    }

    #[test]
    fn limit_clause_shape_differs_by_dialect() {
        assert_eq!(PostgreSqlDialect.limit_clause(5), "LIMIT 5");
        assert_eq!(SqlServerDialect.limit_clause(5), "TOP (5)");
    }
}
