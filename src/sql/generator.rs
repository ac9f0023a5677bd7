//! Generates validated, read-only SQL from a [`DatabaseQueryIntent`] (spec §4.4).

use super::dialect::{SqlDialect, dialect_strategy};
use crate::ai::AiProvider;
use crate::config::RetryConfig;
use crate::error::{Error, Result, SqlGenerationError};
use crate::model::{DatabaseQueryIntent, DatabaseSchema};
use regex::Regex;
use std::sync::Arc;

/// Keywords forbidden anywhere in a generated statement, checked as whole
/// tokens (case-insensitive) so e.g. a column named `updated_at` is not
/// flagged by `UPDATE`.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "CREATE", "DROP", "DELETE", "UPDATE", "INSERT", "EXEC", "EXECUTE", "GRANT", "REVOKE", "ALTER", "TRUNCATE",
    "MERGE",
];

/// Produces a single validated `SELECT` statement per database target.
pub struct SqlGenerator {
    provider: Arc<dyn AiProvider>,
    retry: RetryConfig,
}

impl SqlGenerator {
    /// Creates a generator backed by `provider`, retrying per `retry`.
    #[must_use]
    pub fn new(provider: Arc<dyn AiProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    /// Generates and validates SQL for one database target (spec §4.4 steps 1-5).
    ///
    /// # Errors
    ///
    /// Returns [`SqlGenerationError::UnsupportedDialect`] if no strategy
    /// exists for the schema's dialect, or
    /// [`SqlGenerationError::ValidationFailed`] after exhausting retries.
    pub async fn generate(
        &self,
        query: &str,
        intent: &DatabaseQueryIntent,
        schema: &DatabaseSchema,
    ) -> Result<String> {
        let dialect = dialect_strategy(schema.dialect);

        let mut last_violation = String::new();
        for attempt in 0..self.retry.max_retry_attempts {
            let prompt = if attempt == 0 {
                self.build_prompt(query, intent, schema, dialect.as_ref())
            } else {
                self.build_retry_prompt(query, intent, schema, dialect.as_ref(), &last_violation)
            };

            let response = self.provider.generate_response(&dialect.system_prompt(), &prompt).await?;
            let candidate = strip_fences(&response);

            match self.validate(&candidate, dialect.as_ref(), schema) {
                Ok(()) => return Ok(candidate),
                Err(reason) => last_violation = reason,
            }
        }

        Err(Error::SqlGeneration(SqlGenerationError::ValidationFailed {
            attempts: self.retry.max_retry_attempts,
            reason: last_violation,
        }))
    }

    fn build_prompt(&self, query: &str, intent: &DatabaseQueryIntent, schema: &DatabaseSchema, dialect: &dyn SqlDialect) -> String {
        let mut prompt = format!(
            "Database: {} ({})\nUser query: {}\nPurpose: {}\n\n",
            schema.database_name,
            dialect.name(),
            query,
            intent.purpose
        );

        let mut available_columns: Vec<String> = Vec::new();
        for table_name in &intent.required_tables {
            if let Some(table) = schema.find_table_ci(table_name) {
                prompt.push_str(&dialect.format_table(table));
                for sample in table.sample_rows.iter().take(3) {
                    prompt.push_str(&format!("  sample: {sample}\n"));
                }
                prompt.push('\n');
                available_columns.extend(table.columns.iter().map(|c| c.name.to_lowercase()));
            }
        }

        prompt.push_str(
            "Rules:\n\
             - Only SELECT is permitted; CREATE/DROP/DELETE/UPDATE/INSERT/EXEC/GRANT/REVOKE are forbidden.\n\
             - All non-aggregate selected columns must appear in GROUP BY when aggregates are used.\n\
             - CROSS JOIN is forbidden; use INNER JOIN or LEFT JOIN with an explicit ON clause.\n\
             - Use schema.table form only, never database.schema.table.\n\
             - Do not invent tables or columns that were not shown above.\n\
             - Always include primary key / id columns in SELECT for downstream joining.\n\
             - Output ONLY the SQL statement, no markdown fences, no explanation.\n",
        );

        let unmatched = unmatched_keywords(query, &available_columns);
        if !unmatched.is_empty() {
            prompt.push_str(&format!(
                "- These words from the user query do not match any listed column by substring: {}. \
                 Drop them from WHERE rather than guessing a column for them.\n",
                unmatched.join(", ")
            ));
        }

        prompt
    }

    fn build_retry_prompt(
        &self,
        query: &str,
        intent: &DatabaseQueryIntent,
        schema: &DatabaseSchema,
        dialect: &dyn SqlDialect,
        violation: &str,
    ) -> String {
        let mut prompt = self.build_prompt(query, intent, schema, dialect);
        prompt.push_str(&format!(
            "\nThe previous attempt was rejected: {violation}\nGenerate a corrected statement that fixes this.\n"
        ));
        prompt
    }

    /// Validates SQL against the cross-dialect safety rules plus the
    /// dialect's own rules (spec §4.4 step 4).
    fn validate(&self, sql: &str, dialect: &dyn SqlDialect, schema: &DatabaseSchema) -> std::result::Result<(), String> {
        let trimmed = sql.trim_start();
        if !trimmed.to_uppercase().starts_with("SELECT") {
            return Err("statement must start with SELECT".to_string());
        }

        let upper = sql.to_uppercase();
        for keyword in FORBIDDEN_KEYWORDS {
            if contains_whole_word(&upper, keyword) {
                return Err(format!("forbidden keyword {keyword} present"));
            }
        }

        if contains_whole_word(&upper, "CROSS JOIN") {
            return Err("CROSS JOIN is forbidden".to_string());
        }

        if sql.chars().any(|c| !c.is_ascii()) {
            return Err("non-English characters present in generated SQL".to_string());
        }

        dialect.validate_sql(sql)?;

        if schema.dialect == crate::model::Dialect::PostgreSql {
            for table in &schema.tables {
                let lower_name = table.name.to_lowercase();
                if sql.to_lowercase().contains(&lower_name) && !sql.contains(table.name.as_str()) && table.name != lower_name {
                    return Err(format!("table identifier case mismatch: expected {}", table.name));
                }
            }
        }

        Ok(())
    }
}

/// Common English words excluded from the unmatched-keyword check below:
/// not filter terms, so flagging them as "no matching column" would just
/// add noise to the prompt.
const QUERY_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "what", "show", "list", "find", "get", "me", "are", "was",
    "were", "all", "has", "have", "which", "who", "how", "many", "much", "please", "give",
];

/// Finds `query` words that substring-match no column name in `available_columns`
/// (spec §4.4 step 2): tokenizes the query, drops stopwords and short tokens,
/// and keeps only tokens that appear in no column name and that contain no
/// column name, in either direction and case-insensitively.
fn unmatched_keywords(query: &str, available_columns: &[String]) -> Vec<String> {
    let mut unmatched: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 2 && !QUERY_STOPWORDS.contains(&w.as_str()))
        .filter(|w| !available_columns.iter().any(|c| c.contains(w.as_str()) || w.contains(c.as_str())))
        .collect();
    unmatched.sort();
    unmatched.dedup();
    unmatched
}

/// Checks whether `needle` appears in `haystack` as a standalone word
/// (bounded by non-alphanumeric characters), not as a substring of a
/// longer identifier such as `updated_at` matching `UPDATE`.
fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(needle));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(haystack))
}

/// Strips a leading/trailing fenced code block (```` ``` ```` or ```` ```sql ````)
/// from an AI response, returning the inner SQL trimmed of whitespace.
fn strip_fences(response: &str) -> String {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("sql").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\n', '\r']);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
        return rest.trim().to_string();
    }
    trimmed.to_string()
}
