//! Intent Analyzer (spec §4.3): decides whether a query should hit
//! databases, documents, or both, and which tables matter.
//!
//! Builds a prompt that enumerates the available context, asks the model for
//! a structured emission, and parses the reply defensively.

use crate::ai::AiProvider;
use crate::model::{ConversationTurn, DatabaseQueryIntent, DatabaseSchema, Intent, Strategy};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Sentinel the AI emits when it can confidently say no source can answer the query.
pub const NO_ANSWER_FOUND: &str = "[NO_ANSWER_FOUND]";

/// Characters forbidden in validated English-SQL identifiers/purpose text
/// that nonetheless get flagged (not rejected) for the SQL generator's retry
/// prompt (spec §4.3).
const NON_ENGLISH_CHARS: &[char] = &[
    'ç', 'ğ', 'ı', 'ö', 'ş', 'ü', 'ä', 'ß', // Turkish + German
];

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default)]
    database_intents: Vec<RawDatabaseIntent>,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct RawDatabaseIntent {
    database_id: String,
    #[serde(default)]
    required_tables: Vec<String>,
    #[serde(default)]
    purpose: String,
    #[serde(default)]
    priority: u8,
}

/// Analyzes a user query against the configured databases and produces a
/// validated [`Intent`].
pub struct IntentAnalyzer {
    provider: Arc<dyn AiProvider>,
}

impl IntentAnalyzer {
    /// Creates an analyzer backed by `provider`.
    #[must_use]
    pub const fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    /// Analyzes `query` against `schemas`, using `history` as conversational context.
    ///
    /// # Errors
    ///
    /// Returns an error if the AI provider call fails; a malformed (but
    /// successfully returned) reply degrades to an empty, low-confidence
    /// intent rather than erroring.
    pub async fn analyze(&self, query: &str, schemas: &[DatabaseSchema], history: &[ConversationTurn]) -> crate::error::Result<Intent> {
        let prompt = build_prompt(query, schemas, history);
        let response = self.provider.generate_response(SYSTEM_PROMPT, &prompt).await?;

        if response.trim() == NO_ANSWER_FOUND {
            return Ok(Intent {
                query: query.to_string(),
                database_intents: Vec::new(),
                confidence: 0.0,
                strategy: Strategy::DocumentOnly,
                explicit_negation: true,
            });
        }

        let raw = match parse_raw(&response) {
            Some(raw) => raw,
            None => {
                warn!(response = %response, "intent analyzer could not parse AI reply; degrading to document-only");
                return Ok(Intent {
                    query: query.to_string(),
                    database_intents: Vec::new(),
                    confidence: 0.0,
                    strategy: Strategy::DocumentOnly,
                    explicit_negation: false,
                });
            }
        };

        let database_intents = validate(raw.database_intents, schemas);
        let strategy = Intent::select_strategy(raw.confidence, !database_intents.is_empty());

        Ok(Intent {
            query: query.to_string(),
            database_intents,
            confidence: raw.confidence,
            strategy,
            explicit_negation: false,
        })
    }
}

const SYSTEM_PROMPT: &str = "You are a query intent analyzer. Reply ONLY with a JSON object of the \
shape {\"database_intents\": [{\"database_id\": \"...\", \"required_tables\": [\"...\"], \"purpose\": \"...\", \
\"priority\": 1}], \"confidence\": 0.0} or the literal token [NO_ANSWER_FOUND] if no available source \
could possibly answer the query.";

fn build_prompt(query: &str, schemas: &[DatabaseSchema], history: &[ConversationTurn]) -> String {
    let mut prompt = format!("User query: {query}\n\nAvailable databases:\n");
    for schema in schemas {
        if !schema.is_ready() {
            continue;
        }
        prompt.push_str(&format!("- {} ({:?}): ", schema.id, schema.dialect));
        let tables: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        prompt.push_str(&tables.join(", "));
        prompt.push('\n');
    }

    if !history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for turn in history {
            prompt.push_str(&format!("{:?}: {}\n", turn.role, turn.text));
        }
    }

    prompt.push_str(
        "\nDecide which databases (if any) and which of their tables are needed to answer the \
         query, and how confident you are that databases (as opposed to documents) are the right \
         source. Respond with the JSON object described in your instructions, or the negation token.\n",
    );
    prompt
}

fn parse_raw(response: &str) -> Option<RawIntent> {
    let trimmed = response.trim();
    let json_slice = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).map_or(trimmed, |rest| {
        rest.strip_suffix("```").unwrap_or(rest)
    });
    serde_json::from_str(json_slice.trim()).ok()
}

/// Validation pass (spec §4.3): drops nonexistent tables, relocates
/// hallucinated-but-elsewhere tables, drops now-empty intents, and flags
/// non-English characters for the SQL generator's retry prompt.
fn validate(raw: Vec<RawDatabaseIntent>, schemas: &[DatabaseSchema]) -> Vec<DatabaseQueryIntent> {
    let mut by_database: std::collections::HashMap<String, DatabaseQueryIntent> = std::collections::HashMap::new();

    for entry in raw {
        let has_non_english = contains_non_english(&entry.purpose)
            || entry.required_tables.iter().any(|t| contains_non_english(t));

        let Some(schema) = schemas.iter().find(|s| s.id == entry.database_id) else {
            // Unknown database entirely: try to relocate each table to wherever it actually exists.
            relocate(&entry.required_tables, &entry.purpose, entry.priority, has_non_english, schemas, &mut by_database);
            continue;
        };

        let mut kept_tables = Vec::new();
        let mut orphaned_tables = Vec::new();
        for table in &entry.required_tables {
            if let Some(found) = schema.find_table_ci(table) {
                kept_tables.push(found.name.clone());
            } else {
                orphaned_tables.push(table.clone());
            }
        }

        if !orphaned_tables.is_empty() {
            relocate(&orphaned_tables, &entry.purpose, entry.priority, has_non_english, schemas, &mut by_database);
        }

        if !kept_tables.is_empty() {
            let intent = by_database.entry(entry.database_id.clone()).or_insert_with(|| DatabaseQueryIntent {
                database_id: entry.database_id.clone(),
                required_tables: Vec::new(),
                purpose: entry.purpose.clone(),
                priority: entry.priority,
                has_non_english_hint: false,
            });
            for table in kept_tables {
                if !intent.required_tables.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
                    intent.required_tables.push(table);
                }
            }
            intent.has_non_english_hint |= has_non_english;
        }
    }

    by_database.into_values().filter(|i| !i.required_tables.is_empty()).collect()
}

fn relocate(
    tables: &[String],
    purpose: &str,
    priority: u8,
    has_non_english: bool,
    schemas: &[DatabaseSchema],
    by_database: &mut std::collections::HashMap<String, DatabaseQueryIntent>,
) {
    for table in tables {
        if let Some(schema) = schemas.iter().find(|s| s.find_table_ci(table).is_some()) {
            let found_name = schema.find_table_ci(table).map(|t| t.name.clone()).unwrap_or_else(|| table.clone());
            let intent = by_database.entry(schema.id.clone()).or_insert_with(|| DatabaseQueryIntent {
                database_id: schema.id.clone(),
                required_tables: Vec::new(),
                purpose: purpose.to_string(),
                priority,
                has_non_english_hint: false,
            });
            if !intent.required_tables.iter().any(|t| t.eq_ignore_ascii_case(&found_name)) {
                intent.required_tables.push(found_name);
            }
            intent.has_non_english_hint |= has_non_english;
        }
    }
}

fn contains_non_english(text: &str) -> bool {
    text.chars().any(|c| NON_ENGLISH_CHARS.contains(&c.to_ascii_lowercase()) || (!c.is_ascii() && c.is_alphabetic() && is_cyrillic(c)))
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiProvider;
    use crate::model::{Dialect, SchemaStatus, Table};

    fn schema(id: &str, tables: &[&str]) -> DatabaseSchema {
        DatabaseSchema {
            id: id.to_string(),
            dialect: Dialect::PostgreSql,
            database_name: id.to_string(),
            tables: tables
                .iter()
                .map(|t| Table {
                    name: (*t).to_string(),
                    columns: vec![],
                    foreign_keys: vec![],
                    row_count_estimate: 0,
                    sample_rows: vec![],
                })
                .collect(),
            status: SchemaStatus::Ready,
        }
    }

    #[tokio::test]
    async fn parses_valid_json_reply_into_database_only_strategy() {
        let provider = Arc::new(MockAiProvider::new(4).with_response(
            "recent orders",
            r#"{"database_intents":[{"database_id":"orders_db","required_tables":["Orders"],"purpose":"list orders","priority":1}],"confidence":0.9}"#,
        ));
        let analyzer = IntentAnalyzer::new(provider);
        let intent = analyzer.analyze("show me recent orders", &[schema("orders_db", &["Orders"])], &[]).await.unwrap();
        assert_eq!(intent.strategy, Strategy::DatabaseOnly);
        assert_eq!(intent.database_intents.len(), 1);
    }

    #[tokio::test]
    async fn explicit_negation_short_circuits() {
        let provider = Arc::new(MockAiProvider::new(4).with_response("asdf", NO_ANSWER_FOUND));
        let analyzer = IntentAnalyzer::new(provider);
        let intent = analyzer.analyze("asdf", &[], &[]).await.unwrap();
        assert!(intent.explicit_negation);
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_to_document_only() {
        let provider = Arc::new(MockAiProvider::new(4).with_response("hello", "not json at all"));
        let analyzer = IntentAnalyzer::new(provider);
        let intent = analyzer.analyze("hello", &[], &[]).await.unwrap();
        assert_eq!(intent.strategy, Strategy::DocumentOnly);
        assert!(intent.database_intents.is_empty());
    }

    #[test]
    fn validate_drops_nonexistent_table() {
        let raw = vec![RawDatabaseIntent {
            database_id: "orders_db".to_string(),
            required_tables: vec!["NoSuchTable".to_string()],
            purpose: "p".to_string(),
            priority: 1,
        }];
        let result = validate(raw, &[schema("orders_db", &["Orders"])]);
        assert!(result.is_empty());
    }

    #[test]
    fn validate_relocates_table_found_in_different_database() {
        let raw = vec![RawDatabaseIntent {
            database_id: "wrong_db".to_string(),
            required_tables: vec!["customers".to_string()],
            purpose: "p".to_string(),
            priority: 1,
        }];
        let schemas = vec![schema("orders_db", &["Orders"]), schema("crm_db", &["Customers"])];
        let result = validate(raw, &schemas);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].database_id, "crm_db");
        assert_eq!(result[0].required_tables[0], "Customers");
    }

    #[test]
    fn validate_flags_non_english_characters() {
        let raw = vec![RawDatabaseIntent {
            database_id: "orders_db".to_string(),
            required_tables: vec!["Orders".to_string()],
            purpose: "müşteri siparişleri".to_string(),
            priority: 1,
        }];
        let result = validate(raw, &[schema("orders_db", &["Orders"])]);
        assert!(result[0].has_non_english_hint);
    }
}
