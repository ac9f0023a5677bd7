//! Answer Synthesizer (spec §4.7): produces the final natural-language
//! answer from merged evidence, with strict prompt discipline against
//! hallucinated data.

use crate::ai::AiProvider;
use crate::model::{Answer, MergedEvidence, Source, SourceType, DbResult, NOT_FOUND_MESSAGE};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Produces an [`Answer`] from a query plus its [`MergedEvidence`].
pub struct AnswerSynthesizer {
    provider: Arc<dyn AiProvider>,
}

impl AnswerSynthesizer {
    /// Creates a synthesizer backed by `provider`.
    #[must_use]
    pub const fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    /// Synthesizes an answer for `query` given `evidence`, optionally
    /// steering the reply language with `preferred_language` (spec §4.7).
    ///
    /// # Errors
    ///
    /// Returns an error if the AI provider call fails.
    pub async fn synthesize(
        &self,
        query: &str,
        evidence: &MergedEvidence,
        db_results: &[DbResult],
        preferred_language: Option<&str>,
    ) -> crate::error::Result<Answer> {
        if evidence.is_empty() {
            return Ok(Answer::not_found(query));
        }

        let prompt = build_prompt(query, evidence, preferred_language);
        let reply = self.provider.generate_response(SYSTEM_PROMPT, &prompt).await?;
        let cleaned = strip_sql(&reply);

        let mut sources = Vec::new();
        for result in db_results.iter().filter(|r| r.success) {
            let tables = tables_referenced(&result.executed_sql);
            let content = if tables.is_empty() {
                format!("{} rows", result.row_count())
            } else {
                format!("{} rows from {}", result.row_count(), tables.join(", "))
            };
            sources.push(Source {
                source_type: SourceType::Database,
                identifier: result.database_id.clone(),
                content,
                score: None,
                executed_sql: Some(result.executed_sql.clone()),
            });
        }
        for scored in &evidence.chunks {
            sources.push(Source {
                source_type: content_source_type(&scored.chunk),
                identifier: scored.chunk.id.clone(),
                content: scored.chunk.content.clone(),
                score: Some(scored.score),
                executed_sql: None,
            });
        }

        Ok(Answer {
            query: query.to_string(),
            answer: if cleaned.trim().is_empty() { NOT_FOUND_MESSAGE.to_string() } else { cleaned },
            sources,
            searched_at: chrono::Utc::now(),
        })
    }
}

fn content_source_type(chunk: &crate::model::Chunk) -> SourceType {
    use crate::model::ContentType;
    match chunk.content_type {
        ContentType::Audio => SourceType::Audio,
        ContentType::Image => SourceType::Image,
        _ => SourceType::Document,
    }
}

const SYSTEM_PROMPT: &str = "You are an answer synthesizer. Use ONLY the evidence provided; never \
invent names, numbers, or examples not present in it.";

fn build_prompt(query: &str, evidence: &MergedEvidence, preferred_language: Option<&str>) -> String {
    let mut prompt = format!("User query: {query}\n\n");

    if !evidence.database_text.is_empty() {
        prompt.push_str("Database evidence:\n");
        prompt.push_str(&evidence.database_text);
        prompt.push('\n');
    }

    if !evidence.chunks.is_empty() {
        prompt.push_str("Document evidence:\n");
        for scored in &evidence.chunks {
            prompt.push_str(&format!("- ({:.2}) {}\n", scored.score, scored.chunk.content));
        }
    }

    prompt.push_str(
        "\nRules:\n\
         - Use ONLY the data shown above; never invent names, numbers, or examples.\n\
         - If there is no usable evidence above, reply with exactly this text: \"",
    );
    prompt.push_str(NOT_FOUND_MESSAGE);
    prompt.push_str(
        "\"\n\
         - Do not include SQL code blocks or ```sql fences in your answer.\n\
         - If the evidence contains multiple groupings for a \"which X has the most\" style \
         question, list all groupings ordered by the aggregate descending, not just the top one.\n",
    );

    if let Some(lang) = preferred_language {
        prompt.push_str(&format!("- Answer in the language: {lang}.\n"));
    } else {
        prompt.push_str("- Answer in the same language as the query.\n");
    }

    prompt
}

fn table_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([\[\]`\"\w.]+)").expect("static regex is valid")
    })
}

/// Extracts table identifiers referenced in `sql` by scanning for `FROM`/`JOIN`
/// clauses (spec §4.7 `Source` construction), for surfacing in the answer's
/// database-source attribution.
fn tables_referenced(sql: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in table_reference_pattern().captures_iter(sql) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str().trim_matches(['[', ']', '`', '"']).to_string();
            if !seen.iter().any(|n: &String| n.eq_ignore_ascii_case(&name)) {
                seen.push(name);
            }
        }
    }
    seen
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```(?:sql)?\n?.*?```").expect("static regex is valid"))
}

fn bare_select_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^\s*SELECT\s+.+?(?:;|$)").expect("static regex is valid"))
}

/// Strips fenced code blocks and bare `SELECT ...` statements from a reply
/// (spec §4.7 post-processing).
fn strip_sql(reply: &str) -> String {
    let without_fences = fence_pattern().replace_all(reply, "");
    let without_select = bare_select_pattern().replace_all(&without_fences, "");
    without_select.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiProvider;
    use crate::model::{Chunk, ContentType, ScoredChunk};
    use std::ops::Range;
    use std::time::Duration;

    fn chunk(id: &str, text: &str) -> Chunk {
        let range: Range<usize> = 0..text.len();
        Chunk::new(id, "d1", 0, text, range, ContentType::Document)
    }

    #[tokio::test]
    async fn empty_evidence_yields_not_found_without_calling_provider() {
        let provider = Arc::new(MockAiProvider::new(4));
        let synth = AnswerSynthesizer::new(provider);
        let answer = synth.synthesize("anything", &MergedEvidence::default(), &[], None).await.unwrap();
        assert_eq!(answer.answer, NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn builds_sources_from_db_results_and_chunks() {
        let provider = Arc::new(MockAiProvider::new(4).with_response("User query", "There were 3 orders."));
        let synth = AnswerSynthesizer::new(provider);
        let evidence = MergedEvidence {
            database_text: "📊 Total rows: 1".to_string(),
            database_row_count: 1,
            chunks: vec![ScoredChunk {
                chunk: chunk("c1", "Paris is lovely"),
                score: 0.9,
            }],
            strong_document_match: false,
            used_join_hints: false,
        };
        let db_results = vec![DbResult::success("orders_db", "SELECT 1", vec!["x".to_string()], vec![vec!["1".to_string()]], Duration::from_millis(1))];
        let answer = synth.synthesize("how many orders", &evidence, &db_results, None).await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources.iter().any(|s| s.source_type == SourceType::Database));
        assert!(answer.sources.iter().any(|s| s.source_type == SourceType::Document));
    }

    #[test]
    fn strip_sql_removes_fenced_blocks() {
        let reply = "Here you go:\n```sql\nSELECT * FROM Orders\n```\nDone.";
        let cleaned = strip_sql(reply);
        assert!(!cleaned.to_uppercase().contains("SELECT"));
        assert!(cleaned.contains("Here you go"));
        assert!(cleaned.contains("Done."));
    }

    #[test]
    fn strip_sql_removes_bare_select_statements() {
        let reply = "The answer is 5. SELECT * FROM Orders;";
        let cleaned = strip_sql(reply);
        assert!(!cleaned.to_uppercase().contains("SELECT"));
    }

    #[test]
    fn tables_referenced_extracts_from_and_join_identifiers() {
        let tables = tables_referenced("SELECT o.Id FROM Orders o INNER JOIN Customers c ON o.CustomerId = c.Id");
        assert_eq!(tables, vec!["Orders".to_string(), "Customers".to_string()]);
    }
}
