//! Output formatting for the development harness CLI.
//!
//! Supports text and JSON output formats, matching the shape callers of a
//! production CLI would expect from `Answer`/`Source` without defining any
//! wire protocol of its own.

use crate::config::SmartRagConfig;
use crate::model::{Answer, SourceType};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses a format from a string, defaulting to [`Self::Text`] for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats the effective configuration.
#[must_use]
pub fn format_config(config: &SmartRagConfig, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_config_text(config),
        OutputFormat::Json => format_json(config),
    }
}

fn format_config_text(config: &SmartRagConfig) -> String {
    let mut out = String::new();
    out.push_str("SmartRAG configuration\n");
    out.push_str("=======================\n\n");
    let _ = writeln!(out, "  Default language:       {}", config.default_language);
    let _ = writeln!(out, "  Auto schema analysis:   {}", config.enable_auto_schema_analysis);
    let _ = writeln!(out, "  Fallback providers:     {}", config.enable_fallback_providers);
    let _ = writeln!(out, "  Max chunk size:         {}", config.search.max_chunk_size);
    let _ = writeln!(out, "  Min chunk size:         {}", config.search.min_chunk_size);
    let _ = writeln!(out, "  Chunk overlap:          {}", config.search.chunk_overlap);
    let _ = writeln!(
        out,
        "  Search weights:         semantic {:.2} / keyword {:.2}",
        config.search.semantic_scoring_weight, config.search.keyword_scoring_weight
    );
    let _ = writeln!(out, "  Semantic threshold:     {:.2}", config.search.semantic_search_threshold);
    let _ = writeln!(out, "  Strong match threshold: {:.2}", config.search.strong_document_match_threshold);
    let _ = writeln!(out, "  Retry attempts:         {}", config.retry.max_retry_attempts);
    out
}

/// Formats a synthesized answer and its sources.
#[must_use]
pub fn format_answer(answer: &Answer, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_answer_text(answer),
        OutputFormat::Json => format_json(answer),
    }
}

fn format_answer_text(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", answer.query);
    out.push('\n');
    let _ = writeln!(out, "{}", answer.answer);

    if !answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for source in &answer.sources {
            let kind = match source.source_type {
                SourceType::Database => "database",
                SourceType::Document => "document",
                SourceType::Audio => "audio",
                SourceType::Image => "image",
                SourceType::System => "system",
            };
            let score = source.score.map_or_else(String::new, |s| format!(" (score {s:.3})"));
            let _ = writeln!(out, "  [{kind}] {}{score}", source.identifier);
            if let Some(sql) = &source.executed_sql {
                let _ = writeln!(out, "    SQL: {sql}");
            }
        }
    }
    out
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

/// Formats an error (and its full cause chain) for CLI output.
#[must_use]
pub fn format_error(error: &anyhow::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{error:#}"),
        OutputFormat::Json => format_json(&serde_json::json!({ "error": format!("{error:#}") })),
    }
}
