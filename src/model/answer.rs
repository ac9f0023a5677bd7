//! `Answer`: the final synthesized response returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical not-found reply (spec §4.7, §8 scenario S5).
pub const NOT_FOUND_MESSAGE: &str = "I could not find the answer to your question";

/// The provenance kind of a [`Source`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SourceType {
    /// An executed database query.
    Database,
    /// A retrieved parsed-document chunk.
    Document,
    /// A retrieved transcribed-audio chunk.
    Audio,
    /// A retrieved OCR-extracted-image chunk.
    Image,
    /// A diagnostic entry describing a request-level failure (spec §7 propagation policy).
    System,
}

/// One piece of evidence the answer is attributed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// What kind of source this is.
    pub source_type: SourceType,
    /// Identifier: database id for `Database`, chunk/document id otherwise.
    pub identifier: String,
    /// The relevant snippet of content (row text, chunk excerpt, or diagnostic message).
    pub content: String,
    /// Relevance score, if one applies (document/audio/image sources).
    pub score: Option<f32>,
    /// The SQL that was executed, if this is a `Database` source.
    pub executed_sql: Option<String>,
}

/// The final natural-language answer produced by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The original query text.
    pub query: String,
    /// The synthesized answer text.
    pub answer: String,
    /// Attributions for every piece of evidence used.
    pub sources: Vec<Source>,
    /// When the query was answered.
    pub searched_at: DateTime<Utc>,
}

impl Answer {
    /// Builds the canonical not-found answer (spec §8 S5, §4.8 step 5).
    #[must_use]
    pub fn not_found(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: NOT_FOUND_MESSAGE.to_string(),
            sources: Vec::new(),
            searched_at: Utc::now(),
        }
    }

    /// Builds a cancelled answer: empty text, no sources (spec §7 `Cancelled`).
    #[must_use]
    pub fn cancelled(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: String::new(),
            sources: Vec::new(),
            searched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_answer_has_canonical_text_and_no_sources() {
        let answer = Answer::not_found("what is the capital of atlantis?");
        assert_eq!(answer.answer, NOT_FOUND_MESSAGE);
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn cancelled_answer_has_empty_text() {
        let answer = Answer::cancelled("some query");
        assert!(answer.answer.is_empty());
        assert!(answer.sources.is_empty());
    }
}
