//! Weighted hybrid semantic + keyword scoring (spec §4.2).
//!
//! Replaces the reciprocal-rank-fusion scheme with the single scoring
//! family actually used in production: `score = semantic_weight * semantic
//! + keyword_weight * keyword`, with a unique-keyword bonus and two
//! multiplicative bonuses (semantic coherence, contextual keywords), an
//! adaptive threshold, and a strong-match early-exit signal.

use crate::config::SearchConfig;
use crate::embedding::cosine_similarity;
use crate::model::{Chunk, ScoredChunk};

/// Bonus multiplier applied when query tokens appear in the chunk in the
/// same relative order they appear in the query (semantic coherence).
const COHERENCE_BONUS: f32 = 1.15;

/// Bonus multiplier applied when two or more query tokens appear within a
/// small window of each other in the chunk (contextual keyword proximity).
const CONTEXTUAL_PROXIMITY_BONUS: f32 = 1.1;

/// Window (in tokens) within which two query tokens are considered
/// contextually close for [`CONTEXTUAL_PROXIMITY_BONUS`].
const PROXIMITY_WINDOW: usize = 8;

/// Per-unique-matched-token bonus added to the raw keyword score, rewarding
/// matches on rare query tokens over common ones.
const UNIQUE_KEYWORD_BONUS: f32 = 0.05;

/// The outcome of scoring and ranking a document index against one query.
#[derive(Debug, Clone, Default)]
pub struct HybridSearchResult {
    /// Chunks that passed the (possibly relaxed) threshold, sorted by score descending.
    pub chunks: Vec<ScoredChunk>,
    /// `true` if the top-1 score cleared `StrongDocumentMatchThreshold`.
    pub strong: bool,
    /// The threshold actually applied, after adaptive relaxation.
    pub threshold_applied: f32,
}

/// Computes the length-normalized keyword overlap score between query
/// tokens and chunk tokens, plus a per-unique-match bonus.
fn keyword_score(query_tokens: &[String], chunk_tokens: &[String]) -> f32 {
    if query_tokens.is_empty() || chunk_tokens.is_empty() {
        return 0.0;
    }

    let chunk_set: std::collections::HashSet<&str> = chunk_tokens.iter().map(String::as_str).collect();
    let matched: Vec<&String> = query_tokens.iter().filter(|t| chunk_set.contains(t.as_str())).collect();

    if matched.is_empty() {
        return 0.0;
    }

    let overlap = matched.len() as f32 / query_tokens.len() as f32;
    let unique_matched: std::collections::HashSet<&str> = matched.iter().map(|s| s.as_str()).collect();
    overlap + (unique_matched.len() as f32 * UNIQUE_KEYWORD_BONUS)
}

/// Returns `true` if query tokens appear in the chunk's token sequence in
/// the same relative order (not necessarily contiguous).
fn has_semantic_coherence(query_tokens: &[String], chunk_tokens: &[String]) -> bool {
    if query_tokens.len() < 2 {
        return false;
    }
    let mut cursor = 0usize;
    for q in query_tokens {
        match chunk_tokens[cursor..].iter().position(|t| t == q) {
            Some(pos) => cursor += pos + 1,
            None => return false,
        }
    }
    true
}

/// Returns `true` if at least two distinct query tokens appear within
/// [`PROXIMITY_WINDOW`] tokens of each other in the chunk.
fn has_contextual_keywords(query_tokens: &[String], chunk_tokens: &[String]) -> bool {
    let positions: Vec<usize> = query_tokens
        .iter()
        .flat_map(|q| {
            chunk_tokens
                .iter()
                .enumerate()
                .filter(move |(_, t)| *t == q)
                .map(|(i, _)| i)
        })
        .collect();

    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].abs_diff(positions[j]) <= PROXIMITY_WINDOW {
                return true;
            }
        }
    }
    false
}

/// Computes the hybrid score for one chunk against a query.
///
/// `query_embedding` is `None` when no embedder is configured; the
/// semantic half of the score is then 0 and only the keyword half (plus
/// bonuses) contributes.
#[must_use]
pub fn hybrid_score(
    query_tokens: &[String],
    query_embedding: Option<&[f32]>,
    chunk: &Chunk,
    config: &SearchConfig,
) -> f32 {
    let chunk_tokens = chunk.tokens_or_compute();

    let semantic = query_embedding
        .zip(chunk.embedding.as_deref())
        .map_or(0.0, |(q, c)| cosine_similarity(q, c).max(0.0));
    let keyword = keyword_score(query_tokens, &chunk_tokens);

    let mut score = config.semantic_scoring_weight * semantic + config.keyword_scoring_weight * keyword;

    if has_semantic_coherence(query_tokens, &chunk_tokens) {
        score *= COHERENCE_BONUS;
    }
    if has_contextual_keywords(query_tokens, &chunk_tokens) {
        score *= CONTEXTUAL_PROXIMITY_BONUS;
    }

    score.max(0.0)
}

/// Scores every chunk in `candidates`, applies the adaptive threshold, and
/// returns up to `max_results` ranked by score descending (spec §4.2).
#[must_use]
pub fn search_chunks(
    query: &str,
    query_embedding: Option<&[f32]>,
    candidates: &[Chunk],
    config: &SearchConfig,
) -> HybridSearchResult {
    let query_tokens: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    let mut scored: Vec<ScoredChunk> = candidates
        .iter()
        .map(|chunk| ScoredChunk {
            chunk: chunk.clone(),
            score: hybrid_score(&query_tokens, query_embedding, chunk, config),
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut threshold = config.semantic_search_threshold;
    let floor = config.semantic_search_threshold / 2.0;
    loop {
        let passing = scored.iter().filter(|s| s.score >= threshold).count();
        if passing >= config.min_results || threshold <= floor {
            break;
        }
        threshold = (threshold - 0.05).max(floor);
    }

    let strong = scored.first().is_some_and(|s| s.score >= config.strong_document_match_threshold);

    let chunks: Vec<ScoredChunk> = scored
        .into_iter()
        .filter(|s| s.score >= threshold)
        .take(config.max_results)
        .collect();

    HybridSearchResult {
        chunks,
        strong,
        threshold_applied: threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;

    fn chunk(id: &str, text: &str) -> Chunk {
        let mut c = Chunk::new(id, "doc1", 0, text, 0..text.len(), ContentType::Document);
        c.tokenize();
        c
    }

    #[test]
    fn hybrid_score_is_nonnegative_and_bounded_by_keyword_weight_on_full_overlap() {
        let config = SearchConfig::default();
        let c = chunk("c1", "rust programming language");
        let score = hybrid_score(
            &["rust".to_string(), "programming".to_string(), "language".to_string()],
            None,
            &c,
            &config,
        );
        assert!(score >= 0.0);
        assert!(score >= config.keyword_scoring_weight);
    }

    #[test]
    fn no_overlap_scores_zero() {
        let config = SearchConfig::default();
        let c = chunk("c1", "completely unrelated content");
        let score = hybrid_score(&["quantum".to_string(), "physics".to_string()], None, &c, &config);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn coherent_order_scores_higher_than_scrambled() {
        let config = SearchConfig::default();
        let ordered = chunk("c1", "rust is a systems programming language");
        let scrambled = chunk("c2", "language rust systems is programming a");
        let query = vec!["rust".to_string(), "systems".to_string(), "language".to_string()];
        let ordered_score = hybrid_score(&query, None, &ordered, &config);
        let scrambled_score = hybrid_score(&query, None, &scrambled, &config);
        assert!(ordered_score >= scrambled_score);
    }

    #[test]
    fn search_chunks_relaxes_threshold_to_meet_min_results() {
        let mut config = SearchConfig::default();
        config.semantic_search_threshold = 0.9;
        config.min_results = 2;
        let chunks = vec![
            chunk("c1", "rust programming"),
            chunk("c2", "rust systems"),
            chunk("c3", "completely unrelated"),
        ];
        let result = search_chunks("rust", None, &chunks, &config);
        assert!(result.chunks.len() >= 2 || result.threshold_applied < 0.9);
    }

    #[test]
    fn search_chunks_respects_max_results() {
        let mut config = SearchConfig::default();
        config.max_results = 1;
        config.semantic_search_threshold = 0.0;
        let chunks = vec![chunk("c1", "rust programming"), chunk("c2", "rust systems")];
        let result = search_chunks("rust", None, &chunks, &config);
        assert_eq!(result.chunks.len(), 1);
    }

    #[test]
    fn strong_match_reported_above_threshold() {
        let mut config = SearchConfig::default();
        config.strong_document_match_threshold = 0.1;
        config.keyword_scoring_weight = 1.0;
        config.semantic_scoring_weight = 0.0;
        let chunks = vec![chunk("c1", "rust programming language guide")];
        let result = search_chunks("rust programming language guide", None, &chunks, &config);
        assert!(result.strong);
    }
}
