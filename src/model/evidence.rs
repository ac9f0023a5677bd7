//! `MergedEvidence`: the combined input to the answer synthesizer.

use crate::model::chunk::Chunk;
use serde::{Deserialize, Serialize};

/// A retrieved chunk together with the hybrid score that ranked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The hybrid score it was retrieved with (see [`crate::search`]).
    pub score: f32,
}

/// The union of merged database rows and retrieved document chunks, fed to
/// the [`crate::synthesizer::AnswerSynthesizer`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergedEvidence {
    /// The formatted tabular text block produced by the [`crate::merger::ResultMerger`]
    /// (spec §4.6 step E) — empty if no database branch ran.
    pub database_text: String,
    /// Total database rows represented in `database_text` across all sources.
    pub database_row_count: usize,
    /// Ranked chunks that passed the hybrid-search threshold.
    pub chunks: Vec<ScoredChunk>,
    /// `true` if the top chunk's score cleared `StrongDocumentMatchThreshold`.
    pub strong_document_match: bool,
    /// `true` if the database branch produced no joinable path and join hints
    /// were emitted instead (informational only, not an error — spec §7 `MergeError`).
    pub used_join_hints: bool,
}

impl MergedEvidence {
    /// Returns `true` if there is no usable evidence at all (spec §7 `NotFound`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.database_row_count == 0 && self.chunks.is_empty()
    }
}
