//! `Chunk`: a contiguous fragment of a parsed document.
//!
//! Chunks are the unit of indexing and retrieval for the document searcher
//! (see [`crate::search`]). Each chunk carries an optional embedding vector
//! sized to the configured embedding model's dimensionality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The source modality a chunk was extracted from.
///
/// File parsing (PDF/Office/OCR/transcription) that produces the
/// `(text, metadata)` pairs chunks are built from is an external
/// collaborator; this tag only records which one produced a given chunk so
/// content-type filters (`-d`/`-a`/`-i`/`-db`) can be applied before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Parsed text document (PDF, Office, markdown, plain text, ...).
    Document,
    /// Transcribed audio.
    Audio,
    /// OCR-extracted image.
    Image,
    /// A row or row-group pulled from a relational database.
    Database,
}

impl ContentType {
    /// Maps a query prefix flag (`-d`, `-a`, `-i`, `-db`) to its content type.
    #[must_use]
    pub fn from_query_flag(flag: &str) -> Option<Self> {
        match flag {
            "-d" => Some(Self::Document),
            "-a" => Some(Self::Audio),
            "-i" => Some(Self::Image),
            "-db" => Some(Self::Database),
            _ => None,
        }
    }
}

/// A contiguous fragment of a parsed document.
///
/// Ordinal indices within a document are contiguous from 0. If an embedding
/// is present its length equals the configured embedding dimension `D`.
/// The content type is fixed at creation and never changes afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable chunk id.
    pub id: String,
    /// Id of the owning [`crate::model::Document`].
    pub document_id: String,
    /// Ordinal index within the document (0-based, contiguous).
    pub ordinal: usize,
    /// Chunk text content.
    pub content: String,
    /// Byte range within the original document text.
    pub byte_range: Range<usize>,
    /// Embedding vector, present once the chunk has been indexed.
    pub embedding: Option<Vec<f32>>,
    /// Source modality.
    pub content_type: ContentType,
    /// ISO 639-1 language tag, or `None` if unknown (falls back to `DefaultLanguage`).
    pub language: Option<String>,
    /// Precomputed lowercased token set, used by the keyword half of the hybrid score.
    pub tokens: Option<Vec<String>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Creates a new chunk with no embedding yet.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        ordinal: usize,
        content: impl Into<String>,
        byte_range: Range<usize>,
        content_type: ContentType,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            ordinal,
            content,
            byte_range,
            embedding: None,
            content_type,
            language: None,
            tokens: None,
            created_at: Utc::now(),
        }
    }

    /// Attaches an embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Attaches a language tag.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Computes and caches the lowercased whitespace token set, used for keyword scoring.
    pub fn tokenize(&mut self) {
        self.tokens = Some(
            self.content
                .split_whitespace()
                .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        );
    }

    /// Returns the cached token set, computing it on demand if absent.
    #[must_use]
    pub fn tokens_or_compute(&self) -> Vec<String> {
        self.tokens.clone().unwrap_or_else(|| {
            self.content
                .split_whitespace()
                .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        })
    }

    /// Returns `true` if the chunk has been embedded.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }
}
