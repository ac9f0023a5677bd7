//! Document repository contract (spec §6) and its in-memory reference implementation.
//!
//! The repository owns [`Chunk`]s and their parent [`Document`]s. Concrete
//! backends (Redis/vector, Qdrant, ...) are external collaborators; this
//! crate ships one in-memory implementation so the searcher and router are
//! independently testable without one.

use crate::embedding::cosine_similarity;
use crate::model::{Chunk, ContentType, Document, DocumentMetadata};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Optional filters applied before scoring (spec §4.2 content-type filters).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict results to these content types, if non-empty.
    pub content_types: Vec<ContentType>,
}

impl SearchFilters {
    /// Builds a filter for a single query-prefix flag (`-d`/`-a`/`-i`/`-db`), if recognized.
    #[must_use]
    pub fn from_query_flag(flag: &str) -> Self {
        ContentType::from_query_flag(flag).map_or_else(Self::default, |ct| Self {
            content_types: vec![ct],
        })
    }

    /// Returns `true` if `chunk` passes these filters.
    #[must_use]
    pub fn admits(&self, chunk: &Chunk) -> bool {
        self.content_types.is_empty() || self.content_types.contains(&chunk.content_type)
    }
}

/// The document/chunk storage contract (spec §6 "Document Repository contract").
///
/// Implementations must be `Send + Sync`: the searcher treats the
/// repository as a thread-safe read interface consulted concurrently with
/// other router branches (spec §5).
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Inserts or replaces a single chunk.
    async fn upsert(&self, chunk: Chunk);

    /// Inserts or replaces a batch of chunks.
    async fn upsert_batch(&self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            self.upsert(chunk).await;
        }
    }

    /// Registers a document's metadata (called once per upload, before its chunks).
    async fn put_document(&self, document: Document);

    /// Returns the top-`k` chunks by cosine similarity to `query_vec`, honoring `filters`.
    async fn vector_search(&self, query_vec: &[f32], k: usize, filters: &SearchFilters) -> Vec<(Chunk, f32)>;

    /// Returns chunks whose tokenized content contains any of `tokens`, honoring `filters`.
    async fn text_search(&self, tokens: &[String], filters: &SearchFilters) -> Vec<Chunk>;

    /// Deletes a document and all its chunks atomically (spec §3 ownership).
    async fn delete_by_document(&self, document_id: &str);

    /// Deletes all documents and chunks.
    async fn clear_all(&self);

    /// Returns every stored chunk (in-memory sized deployments only, spec §6).
    async fn get_all(&self) -> Vec<Chunk>;
}

/// In-memory [`DocumentRepository`] backed by a `parking_lot::RwLock<HashMap<..>>`.
///
/// The reference backend for the `DocumentRepository` contract, which only
/// requires a thread-safe read interface and keeps storage backends
/// pluggable.
#[derive(Debug, Default)]
pub struct InMemoryDocumentRepository {
    chunks: RwLock<HashMap<String, Chunk>>,
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn upsert(&self, chunk: Chunk) {
        self.chunks.write().insert(chunk.id.clone(), chunk);
    }

    async fn put_document(&self, document: Document) {
        self.documents.write().insert(document.id.clone(), document);
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize, filters: &SearchFilters) -> Vec<(Chunk, f32)> {
        let chunks = self.chunks.read();
        let mut scored: Vec<(Chunk, f32)> = chunks
            .values()
            .filter(|c| filters.admits(c))
            .filter_map(|c| c.embedding.as_deref().map(|e| (c.clone(), cosine_similarity(query_vec, e))))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    async fn text_search(&self, tokens: &[String], filters: &SearchFilters) -> Vec<Chunk> {
        let needles: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        self.chunks
            .read()
            .values()
            .filter(|c| filters.admits(c))
            .filter(|c| {
                let chunk_tokens = c.tokens_or_compute();
                needles.iter().any(|n| chunk_tokens.iter().any(|t| t == n))
            })
            .cloned()
            .collect()
    }

    async fn delete_by_document(&self, document_id: &str) {
        self.chunks.write().retain(|_, c| c.document_id != document_id);
        self.documents.write().remove(document_id);
    }

    async fn clear_all(&self) {
        self.chunks.write().clear();
        self.documents.write().clear();
    }

    async fn get_all(&self) -> Vec<Chunk> {
        self.chunks.read().values().cloned().collect()
    }
}

/// Builds a [`Document`] with a single chunk's worth of metadata, convenience
/// used by the development harness CLI to ingest a file in one call.
#[must_use]
pub fn document_with_metadata(id: impl Into<String>, filename: impl Into<String>) -> Document {
    Document::new(id, DocumentMetadata::new(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Range;

    fn chunk_with_embedding(id: &str, doc: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        let range: Range<usize> = 0..text.len();
        let mut c = Chunk::new(id, doc, 0, text, range, ContentType::Document).with_embedding(embedding);
        c.tokenize();
        c
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let repo = InMemoryDocumentRepository::new();
        repo.upsert(chunk_with_embedding("c1", "d1", "a", vec![1.0, 0.0])).await;
        repo.upsert(chunk_with_embedding("c2", "d1", "b", vec![0.0, 1.0])).await;

        let results = repo.vector_search(&[1.0, 0.0], 2, &SearchFilters::default()).await;
        assert_eq!(results[0].0.id, "c1");
        assert!(results[0].1 > results[1].1);
    }

    #[tokio::test]
    async fn vector_search_respects_content_type_filter() {
        let repo = InMemoryDocumentRepository::new();
        let mut audio = chunk_with_embedding("c1", "d1", "a", vec![1.0, 0.0]);
        audio.content_type = ContentType::Audio;
        repo.upsert(audio).await;
        repo.upsert(chunk_with_embedding("c2", "d1", "b", vec![1.0, 0.0])).await;

        let filters = SearchFilters::from_query_flag("-d");
        let results = repo.vector_search(&[1.0, 0.0], 10, &filters).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "c2");
    }

    #[tokio::test]
    async fn delete_by_document_cascades_to_chunks() {
        let repo = InMemoryDocumentRepository::new();
        repo.upsert(chunk_with_embedding("c1", "d1", "a", vec![1.0])).await;
        repo.upsert(chunk_with_embedding("c2", "d2", "b", vec![1.0])).await;
        repo.put_document(document_with_metadata("d1", "f1.txt")).await;

        repo.delete_by_document("d1").await;
        let all = repo.get_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "c2");
    }

    #[tokio::test]
    async fn text_search_matches_on_tokens() {
        let repo = InMemoryDocumentRepository::new();
        repo.upsert(chunk_with_embedding("c1", "d1", "Paris is lovely", vec![])).await;
        repo.upsert(chunk_with_embedding("c2", "d1", "Berlin is also lovely", vec![])).await;

        let results = repo.text_search(&["paris".to_string()], &SearchFilters::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c1");
    }

    #[tokio::test]
    async fn clear_all_empties_repository() {
        let repo = InMemoryDocumentRepository::new();
        repo.upsert(chunk_with_embedding("c1", "d1", "a", vec![1.0])).await;
        repo.clear_all().await;
        assert!(repo.get_all().await.is_empty());
    }
}
