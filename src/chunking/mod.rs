//! Document chunking (spec §4.2 ingestion): splits ingested text into
//! indexable [`crate::model::Chunk`]s.

pub mod document;

pub use document::{DocumentChunker, SentenceAwareChunker};
