//! Hybrid search: weighted semantic + keyword scoring over the document index (spec §4.2).

pub mod hybrid;

pub use hybrid::{HybridSearchResult, hybrid_score, search_chunks};
