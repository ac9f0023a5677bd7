//! # SmartRAG
//!
//! A retrieval-augmented question-answering engine that routes a natural
//! language query across relational databases and a hybrid (semantic +
//! keyword) document index, merges whatever evidence comes back, and
//! synthesizes a single grounded answer.
//!
//! ## Pipeline
//!
//! A query flows through [`router::QueryIntelligenceRouter`]: intent
//! analysis decides which databases (if any) are relevant, SQL is generated
//! and executed against them, the document index is searched in parallel,
//! results are merged across sources, and an answer is synthesized from
//! whatever evidence survives.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![warn(unsafe_code)]

pub mod ai;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod document_repo;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod intent_analyzer;
pub mod merger;
pub mod model;
pub mod router;
pub mod schema_registry;
pub mod search;
pub mod sql;
pub mod synthesizer;

// Re-export the top-level error type.
pub use error::{Error, Result};

// Re-export configuration types.
pub use config::SmartRagConfig;

// Re-export the router, the crate's main entry point.
pub use router::{QueryIntelligenceRouter, QueryOptions};

// Re-export embedding types.
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder};

// Re-export search types.
pub use search::hybrid::{HybridSearchResult, hybrid_score, search_chunks};

// Re-export CLI types.
pub use cli::{Cli, Commands, OutputFormat};
