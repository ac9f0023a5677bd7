//! Domain model shared across the router and its components.

mod answer;
mod chunk;
mod conversation;
mod db_result;
mod document;
mod evidence;
mod intent;
mod mapping;
mod schema;

pub use answer::{Answer, Source, SourceType, NOT_FOUND_MESSAGE};
pub use chunk::{Chunk, ContentType};
pub use conversation::{ConversationTurn, Role};
pub use db_result::DbResult;
pub use document::{Document, DocumentMetadata};
pub use evidence::{MergedEvidence, ScoredChunk};
pub use intent::{DatabaseQueryIntent, Intent, Strategy};
pub use mapping::{CrossDatabaseMapping, MappingEndpoint};
pub use schema::{Column, DatabaseSchema, Dialect, ForeignKey, SchemaStatus, Table};
