//! `Document`: owns a contiguous sequence of chunks plus upload metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded at upload time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original filename as uploaded.
    pub filename: String,
    /// MIME type, if known.
    pub mime: Option<String>,
    /// Identifier of the uploader (opaque to this crate).
    pub uploader: Option<String>,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
    /// Language override for the whole document; individual chunks may still
    /// carry their own tag (e.g. code-switched content).
    pub language_override: Option<String>,
}

impl DocumentMetadata {
    /// Creates metadata for a document uploaded now.
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            mime: None,
            uploader: None,
            uploaded_at: Utc::now(),
            language_override: None,
        }
    }
}

/// A document: metadata plus the ordered list of chunk ids that belong to it.
///
/// Documents own their chunks; deleting a document cascades to all its
/// chunks (see [`crate::document_repo::DocumentRepository::delete_by_document`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable document id.
    pub id: String,
    /// Upload metadata.
    pub metadata: DocumentMetadata,
    /// Ids of the chunks owned by this document, in ordinal order.
    pub chunk_ids: Vec<String>,
}

impl Document {
    /// Creates a new, chunk-less document.
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: id.into(),
            metadata,
            chunk_ids: Vec::new(),
        }
    }

    /// Records a chunk as belonging to this document, preserving ordinal order.
    pub fn push_chunk(&mut self, chunk_id: impl Into<String>) {
        self.chunk_ids.push(chunk_id.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_no_chunks() {
        let doc = Document::new("doc1", DocumentMetadata::new("report.pdf"));
        assert!(doc.chunk_ids.is_empty());
        assert_eq!(doc.metadata.filename, "report.pdf");
    }

    #[test]
    fn push_chunk_preserves_order() {
        let mut doc = Document::new("doc1", DocumentMetadata::new("report.pdf"));
        doc.push_chunk("c1");
        doc.push_chunk("c2");
        assert_eq!(doc.chunk_ids, vec!["c1".to_string(), "c2".to_string()]);
    }
}
