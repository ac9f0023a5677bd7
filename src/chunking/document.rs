//! Sentence-aware document chunking (spec §4.2 ingestion).
//!
//! Splits text into chunks of at most `max_chunk_size` characters with
//! `chunk_overlap` overlap, preferring sentence breaks, then paragraph
//! breaks, then word breaks; never splitting mid-word. A final fragment
//! shorter than `min_chunk_size` is merged into the previous chunk rather
//! than emitted on its own.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::model::{Chunk, ContentType};
use unicode_segmentation::UnicodeSegmentation;

/// Splits a document's text into indexable [`Chunk`]s.
///
/// Implementations must be `Send + Sync` to run inside the parallel
/// ingestion path and must be deterministic for a given input and config.
pub trait DocumentChunker: Send + Sync {
    /// Splits `text` into chunks belonging to `document_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid (see [`SearchConfig::validate`]).
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        content_type: ContentType,
        config: &SearchConfig,
    ) -> Result<Vec<Chunk>>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;
}

/// Returns the byte offset of the start of the `n`-th character in `text`
/// (0-indexed), or `text.len()` if `text` has fewer than `n` characters.
/// Always a valid UTF-8 char boundary, so callers never need a separate
/// boundary walk-back after calling this.
fn nth_char_boundary(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// Returns the byte offset `n` *characters* before byte offset `end` in
/// `text`, clamped to 0. Always a valid UTF-8 char boundary.
fn back_chars_boundary(text: &str, end: usize, n: usize) -> usize {
    if n == 0 {
        return end;
    }
    let prefix = &text[..end];
    let char_count = prefix.chars().count();
    nth_char_boundary(prefix, char_count.saturating_sub(n))
}

/// The sentence-aware chunker used for ingestion (spec §4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceAwareChunker;

impl SentenceAwareChunker {
    /// Creates a new sentence-aware chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Finds the best split point at or before `max_chars` *characters*
    /// into `text` (spec §4.2 defines chunk sizes in characters, not
    /// bytes), preferring (in order) a sentence end, a paragraph break, a
    /// word boundary. Falls back to the `max_chars`-th character boundary
    /// itself (mid-word) only if none of the preferred boundaries exist in
    /// range.
    ///
    /// The returned offset is always a byte offset that lands on a UTF-8
    /// char boundary, never inside a multi-byte codepoint.
    fn find_split(text: &str, max_chars: usize) -> usize {
        let byte_limit = nth_char_boundary(text, max_chars);
        if byte_limit >= text.len() {
            return text.len();
        }

        let window = &text[..byte_limit];

        if let Some(pos) = Self::last_sentence_end(window) {
            return pos;
        }
        if let Some(pos) = window.rfind("\n\n") {
            return pos + 2;
        }
        if let Some(pos) = window.rfind(char::is_whitespace) {
            return pos + 1;
        }

        // No boundary at all in range (one very long "word"): `byte_limit`
        // already lands on a char boundary (it comes from `nth_char_boundary`),
        // so splitting here never cuts a multi-byte codepoint in half, even
        // though it means splitting mid-word.
        byte_limit
    }

    /// Finds the byte offset just after the last sentence-ending punctuation
    /// (`.`, `!`, `?`) followed by whitespace or end-of-window, within `window`.
    fn last_sentence_end(window: &str) -> Option<usize> {
        let mut best = None;
        let mut offset = 0;
        for word in window.split_word_bound_indices() {
            let (idx, text) = word;
            offset = idx + text.len();
            if let Some(last) = text.chars().last()
                && matches!(last, '.' | '!' | '?')
            {
                best = Some(offset);
            }
        }
        let _ = offset;
        best
    }
}

impl DocumentChunker for SentenceAwareChunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        content_type: ContentType,
        config: &SearchConfig,
    ) -> Result<Vec<Chunk>> {
        config.validate()?;

        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Spec §4.2 defines these limits in characters, not bytes; all three
        // are threaded through `find_split`/`back_chars_boundary` as char
        // counts and only converted to byte offsets at valid char boundaries.
        let max_chars = config.max_chunk_size;
        let min_chars = config.min_chunk_size;
        let overlap_chars = config.chunk_overlap;

        let mut fragments: Vec<(usize, usize)> = Vec::new();
        let mut start = 0usize;
        while start < text.len() {
            let remaining = &text[start..];
            let split_at = Self::find_split(remaining, max_chars);
            let end = start + split_at.max(1);
            fragments.push((start, end));

            if end >= text.len() {
                break;
            }
            start = back_chars_boundary(text, end, overlap_chars);
            if start <= fragments.last().map_or(0, |(s, _)| *s) {
                // overlap degenerate (e.g. overlap == 0): advance past end to avoid looping
                start = end;
            }
        }

        // Merge an undersized final fragment into the previous one (spec §4.2).
        if let [.., prev, last] = fragments.as_mut_slice() {
            let (last_start, last_end) = *last;
            if text[last_start..last_end].chars().count() < min_chars {
                prev.1 = last_end;
                fragments.pop();
            }
        }

        let chunks = fragments
            .into_iter()
            .enumerate()
            .map(|(ordinal, (s, e))| {
                let content = text[s..e].to_string();
                Chunk::new(
                    format!("{document_id}#{ordinal}"),
                    document_id,
                    ordinal,
                    content,
                    s..e,
                    content_type,
                )
            })
            .collect();

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "sentence-aware"
    }
}
