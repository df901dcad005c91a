//! Core data models that flow through the question-answering pipeline.
//!
//! A [`Chunk`] is produced once at index-build time and never mutated; it
//! carries enough provenance (document name, 1-based page) to render a
//! citation without re-reading the source.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A bounded span of extracted page text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier: `<document>:<page>:<chunk_index>`.
    pub id: String,
    /// Display name of the owning document (e.g. `handbook-2025.pdf`).
    pub document: String,
    /// 1-based page number.
    pub page: u32,
    /// Position within the document, contiguous from 0.
    pub chunk_index: usize,
    /// Byte offset of `text` within the extracted page text.
    pub offset: usize,
    /// The chunk text, verbatim from the page (overlap included).
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    /// Human-readable source reference, e.g. `handbook-2025 p.15`.
    pub citation: String,
}

impl Chunk {
    /// Byte offset one past the end of this chunk within its page.
    pub fn end_offset(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`; higher is closer.
    pub score: f32,
}

/// Extracted text of one document, one entry per page in page order.
#[derive(Debug, Clone)]
pub struct DocumentPages {
    pub display_name: String,
    pub pages: Vec<String>,
}

impl DocumentPages {
    /// Total extracted characters across all pages, ignoring surrounding whitespace.
    pub fn text_len(&self) -> usize {
        self.pages.iter().map(|p| p.trim().chars().count()).sum()
    }
}

/// Build the citation string for a page of a document.
///
/// The display name's extension is dropped: `handbook-2025.pdf`, page 3
/// becomes `handbook-2025 p.3`.
pub fn citation_for(display_name: &str, page: u32) -> String {
    let stem = Path::new(display_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(display_name);
    format!("{} p.{}", stem, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_drops_extension() {
        assert_eq!(citation_for("handbook-2025.pdf", 15), "handbook-2025 p.15");
    }

    #[test]
    fn citation_without_extension() {
        assert_eq!(citation_for("handbook", 1), "handbook p.1");
    }

    #[test]
    fn citation_strips_directories() {
        assert_eq!(citation_for("docs/guide.pdf", 2), "guide p.2");
    }

    #[test]
    fn text_len_counts_chars_not_bytes() {
        let doc = DocumentPages {
            display_name: "x.pdf".into(),
            pages: vec!["  여권  ".into(), "abc".into()],
        };
        assert_eq!(doc.text_len(), 5);
    }
}
