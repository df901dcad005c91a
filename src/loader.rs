//! Document loading: PDF file → pages → chunks.

use std::path::Path;

use civic_rag_core::chunk::{chunk_pages, ChunkParams};
use civic_rag_core::models::{Chunk, DocumentPages};
use civic_rag_core::RagError;

use crate::extract::extract_pages;

/// Read a PDF and extract its pages.
///
/// # Errors
///
/// - [`RagError::Input`] if the file cannot be read.
/// - [`RagError::Content`] if it is not a parsable PDF.
pub fn load_pages(path: &Path, display_name: &str) -> Result<DocumentPages, RagError> {
    let bytes = std::fs::read(path).map_err(|e| {
        RagError::input(format!("cannot read source file {}: {}", path.display(), e))
    })?;
    let pages = extract_pages(&bytes)
        .map_err(|e| RagError::content(format!("{}: {}", display_name, e)))?;
    tracing::debug!(document = display_name, pages = pages.len(), "extracted pages");
    Ok(DocumentPages {
        display_name: display_name.to_string(),
        pages,
    })
}

/// Chunk extracted pages, refusing documents with too little text.
///
/// A PDF with fewer than `min_chars` extractable characters is almost
/// always a scanned image; indexing it would yield an empty, useless index.
pub fn chunk_document(
    doc: &DocumentPages,
    params: &ChunkParams,
    min_chars: usize,
) -> Result<Vec<Chunk>, RagError> {
    let extracted = doc.text_len();
    if extracted < min_chars {
        return Err(RagError::content(format!(
            "{} has only {} characters of extractable text (minimum {}); \
             it is probably a scanned image without a text layer",
            doc.display_name, extracted, min_chars
        )));
    }
    let chunks = chunk_pages(doc, params);
    tracing::info!(
        document = %doc.display_name,
        pages = doc.pages.len(),
        chunks = chunks.len(),
        "chunked document"
    );
    Ok(chunks)
}

/// [`load_pages`] followed by [`chunk_document`].
pub fn load_and_chunk(
    path: &Path,
    display_name: &str,
    params: &ChunkParams,
    min_chars: usize,
) -> Result<Vec<Chunk>, RagError> {
    let doc = load_pages(path, display_name)?;
    chunk_document(&doc, params, min_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> DocumentPages {
        DocumentPages {
            display_name: "handbook.pdf".into(),
            pages: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn short_document_is_content_error() {
        let err = chunk_document(&pages(&["  tiny  ", ""]), &ChunkParams::default(), 100)
            .unwrap_err();
        match err {
            RagError::Content(msg) => assert!(msg.contains("scanned")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn threshold_counts_all_pages() {
        let doc = pages(&[&"a".repeat(60), &"b".repeat(60)]);
        let chunks = chunk_document(&doc, &ChunkParams::default(), 100).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 2);
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_pages(Path::new("/definitely/not/here.pdf"), "here.pdf").unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
    }

    #[test]
    fn non_pdf_is_content_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"plain text, not a pdf").unwrap();
        let err = load_pages(tmp.path(), "notes.pdf").unwrap_err();
        assert!(matches!(err, RagError::Content(ref m) if m.starts_with("notes.pdf")));
    }
}
