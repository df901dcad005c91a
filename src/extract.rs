//! Per-page text extraction from PDF bytes.
//!
//! Returns one UTF-8 string per page, in page order. Index `i` of the
//! result is page `i + 1` of the document.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a PDF file")]
    NotPdf,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract the text of every page.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractError::NotPdf);
    }
    // pdf-extract panics on some malformed font tables.
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

/// Cheap magic-number check: `%PDF-` within the first kilobyte.
fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}
