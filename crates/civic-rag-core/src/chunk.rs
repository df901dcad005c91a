//! Recursive boundary-preference text chunker.
//!
//! Splits page text into overlapping [`Chunk`]s of at most `chunk_size`
//! characters. Each chunk is a verbatim slice of its page, so the
//! non-overlapping parts of consecutive chunks reconstruct the page.
//!
//! # Algorithm
//!
//! 1. Open a window of `chunk_size` characters at the current start.
//! 2. If the rest of the page fits in the window, emit it and stop.
//! 3. Otherwise cut after the *last* occurrence of the finest separator
//!    present in the window past the previous cut, in this order of
//!    preference: paragraph break (`\n\n`), line break, sentence
//!    punctuation, space. When none occur, cut at the window edge
//!    (arbitrary character position). Cuts therefore strictly advance.
//! 4. Start the next window `overlap` characters before the cut, moved
//!    forward to the next word start when one lies inside the overlap.
//! 5. Whitespace-only spans are dropped.
//!
//! Sizes are counted in characters, not bytes, so multi-byte scripts get
//! the same budget as ASCII.
//!
//! # Example
//!
//! ```rust
//! use civic_rag_core::chunk::{chunk_pages, ChunkParams};
//! use civic_rag_core::models::DocumentPages;
//!
//! let doc = DocumentPages {
//!     display_name: "handbook.pdf".into(),
//!     pages: vec!["Passport reissue requires a photo.".into()],
//! };
//! let chunks = chunk_pages(&doc, &ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].citation, "handbook p.1");
//! ```

use std::ops::Range;

use sha2::{Digest, Sha256};

use crate::models::{citation_for, Chunk, DocumentPages};

/// Split points, finest-grained preference first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", "。", " "];

/// Chunk size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Chunk every page of a document.
///
/// Pages are numbered from 1. Chunk indices are contiguous across the
/// whole document, starting at 0. Empty pages produce no chunks.
pub fn chunk_pages(doc: &DocumentPages, params: &ChunkParams) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (idx, page_text) in doc.pages.iter().enumerate() {
        let page = idx as u32 + 1;
        let citation = citation_for(&doc.display_name, page);
        for span in split_spans(page_text, params) {
            let text = &page_text[span.clone()];
            if text.trim().is_empty() {
                continue;
            }
            chunks.push(make_chunk(
                &doc.display_name,
                page,
                chunks.len(),
                span.start,
                text,
                &citation,
            ));
        }
    }
    chunks
}

/// Split `text` into byte ranges according to the module algorithm.
///
/// Consecutive ranges never leave a gap: each range starts at or before
/// the end of the previous one.
pub fn split_spans(text: &str, params: &ChunkParams) -> Vec<Range<usize>> {
    if text.is_empty() || params.chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;
    let overlap = params.overlap.min(params.chunk_size - 1);

    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut prev_end = 0usize;
    loop {
        let window_end = (start + params.chunk_size).min(total_chars);
        let end = if window_end == total_chars {
            total_chars
        } else {
            find_cut(text, &bounds, start.max(prev_end), window_end)
        };
        spans.push(bounds[start]..bounds[end]);
        if end == total_chars {
            break;
        }
        prev_end = end;
        start = next_start(text, &bounds, start, end, overlap);
    }
    spans
}

/// Pick the cut position (in chars) for a window ending at `window_end`.
///
/// Only separators after `floor` count, so a window that opens inside the
/// previous chunk's overlap never reuses the previous cut.
fn find_cut(text: &str, bounds: &[usize], floor: usize, window_end: usize) -> usize {
    // The cut must advance at least one character past `floor`.
    let lo_char = floor + 1;
    if lo_char >= window_end {
        return window_end;
    }
    let lo = bounds[lo_char];
    let hi = bounds[window_end];
    let window = &text[lo..hi];
    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            return char_pos(bounds, lo + pos + sep.len());
        }
    }
    window_end
}

/// Where the next window starts, given the previous window ended at `end`.
///
/// Starts `overlap` characters back, moved forward to the first word start
/// in the overlap so a chunk never opens mid-word or inside a whitespace run.
fn next_start(text: &str, bounds: &[usize], start: usize, end: usize, overlap: usize) -> usize {
    let next = end.saturating_sub(overlap).max(start + 1);
    if next >= end {
        return next;
    }
    let mut after_space = text[..bounds[next]]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace);
    let region = &text[bounds[next]..bounds[end]];
    for (pos, c) in region.char_indices() {
        if c.is_whitespace() {
            after_space = true;
        } else if after_space {
            return char_pos(bounds, bounds[next] + pos);
        }
    }
    next
}

fn char_pos(bounds: &[usize], byte: usize) -> usize {
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}

fn make_chunk(
    document: &str,
    page: u32,
    chunk_index: usize,
    offset: usize,
    text: &str,
    citation: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}:{}:{}", document, page, chunk_index),
        document: document.to_string(),
        page,
        chunk_index,
        offset,
        text: text.to_string(),
        hash,
        citation: citation.to_string(),
    }
}
