//! Context assembly: retrieved chunks → prompt-ready context block.
//!
//! [`assemble`] produces three things from one retrieval result:
//!
//! - **context**: one block per chunk, `[<citation>]` followed by the chunk
//!   text, blocks separated by a blank line, in retrieval order. Chunk text
//!   longer than `max_chunk_chars` is cut so that text plus
//!   [`TRUNCATION_MARKER`] stays within the limit.
//! - **citations**: `<document> p.<page> — "<preview>"`, de-duplicated in
//!   first-seen order.
//! - **forms**: lines that name an official form or annex, trimmed to
//!   `form_snippet_chars`, de-duplicated in first-seen order.

use serde::Serialize;

use crate::models::Chunk;

/// Appended to chunk text cut short in the context block.
pub const TRUNCATION_MARKER: &str = " …[truncated]";

/// Keywords that mark a line as naming an official form or annex.
///
/// Handbook-specific; override through configuration for other documents.
pub const DEFAULT_FORM_KEYWORDS: &[&str] = &[
    "annex",
    "form",
    "application",
    "consent form",
    "registration form",
    "amendment form",
    "별지",
    "서식",
    "신청서",
    "동의서",
    "신고서",
    "변경신청서",
];

/// Limits and keyword set for [`assemble`].
#[derive(Debug, Clone)]
pub struct ContextParams {
    pub max_chunk_chars: usize,
    pub preview_chars: usize,
    pub form_snippet_chars: usize,
    pub form_keywords: Vec<String>,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1200,
            preview_chars: 80,
            form_snippet_chars: 60,
            form_keywords: DEFAULT_FORM_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Output of [`assemble`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub context: String,
    pub citations: Vec<String>,
    pub forms: Vec<String>,
}

/// Format retrieved chunks into a context block, citations, and form references.
pub fn assemble(chunks: &[Chunk], params: &ContextParams) -> AssembledContext {
    let keywords: Vec<String> = params
        .form_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut blocks = Vec::with_capacity(chunks.len());
    let mut citations = Vec::new();
    let mut forms = Vec::new();

    for chunk in chunks {
        let body = truncate_with_marker(chunk.text.trim(), params.max_chunk_chars);
        blocks.push(format!("[{}]\n{}", chunk.citation, body));

        push_unique(&mut citations, citation_line(chunk, params.preview_chars));

        for line in chunk.text.lines() {
            let line = line.trim();
            if line.is_empty() || !line_names_form(line, &keywords) {
                continue;
            }
            let snippet = take_chars(line, params.form_snippet_chars).trim_end().to_string();
            push_unique(&mut forms, snippet);
        }
    }

    AssembledContext {
        context: blocks.join("\n\n"),
        citations,
        forms,
    }
}

/// `<document> p.<page> — "<preview>"`, with whitespace in the preview collapsed.
pub fn citation_line(chunk: &Chunk, preview_chars: usize) -> String {
    let collapsed = chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "{} p.{} — \"{}\"",
        chunk.document,
        chunk.page,
        take_chars(&collapsed, preview_chars)
    )
}

/// Cut `text` so that the result, marker included, has at most `limit` chars.
pub fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    let keep = limit.saturating_sub(marker_len);
    let mut out = take_chars(text, keep).trim_end().to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

/// Whether `line` contains any of the (lowercased) `keywords`.
///
/// Latin keywords must start at a word boundary and end at one, optionally
/// after a plural `s`, so `form` matches "forms" but not "information".
/// Other scripts match as plain substrings, since words there are not
/// reliably space-delimited.
fn line_names_form(line: &str, keywords: &[String]) -> bool {
    let lower = line.to_lowercase();
    keywords.iter().any(|kw| {
        if !kw.is_ascii() {
            return lower.contains(kw.as_str());
        }
        lower.match_indices(kw.as_str()).any(|(pos, m)| {
            let before = lower[..pos].chars().next_back();
            let mut after = lower[pos + m.len()..].chars();
            let left_ok = before.map_or(true, |c| !c.is_alphanumeric());
            let right_ok = match after.next() {
                None => true,
                Some('s') => after.next().map_or(true, |c| !c.is_alphanumeric()),
                Some(c) => !c.is_alphanumeric(),
            };
            left_ok && right_ok
        })
    })
}
