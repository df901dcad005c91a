//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use civic_rag::embedding::HashingEmbedder;
use civic_rag::llm::{ChatModel, ChatRequest, FragmentStream};
use civic_rag_core::embedding::Embedder;
use civic_rag_core::{ProviderError, ProviderErrorKind};
use futures_util::StreamExt;

pub const PAGE_ONE: &[&str] = &[
    "Welcome. This handbook describes municipal services",
    "offered by the Riverside County civil service office.",
];
pub const PAGE_TWO: &[&str] = &[
    "Passport reissue requires a photo and the old passport.",
    "Application form for passport reissue is Annex 4.",
];
pub const PAGE_THREE: &[&str] = &[
    "Dog registration costs ten dollars per year",
    "and is handled by the county veterinary desk.",
];

/// The three-page handbook used across tests.
pub fn handbook_pdf() -> Vec<u8> {
    pdf_with_pages(&[PAGE_ONE, PAGE_TWO, PAGE_THREE])
}

/// Minimal valid PDF with one page per entry, each line drawn below the
/// previous one. Builds the body first, then an xref with correct byte
/// offsets so pdf-extract can parse it. Lines must not contain parentheses.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let font_id = 3;
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
    let mut offsets: Vec<usize> = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets.push(out.len());
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids,
            pages.len()
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
            font_id
        )
        .as_bytes(),
    );

    for (i, lines) in pages.iter().enumerate() {
        let page_id = page_ids[i];
        let content_id = page_id + 1;

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >> endobj\n",
                page_id, content_id, font_id
            )
            .as_bytes(),
        );

        let mut content = String::from("BT /F1 12 Tf 72 720 Td");
        for (n, line) in lines.iter().enumerate() {
            if n > 0 {
                content.push_str(" 0 -18 Td");
            }
            content.push_str(&format!(" ({}) Tj", line));
        }
        content.push_str(" ET");

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                content.len(),
                content
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Hashing embedder that counts calls and can be switched to fail.
#[derive(Clone)]
pub struct CountingEmbedder {
    inner: Arc<HashingEmbedder>,
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HashingEmbedder::new(256)),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                ProviderErrorKind::Server,
                "HTTP 503: upstream unavailable",
            ));
        }
        self.inner.embed(texts).await
    }
}

/// Chat model that answers with the reference material it was given.
pub struct EchoContextModel;

fn reference_material(prompt: &str) -> String {
    let start = prompt.find("[Reference material]").unwrap_or(0);
    let end = prompt.find("[Question]").unwrap_or(prompt.len());
    format!("Based on the handbook:\n{}", &prompt[start..end])
}

#[async_trait]
impl ChatModel for EchoContextModel {
    fn model_name(&self) -> &str {
        "echo-context"
    }
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        Ok(reference_material(&request.prompt))
    }
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ProviderError> {
        let text = reference_material(&request.prompt);
        let fragments: Vec<Result<String, civic_rag_core::RagError>> =
            text.lines().map(|l| Ok(format!("{}\n", l))).collect();
        Ok(futures_util::stream::iter(fragments).boxed())
    }
}
