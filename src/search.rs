//! Query-time retrieval: embed the query, rank chunks by cosine similarity.
//!
//! The query must be embedded by the same model that built the index.
//! A different model name is logged but not refused, since dimensions may
//! still line up and results merely degrade.

use anyhow::Result;

use civic_rag_core::embedding::Embedder;
use civic_rag_core::index::VectorIndex;
use civic_rag_core::models::{Chunk, ScoredChunk};
use civic_rag_core::RagError;

use crate::config::Config;
use crate::index_cmd::{build_embedder, open_index};
use crate::progress::ProgressMode;

/// Top-`k` chunks for `query` with their similarity scores, best first.
///
/// # Errors
///
/// - [`RagError::Input`] for a blank query.
/// - [`RagError::Retrieval`] if the embedding call fails. An empty result
///   is only returned for an empty index, never to mask a failure.
pub async fn search_scored(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>, RagError> {
    if query.trim().is_empty() {
        return Err(RagError::input("query is empty"));
    }
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    if embedder.model_name() != index.model_name() {
        tracing::warn!(
            index_model = %index.model_name(),
            embedder_model = %embedder.model_name(),
            "query embedder differs from index embedder"
        );
    }

    let mut vectors = embedder
        .embed(&[query.to_string()])
        .await
        .map_err(RagError::Retrieval)?;
    let query_vector = vectors.pop().ok_or_else(|| {
        RagError::Retrieval(civic_rag_core::ProviderError::invalid_response(
            "embedder returned no vector for the query",
        ))
    })?;
    if query_vector.len() != index.dims() {
        return Err(RagError::Retrieval(
            civic_rag_core::ProviderError::invalid_response(format!(
                "query vector has {} dims, index has {}",
                query_vector.len(),
                index.dims()
            )),
        ));
    }

    let results = index.search(&query_vector, k);
    tracing::debug!(k, hits = results.len(), "retrieved chunks");
    Ok(results)
}

/// Top-`k` chunks for `query`, best first.
pub async fn search(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<Chunk>, RagError> {
    Ok(search_scored(index, embedder, query, k)
        .await?
        .into_iter()
        .map(|s| s.chunk)
        .collect())
}

/// `civic search`: print ranked chunks with citations.
pub async fn run_search(
    config: &Config,
    api_key: Option<&str>,
    query: &str,
    limit: Option<usize>,
    progress: ProgressMode,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = build_embedder(config, api_key)?;
    let loaded = open_index(config, embedder.as_ref(), false, progress).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);

    let results = search_scored(&loaded.index, embedder.as_ref(), query, k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, scored) in results.iter().enumerate() {
        let chunk = &scored.chunk;
        println!("{}. [{:.2}] {}", i + 1, scored.score, chunk.citation);
        println!("    id: {}", chunk.id);
        let snippet: String = chunk
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(200)
            .collect();
        println!("    > {}", snippet);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use civic_rag_core::models::citation_for;
    use civic_rag_core::{ProviderError, ProviderErrorKind};

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("passport") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::new(ProviderErrorKind::Timeout, "30s elapsed"))
        }
    }

    fn chunk(i: usize, page: u32, text: &str) -> Chunk {
        Chunk {
            id: format!("h.pdf:{}:{}", page, i),
            document: "h.pdf".into(),
            page,
            chunk_index: i,
            offset: 0,
            text: text.into(),
            hash: String::new(),
            citation: citation_for("h.pdf", page),
        }
    }

    fn index() -> VectorIndex {
        VectorIndex::from_parts(
            "axis",
            2,
            vec![chunk(0, 1, "dog licence"), chunk(1, 2, "passport photo")],
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn best_match_first() {
        let hits = search(&index(), &AxisEmbedder, "passport please", 2)
            .await
            .unwrap();
        assert_eq!(hits[0].page, 2);
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn empty_index_returns_empty() {
        let empty = VectorIndex::new("axis", 2);
        let hits = search(&empty, &FailingEmbedder, "anything", 8).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn embed_failure_is_retrieval_error() {
        let err = search(&index(), &FailingEmbedder, "passport", 8)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn blank_query_rejected() {
        let err = search(&index(), &AxisEmbedder, "   ", 8).await.unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
    }
}
