//! In-memory vector index over embedded chunks.
//!
//! Holds `(Chunk, vector)` pairs in chunk order and answers top-K queries
//! by brute-force cosine similarity. A handbook yields a few thousand
//! chunks at most, so a linear scan is well within interactive latency.
//!
//! Persistence lives in the app crate (`civic_rag::index_store`); this
//! type only knows how to be assembled from parts and searched.

use std::cmp::Ordering;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

/// One embedded chunk.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A similarity-searchable collection of embedded chunks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// An empty index for vectors of `dims` values produced by `model`.
    pub fn new(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims,
            entries: Vec::new(),
        }
    }

    /// Assemble an index from parallel chunk and vector lists.
    ///
    /// # Errors
    ///
    /// [`RagError::Storage`] if the lists differ in length or any vector
    /// has the wrong dimensionality.
    pub fn from_parts(
        model: impl Into<String>,
        dims: usize,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::storage(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let mut index = Self::new(model, dims);
        index.entries.reserve(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.push(chunk, vector)?;
        }
        Ok(index)
    }

    /// Append one embedded chunk.
    pub fn push(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dims {
            return Err(RagError::storage(format!(
                "vector for chunk {} has {} dims, index expects {}",
                chunk.id,
                vector.len(),
                self.dims
            )));
        }
        self.entries.push(IndexEntry { chunk, vector });
        Ok(())
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Return up to `k` chunks ranked by descending cosine similarity.
    ///
    /// Ties keep document order (lower `chunk_index` first), so repeated
    /// queries against the same index return identical rankings.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }
}
