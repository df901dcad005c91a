//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus pure helpers for vector persistence and similarity.
//!
//! Concrete providers (OpenAI, Ollama, hashing, fastembed) live in the
//! `civic-rag` app crate.

use async_trait::async_trait;

use crate::error::ProviderError;

/// An embedding backend.
///
/// The same model must embed both the indexed chunks and every query.
/// Nothing enforces this beyond the model name recorded in the persisted
/// index; a mismatch silently degrades ranking quality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Serialize vectors as concatenated little-endian `f32` bytes.
pub fn vectors_to_bytes<'a, I>(vectors: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut bytes = Vec::new();
    for vector in vectors {
        for v in vector {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes
}

/// Split a little-endian `f32` byte buffer into vectors of `dims` values.
///
/// Returns `None` when the buffer length is not a whole number of
/// vectors, which indicates a truncated or foreign file.
pub fn bytes_to_vectors(bytes: &[u8], dims: usize) -> Option<Vec<Vec<f32>>> {
    let stride = dims.checked_mul(4)?;
    if stride == 0 || bytes.len() % stride != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(stride)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect(),
    )
}

/// Cosine similarity between two vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Scale a vector to unit length in place. Zero vectors are left as is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
