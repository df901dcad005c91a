//! Embedding provider implementations.
//!
//! All providers implement [`Embedder`] from the core crate:
//! - **[`OpenAiEmbedder`]**: `POST {url}/embeddings` on the OpenAI API or any
//!   compatible gateway, batched.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashingEmbedder`]**: deterministic feature hashing, fully offline.
//!   Lower quality than a neural model, but needs no network or credentials.
//! - **`LocalEmbedder`**: fastembed models run in-process
//!   (feature `local-embeddings-fastembed`).
//! - **[`DisabledEmbedder`]**: every call fails.
//!
//! Use [`create_embedder`] to pick one from configuration.
//!
//! # Failure policy
//!
//! Errors are classified (see [`civic_rag_core::ProviderErrorKind`]) and
//! returned immediately. Nothing is retried: the caller decides whether a
//! rate limit or timeout is worth another attempt.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use civic_rag_core::embedding::{l2_normalize, Embedder};
use civic_rag_core::{ProviderError, ProviderErrorKind, RagError};

use crate::config::EmbeddingConfig;
use crate::credentials::ApiKey;
use crate::http;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Create the [`Embedder`] selected by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`OpenAiEmbedder`] (requires `api_key`) |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"hashing"` | [`HashingEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings-fastembed`) |
/// | `"disabled"` | [`DisabledEmbedder`] |
///
/// # Errors
///
/// [`RagError::Input`] for unknown providers, missing model/dims, or a
/// missing API key.
pub fn create_embedder(
    config: &EmbeddingConfig,
    api_key: Option<&ApiKey>,
) -> Result<Box<dyn Embedder>, RagError> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => {
            let key = api_key.ok_or_else(|| {
                RagError::input("the openai embedding provider requires an API key")
            })?;
            Ok(Box::new(OpenAiEmbedder::new(config, key.clone())?))
        }
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "hashing" => Ok(Box::new(HashingEmbedder::new(
            config.dims.unwrap_or(HashingEmbedder::DEFAULT_DIMS),
        ))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::input(
            "the local embedding provider requires --features local-embeddings-fastembed",
        )),
        other => Err(RagError::input(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

fn required_model(config: &EmbeddingConfig) -> Result<String, RagError> {
    config.model.clone().ok_or_else(|| {
        RagError::input(format!(
            "embedding.model required for the {} provider",
            config.provider
        ))
    })
}

fn required_dims(config: &EmbeddingConfig) -> Result<usize, RagError> {
    config.dims.filter(|d| *d > 0).ok_or_else(|| {
        RagError::input(format!(
            "embedding.dims required for the {} provider",
            config.provider
        ))
    })
}

/// Reject responses that do not line up with the request.
fn check_shape(
    provider: &str,
    vectors: &[Vec<f32>],
    expected: usize,
    dims: usize,
) -> Result<(), ProviderError> {
    if vectors.len() != expected {
        return Err(ProviderError::invalid_response(format!(
            "{} returned {} embeddings for {} inputs",
            provider,
            vectors.len(),
            expected
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(ProviderError::invalid_response(format!(
            "{} returned a {}-dim embedding, expected {}",
            provider,
            bad.len(),
            dims
        )));
    }
    Ok(())
}

fn json_to_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

// ============ Disabled Provider ============

/// An embedder that always fails. Used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::new(
            ProviderErrorKind::Disabled,
            "embedding provider is disabled; set [embedding] provider in config",
        ))
    }
}

// ============ OpenAI Provider ============

/// Embeddings from the OpenAI API (or a compatible endpoint set via `url`).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: ApiKey,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: ApiKey) -> Result<Self, RagError> {
        let client = http::client(config.timeout_secs)
            .map_err(|e| RagError::input(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: http::endpoint(
                config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL),
                "embeddings",
            ),
            api_key,
            model: required_model(config)?,
            dims: required_dims(config)?,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| http::classify("OpenAI", e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response("OpenAI", response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| http::classify("OpenAI", e))?;
        parse_openai_response(&json)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            check_shape("OpenAI", &vectors, batch.len(), self.dims)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::invalid_response("OpenAI response missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let vector = item
            .get("embedding")
            .and_then(json_to_vector)
            .ok_or_else(|| ProviderError::invalid_response("OpenAI response missing embedding"))?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embeddings from a local Ollama instance (`POST /api/embed`).
///
/// Requires Ollama running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let client = http::client(config.timeout_secs)
            .map_err(|e| RagError::input(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: http::endpoint(
                config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL),
                "api/embed",
            ),
            model: required_model(config)?,
            dims: required_dims(config)?,
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    let mut err = http::classify("Ollama", e);
                    err.message = format!("{} (is Ollama running at {}?)", err.message, self.url);
                    err
                })?;
            if !response.status().is_success() {
                return Err(http::error_from_response("Ollama", response).await);
            }
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| http::classify("Ollama", e))?;
            let vectors = parse_ollama_response(&json)?;
            check_shape("Ollama", &vectors, batch.len(), self.dims)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            ProviderError::invalid_response("Ollama response missing embeddings array")
        })?;
    embeddings
        .iter()
        .map(|e| {
            json_to_vector(e).ok_or_else(|| {
                ProviderError::invalid_response("Ollama embedding is not a numeric array")
            })
        })
        .collect()
}

// ============ Hashing Provider ============

/// Deterministic bag-of-features embedder.
///
/// Lowercased word tokens (and character bigrams of non-ASCII words, for
/// scripts where particles attach to nouns) are hashed with SHA-256 into
/// `dims` signed buckets, then L2-normalised. Texts sharing many tokens
/// score high under cosine similarity.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMS: usize = 256;
    pub const MODEL_NAME: &'static str = "hashing-v1";

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for feature in features(text) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(raw);
            let bucket = (h % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

fn features(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();
    for word in lower.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        out.push(word.to_string());
        if !word.is_ascii() {
            let chars: Vec<char> = word.chars().collect();
            for pair in chars.windows(2) {
                out.push(pair.iter().collect());
            }
        }
    }
    out
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ Local Provider (fastembed) ============

/// In-process embeddings via fastembed. The model is downloaded from
/// Hugging Face on first use and cached; later runs are fully offline.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "multilingual-e5-small".to_string());
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or(match model_name.as_str() {
            "bge-base-en-v1.5" | "multilingual-e5-base" => 768,
            "multilingual-e5-large" => 1024,
            _ => 384,
        });
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel, RagError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(RagError::input(format!(
            "unknown local embedding model: '{}'. Supported models: all-minilm-l6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small, \
             multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)
            .map_err(|e| ProviderError::new(ProviderErrorKind::Request, e.to_string()))?;
        let slot = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| ProviderError::invalid_response("local embedding model poisoned"))?;
            if guard.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
                )
                .map_err(|e| {
                    ProviderError::new(
                        ProviderErrorKind::Network,
                        format!("failed to initialize local embedding model: {}", e),
                    )
                })?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| ProviderError::invalid_response("local model unavailable"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| ProviderError::invalid_response(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| ProviderError::invalid_response(format!("embedding task failed: {}", e)))?
    }
}
