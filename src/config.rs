//! TOML configuration parsing and validation.
//!
//! Every tunable the pipeline uses (chunk size, overlap, top-K, truncation
//! limits, form keywords, provider settings) is read from one file,
//! `./config/civic.toml` by default. See [`EXAMPLE_CONFIG`] for a
//! commented template.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use civic_rag_core::chunk::ChunkParams;
use civic_rag_core::context::{ContextParams, DEFAULT_FORM_KEYWORDS, TRUNCATION_MARKER};
use civic_rag_core::prompt::PromptTemplate;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub document: DocumentConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    /// Source PDFs. Order is significant: it feeds the fingerprint.
    pub paths: Vec<PathBuf>,
    /// Names used in citations; defaults to each path's file name.
    #[serde(default)]
    pub display_names: Option<Vec<String>>,
}

impl DocumentConfig {
    /// `(path, display name)` pairs in configured order.
    pub fn sources(&self) -> Vec<(PathBuf, String)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let name = self
                    .display_names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| default_display_name(path));
                (path.clone(), name)
            })
            .collect()
    }
}

fn default_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_document_chars")]
    pub min_document_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            min_document_chars: default_min_document_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}
fn default_min_document_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_form_snippet_chars")]
    pub form_snippet_chars: usize,
    #[serde(default = "default_form_keywords")]
    pub form_keywords: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            preview_chars: default_preview_chars(),
            form_snippet_chars: default_form_snippet_chars(),
            form_keywords: default_form_keywords(),
        }
    }
}

impl ContextConfig {
    pub fn params(&self) -> ContextParams {
        ContextParams {
            max_chunk_chars: self.max_chunk_chars,
            preview_chars: self.preview_chars,
            form_snippet_chars: self.form_snippet_chars,
            form_keywords: self.form_keywords.clone(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    1200
}
fn default_preview_chars() -> usize {
    80
}
fn default_form_snippet_chars() -> usize {
    60
}
fn default_form_keywords() -> Vec<String> {
    DEFAULT_FORM_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible gateway, Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Whether this provider talks to a credentialed remote API.
    pub fn needs_api_key(&self) -> bool {
        self.provider == "openai"
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_office_name")]
    pub office_name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_generation_timeout_secs(),
            url: None,
            api_key_env: default_api_key_env(),
            office_name: default_office_name(),
            contact: None,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            office_name: self.office_name.clone(),
            contact: self.contact.clone(),
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_generation_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_office_name() -> String {
    "the municipal civil service office".to_string()
}

impl Config {
    /// A config for a single document with offline defaults.
    ///
    /// Uses the deterministic `hashing` embedder and disables generation,
    /// so it works without network access or credentials.
    pub fn minimal(document: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            document: DocumentConfig {
                paths: vec![document.into()],
                display_names: None,
            },
            index: IndexConfig {
                dir: index_dir.into(),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
            embedding: EmbeddingConfig {
                provider: "hashing".to_string(),
                model: Some("hashing-v1".to_string()),
                dims: Some(256),
                ..EmbeddingConfig::default()
            },
            generation: GenerationConfig {
                provider: "disabled".to_string(),
                ..GenerationConfig::default()
            },
        }
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.document.paths.is_empty() {
            bail!("document.paths must list at least one PDF");
        }
        if let Some(names) = &self.document.display_names {
            if names.len() != self.document.paths.len() {
                bail!(
                    "document.display_names has {} entries but document.paths has {}",
                    names.len(),
                    self.document.paths.len()
                );
            }
        }

        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!("chunking.overlap must be smaller than chunking.chunk_size");
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.context.max_chunk_chars <= TRUNCATION_MARKER.chars().count() {
            bail!(
                "context.max_chunk_chars must be larger than the truncation marker ({} chars)",
                TRUNCATION_MARKER.chars().count()
            );
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "hashing" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, hashing, local, or disabled.",
                other
            ),
        }
        if self.embedding.is_enabled() && self.embedding.provider != "local" {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be openai or disabled.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Commented template written by `civic init`.
pub const EXAMPLE_CONFIG: &str = r#"# Civic RAG configuration

[document]
# Source PDFs. Keep the order stable: it is part of the index fingerprint.
paths = ["./handbook-2025.pdf"]
# Names shown in citations (defaults to the file names).
# display_names = ["handbook-2025.pdf"]

[index]
dir = "./data/index"

[chunking]
chunk_size = 500          # characters
overlap = 50              # characters
min_document_chars = 100  # less extractable text than this means a scanned PDF

[retrieval]
top_k = 8

[context]
max_chunk_chars = 1200
preview_chars = 80
form_snippet_chars = 60
# form_keywords = ["annex", "form", "application"]

[embedding]
provider = "openai"       # openai | ollama | hashing | local | disabled
model = "text-embedding-3-small"
dims = 1536
batch_size = 64
timeout_secs = 30
api_key_env = "OPENAI_API_KEY"

[generation]
provider = "openai"       # openai | disabled
model = "gpt-4o"
max_tokens = 1024
temperature = 0.0
timeout_secs = 60
office_name = "the municipal civil service office"
# contact = "061-000-0000"
"#;
