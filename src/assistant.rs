//! The question-answering facade: search → assemble → generate.
//!
//! An [`Assistant`] owns the loaded index and both providers, so a front
//! end only needs [`Assistant::open`] once and then
//! [`Assistant::answer`] (or [`Assistant::answer_stream`]) per question.
//!
//! ```text
//! question ──embed──▶ top-K chunks ──assemble──▶ context + citations + forms
//!                                                      │
//!                               answer text ◀──generate┘
//! ```

use anyhow::{Context, Result};
use futures_util::StreamExt;

use civic_rag_core::context::{assemble, AssembledContext};
use civic_rag_core::embedding::Embedder;
use civic_rag_core::index::VectorIndex;
use civic_rag_core::models::Chunk;
use civic_rag_core::RagError;

use crate::config::Config;
use crate::credentials::ApiKey;
use crate::generate::{generate, GenerationParams, GenerationResult};
use crate::index_cmd::build_embedder;
use crate::index_store::{ensure_index, IndexOutcome, LoadedIndex};
use crate::llm::{create_chat_model, ChatModel, FragmentStream};
use crate::progress::IndexProgressReporter;
use crate::search::search;

/// A complete answer with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// One line per distinct retrieved chunk, first-seen order.
    pub citations: Vec<String>,
    pub forms: Vec<String>,
}

/// Sources for an answer whose text is still being generated.
pub struct StreamingAnswer {
    pub citations: Vec<String>,
    pub forms: Vec<String>,
    pub stream: FragmentStream,
}

pub struct Assistant {
    config: Config,
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatModel>,
    index: VectorIndex,
    stamp: String,
    outcome: IndexOutcome,
}

impl Assistant {
    /// Assemble an assistant from already-built parts.
    pub fn new(
        config: Config,
        embedder: Box<dyn Embedder>,
        chat: Box<dyn ChatModel>,
        loaded: LoadedIndex,
    ) -> Self {
        Self {
            config,
            embedder,
            chat,
            index: loaded.index,
            stamp: loaded.stamp,
            outcome: loaded.outcome,
        }
    }

    /// Build providers from `config` and ensure the index is ready.
    ///
    /// `api_key` overrides the environment variables named in the config.
    pub async fn open(
        config: Config,
        api_key: Option<&str>,
        force_rebuild: bool,
        progress: &dyn IndexProgressReporter,
    ) -> Result<Self> {
        let embedder = build_embedder(&config, api_key)?;

        let chat_key = if config.generation.is_enabled() {
            Some(
                ApiKey::resolve(api_key, &config.generation.api_key_env)
                    .context("generation provider credential")?,
            )
        } else {
            None
        };
        let chat = create_chat_model(&config.generation, chat_key.as_ref())?;

        let sources = config.document.sources();
        let loaded = ensure_index(
            embedder.as_ref(),
            &sources,
            &config.index.dir,
            &config.chunking,
            force_rebuild,
            progress,
        )
        .await
        .with_context(|| format!("preparing index in {}", config.index.dir.display()))?;

        Ok(Self::new(config, embedder, chat, loaded))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn index_outcome(&self) -> IndexOutcome {
        self.outcome
    }

    /// Retrieve and assemble context for `question` without generating.
    pub async fn retrieve(&self, question: &str) -> Result<(Vec<Chunk>, AssembledContext), RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::input("question is empty"));
        }
        let chunks = search(
            &self.index,
            self.embedder.as_ref(),
            question,
            self.config.retrieval.top_k,
        )
        .await?;
        let assembled = assemble(&chunks, &self.config.context.params());
        tracing::info!(
            chunks = chunks.len(),
            citations = assembled.citations.len(),
            forms = assembled.forms.len(),
            "assembled context"
        );
        Ok((chunks, assembled))
    }

    /// Answer `question` in one piece.
    ///
    /// # Errors
    ///
    /// [`RagError::Input`] for a blank question, [`RagError::Retrieval`] or
    /// [`RagError::Generation`] for provider failures.
    pub async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        let (_, assembled) = self.retrieve(question).await?;
        let text = self
            .generate(question, &assembled, false)
            .await?
            .into_text()
            .await?;
        Ok(Answer {
            text,
            citations: assembled.citations,
            forms: assembled.forms,
        })
    }

    /// Answer `question` as a stream of fragments.
    ///
    /// Sources are known before the first fragment arrives. Dropping the
    /// stream abandons the generation.
    pub async fn answer_stream(&self, question: &str) -> Result<StreamingAnswer, RagError> {
        let (_, assembled) = self.retrieve(question).await?;
        let stream = match self.generate(question, &assembled, true).await? {
            GenerationResult::Stream(stream) => stream,
            GenerationResult::Text(text) => {
                futures_util::stream::once(async move { Ok::<_, RagError>(text) }).boxed()
            }
        };
        Ok(StreamingAnswer {
            citations: assembled.citations,
            forms: assembled.forms,
            stream,
        })
    }

    async fn generate(
        &self,
        question: &str,
        assembled: &AssembledContext,
        stream: bool,
    ) -> Result<GenerationResult, RagError> {
        let params = GenerationParams {
            max_tokens: self.config.generation.max_tokens,
            temperature: self.config.generation.temperature,
        };
        generate(
            self.chat.as_ref(),
            &self.config.generation.prompt_template(),
            &assembled.context,
            question.trim(),
            &assembled.forms,
            params,
            stream,
        )
        .await
    }
}
