//! # Civic RAG
//!
//! A question-answering assistant for a single PDF handbook.
//!
//! Civic RAG extracts the handbook's text page by page, splits it into
//! overlapping chunks with page provenance, embeds them into a persistent
//! vector index that is rebuilt only when the document bytes change, and
//! answers questions by retrieving the closest chunks and asking a language
//! model for a grounded, cited answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌───────────────┐
//! │  PDF(s) │──▶│ Extract+Chunk│──▶│  Index store   │  chunks.json
//! └─────────┘   └──────────────┘   │ embed+persist  │  vectors.bin
//!      │                           └───────┬───────┘  stamp
//!      └── fingerprint ───────────────────▲│
//!                                          ▼
//!   question ──▶ Retriever ──▶ Context assembler ──▶ Answer generator
//! ```
//!
//! Pure logic (chunking, similarity search, context assembly, prompt
//! rendering, error taxonomy) lives in the `civic-rag-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! civic init                    # write ./config/civic.toml
//! civic index                   # build or reuse the index
//! civic ask "What do I need to reissue a passport?"
//! civic chat                    # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | API key validation |
//! | [`fingerprint`] | Source document change detection |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`loader`] | PDF → pages → chunks |
//! | [`embedding`] | Embedding providers |
//! | [`index_store`] | Persistent index with fingerprint stamp |
//! | [`search`] | Query-time retrieval |
//! | [`llm`] | Chat-completion providers and SSE streaming |
//! | [`generate`] | Grounded answer generation |
//! | [`assistant`] | search → assemble → generate facade |
//! | [`session`] | Per-conversation state |
//! | [`progress`] | Index build progress on stderr |

pub mod answer_cmd;
pub mod assistant;
pub mod config;
pub mod credentials;
pub mod embedding;
pub mod extract;
pub mod fingerprint;
pub mod generate;
mod http;
pub mod index_cmd;
pub mod index_store;
pub mod init_cmd;
pub mod llm;
pub mod loader;
pub mod progress;
pub mod search;
pub mod session;
