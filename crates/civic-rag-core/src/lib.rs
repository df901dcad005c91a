//! # Civic RAG Core
//!
//! I/O-free logic for the Civic RAG handbook assistant: data models,
//! chunking, the in-memory vector index, context assembly, prompt
//! construction, the embedding trait, and the error taxonomy.
//!
//! This crate contains no tokio, reqwest, or filesystem code. Reading
//! PDFs, persisting the index, and talking to providers happen in the
//! `civic-rag` app crate.
//!
//! ## Pipeline
//!
//! ```text
//! pages ──chunk──▶ Chunk[] ──embed──▶ VectorIndex ──search──▶ Chunk[]
//!                                                               │
//!                        prompt ◀──render── AssembledContext ◀──┘
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod prompt;

pub use error::{ProviderError, ProviderErrorKind, RagError};
