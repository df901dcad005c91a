//! Persistent vector index with fingerprint-based change detection.
//!
//! [`ensure_index`] is the single entry point: it fingerprints the source
//! PDFs, reuses the persisted index when the stored stamp matches, and
//! otherwise rebuilds (extract → chunk → embed) and persists.
//!
//! # On-disk layout
//!
//! ```text
//! <storage_dir>/
//! ├── chunks.json   manifest: format version, model, dims, built_at, chunks
//! ├── vectors.bin   little-endian f32, chunk order, dims values per chunk
//! └── stamp         source fingerprint (hex, plain text)
//! ```
//!
//! # Write protocol
//!
//! Every chunk is embedded in memory before any file is touched, so a
//! provider failure leaves the previous index intact. Persisting then
//! removes `stamp`, writes the two data files via temp file + rename, and
//! writes `stamp` last. A crash at any point leaves either no stamp or a
//! stamp matching fully written data; a missing stamp forces a rebuild.
//!
//! Building assumes a single writer per `storage_dir`. Concurrent readers
//! of a fully written index are safe.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use civic_rag_core::embedding::{bytes_to_vectors, vectors_to_bytes, Embedder};
use civic_rag_core::index::VectorIndex;
use civic_rag_core::models::Chunk;
use civic_rag_core::RagError;

use crate::config::ChunkingConfig;
use crate::fingerprint::fingerprint;
use crate::loader::{chunk_document, load_pages};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};

/// Bumped whenever the manifest or vector layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";
const STAMP_FILE: &str = "stamp";

/// Chunks sent to the embedder per progress step.
const EMBED_STEP: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dims: usize,
    built_at: String,
    chunks: Vec<Chunk>,
}

/// How [`ensure_index`] obtained the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The persisted index matched the current fingerprint.
    Loaded,
    /// The index was rebuilt and persisted.
    Built,
}

impl IndexOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexOutcome::Loaded => "loaded",
            IndexOutcome::Built => "built",
        }
    }
}

/// A ready-to-search index plus the fingerprint it was built from.
#[derive(Debug)]
pub struct LoadedIndex {
    pub index: VectorIndex,
    pub stamp: String,
    pub outcome: IndexOutcome,
}

/// Return a searchable index for `sources`, loading or rebuilding it.
///
/// `sources` are `(path, display name)` pairs in a stable order; the order
/// is part of the fingerprint. With `force_rebuild` the persisted copy is
/// ignored even when its stamp matches.
///
/// # Errors
///
/// - [`RagError::Input`] if a source file is missing. Raised before the
///   embedder is called.
/// - [`RagError::Content`] if a document has no usable text.
/// - [`RagError::Embedding`] if the provider fails during a rebuild. The
///   previously persisted index is left untouched.
/// - [`RagError::Storage`] if the new index cannot be written.
pub async fn ensure_index(
    embedder: &dyn Embedder,
    sources: &[(PathBuf, String)],
    storage_dir: &Path,
    chunking: &ChunkingConfig,
    force_rebuild: bool,
    progress: &dyn IndexProgressReporter,
) -> Result<LoadedIndex, RagError> {
    progress.report(IndexProgressEvent::Fingerprinting {
        documents: sources.len(),
    });
    let paths: Vec<&Path> = sources.iter().map(|(p, _)| p.as_path()).collect();
    let current = fingerprint(&paths)?;

    if force_rebuild {
        tracing::info!("index rebuild forced");
    } else {
        match read_stamp(storage_dir) {
            Some(stamp) if stamp == current => match load_index(storage_dir, embedder).await {
                Ok(index) => {
                    tracing::info!(
                        dir = %storage_dir.display(),
                        chunks = index.len(),
                        "loaded cached index"
                    );
                    progress.report(IndexProgressEvent::Ready {
                        chunks: index.len() as u64,
                        built: false,
                    });
                    return Ok(LoadedIndex {
                        index,
                        stamp,
                        outcome: IndexOutcome::Loaded,
                    });
                }
                Err(e) => tracing::warn!("persisted index unusable, rebuilding: {}", e),
            },
            Some(_) => tracing::info!("source fingerprint changed, rebuilding index"),
            None => tracing::info!(dir = %storage_dir.display(), "no valid index stamp, building"),
        }
    }

    let index = build_index(embedder, sources, chunking, progress).await?;

    progress.report(IndexProgressEvent::Persisting);
    persist(storage_dir, &index, &current).await?;
    tracing::info!(
        dir = %storage_dir.display(),
        chunks = index.len(),
        stamp = %current,
        "persisted index"
    );
    progress.report(IndexProgressEvent::Ready {
        chunks: index.len() as u64,
        built: true,
    });

    Ok(LoadedIndex {
        index,
        stamp: current,
        outcome: IndexOutcome::Built,
    })
}

/// The stamp stored under `storage_dir`, if present and non-empty.
pub fn read_stamp(storage_dir: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(storage_dir.join(STAMP_FILE)).ok()?;
    let stamp = raw.trim();
    if stamp.is_empty() {
        None
    } else {
        Some(stamp.to_string())
    }
}

/// Extract, chunk, and embed every source in memory.
async fn build_index(
    embedder: &dyn Embedder,
    sources: &[(PathBuf, String)],
    chunking: &ChunkingConfig,
    progress: &dyn IndexProgressReporter,
) -> Result<VectorIndex, RagError> {
    let params = chunking.params();
    let mut chunks: Vec<Chunk> = Vec::new();
    for (path, name) in sources {
        progress.report(IndexProgressEvent::Loading {
            document: name.clone(),
        });
        let doc = load_pages(path, name)?;
        progress.report(IndexProgressEvent::Chunking {
            document: name.clone(),
            pages: doc.pages.len(),
        });
        chunks.extend(chunk_document(&doc, &params, chunking.min_document_chars)?);
    }

    let total = chunks.len() as u64;
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_STEP) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed(&texts).await.map_err(|e| {
            tracing::warn!(kind = %e.kind, "embedding failed during index build");
            RagError::Embedding(e)
        })?;
        if embedded.len() != texts.len() {
            return Err(RagError::Embedding(
                civic_rag_core::ProviderError::invalid_response(format!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    texts.len()
                )),
            ));
        }
        vectors.extend(embedded);
        progress.report(IndexProgressEvent::Embedding {
            n: vectors.len() as u64,
            total,
        });
    }

    VectorIndex::from_parts(embedder.model_name(), embedder.dims(), chunks, vectors)
}

/// Read and validate the persisted manifest and vectors.
async fn load_index(
    storage_dir: &Path,
    embedder: &dyn Embedder,
) -> Result<VectorIndex, RagError> {
    let manifest_path = storage_dir.join(MANIFEST_FILE);
    let raw = tokio::fs::read(&manifest_path)
        .await
        .map_err(|e| RagError::storage(format!("{}: {}", manifest_path.display(), e)))?;
    let manifest: Manifest = serde_json::from_slice(&raw)
        .map_err(|e| RagError::storage(format!("{}: {}", manifest_path.display(), e)))?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(RagError::storage(format!(
            "index format version {} (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }
    if manifest.dims != embedder.dims() {
        return Err(RagError::storage(format!(
            "index has {}-dim vectors, embedder produces {}",
            manifest.dims,
            embedder.dims()
        )));
    }
    if manifest.model != embedder.model_name() {
        tracing::warn!(
            index_model = %manifest.model,
            embedder_model = %embedder.model_name(),
            "index was built with a different embedding model; similarity quality may degrade"
        );
    }

    let vectors_path = storage_dir.join(VECTORS_FILE);
    let bytes = tokio::fs::read(&vectors_path)
        .await
        .map_err(|e| RagError::storage(format!("{}: {}", vectors_path.display(), e)))?;
    let expected = manifest.chunks.len() * manifest.dims * 4;
    if bytes.len() != expected {
        return Err(RagError::storage(format!(
            "{} is {} bytes, expected {}",
            vectors_path.display(),
            bytes.len(),
            expected
        )));
    }
    let vectors = if manifest.chunks.is_empty() {
        Vec::new()
    } else {
        bytes_to_vectors(&bytes, manifest.dims)
            .ok_or_else(|| RagError::storage("vector blob is not a whole number of vectors"))?
    };

    tracing::debug!(built_at = %manifest.built_at, "index manifest read");
    VectorIndex::from_parts(manifest.model, manifest.dims, manifest.chunks, vectors)
}

async fn persist(storage_dir: &Path, index: &VectorIndex, stamp: &str) -> Result<(), RagError> {
    tokio::fs::create_dir_all(storage_dir)
        .await
        .map_err(|e| storage_io(storage_dir, e))?;

    let stamp_path = storage_dir.join(STAMP_FILE);
    match tokio::fs::remove_file(&stamp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(storage_io(&stamp_path, e)),
    }

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        model: index.model_name().to_string(),
        dims: index.dims(),
        built_at: chrono::Utc::now().to_rfc3339(),
        chunks: index.chunks().cloned().collect(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| RagError::storage(format!("cannot serialize manifest: {}", e)))?;
    write_atomic(&storage_dir.join(MANIFEST_FILE), &manifest_bytes).await?;

    let vector_bytes = vectors_to_bytes(index.entries().iter().map(|e| e.vector.as_slice()));
    write_atomic(&storage_dir.join(VECTORS_FILE), &vector_bytes).await?;

    write_atomic(&stamp_path, stamp.as_bytes()).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RagError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| storage_io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_io(path, e))
}

fn storage_io(path: &Path, err: std::io::Error) -> RagError {
    RagError::storage(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use civic_rag_core::models::citation_for;
    use tempfile::TempDir;

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("doc.pdf:1:{}", i),
            document: "doc.pdf".into(),
            page: 1,
            chunk_index: i,
            offset: 0,
            text: text.into(),
            hash: String::new(),
            citation: citation_for("doc.pdf", 1),
        }
    }

    fn small_index(embedder: &HashingEmbedder) -> VectorIndex {
        let chunks = vec![chunk(0, "passport photo"), chunk(1, "dog licence")];
        let vectors = chunks.iter().map(|c| embedder.embed_one(&c.text)).collect();
        VectorIndex::from_parts(embedder.model_name(), embedder.dims(), chunks, vectors).unwrap()
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let embedder = HashingEmbedder::new(16);
        let index = small_index(&embedder);
        persist(tmp.path(), &index, "abc123").await.unwrap();

        assert_eq!(read_stamp(tmp.path()).as_deref(), Some("abc123"));
        let loaded = load_index(tmp.path(), &embedder).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.chunks().map(|c| c.text.clone()).collect::<Vec<_>>(),
            vec!["passport photo", "dog licence"]
        );
        assert_eq!(loaded.entries()[0].vector, index.entries()[0].vector);
        assert!(!tmp.path().join("stamp.tmp").exists());
    }

    #[tokio::test]
    async fn truncated_vectors_rejected() {
        let tmp = TempDir::new().unwrap();
        let embedder = HashingEmbedder::new(16);
        persist(tmp.path(), &small_index(&embedder), "s").await.unwrap();

        let path = tmp.path().join(VECTORS_FILE);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();
        assert!(matches!(
            load_index(tmp.path(), &embedder).await,
            Err(RagError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn dims_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        persist(tmp.path(), &small_index(&HashingEmbedder::new(16)), "s")
            .await
            .unwrap();
        assert!(load_index(tmp.path(), &HashingEmbedder::new(32))
            .await
            .is_err());
    }

    #[test]
    fn missing_or_blank_stamp_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_stamp(tmp.path()), None);
        std::fs::write(tmp.path().join(STAMP_FILE), "  \n").unwrap();
        assert_eq!(read_stamp(tmp.path()), None);
        std::fs::write(tmp.path().join(STAMP_FILE), "deadbeef\n").unwrap();
        assert_eq!(read_stamp(tmp.path()).as_deref(), Some("deadbeef"));
    }

    #[tokio::test]
    async fn garbage_manifest_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), b"{not json").unwrap();
        let err = load_index(tmp.path(), &HashingEmbedder::new(16))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Storage(_)));
    }
}
