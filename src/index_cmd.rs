//! `civic index` and the index bootstrap shared by every query command.

use anyhow::{Context, Result};

use civic_rag_core::embedding::Embedder;

use crate::config::Config;
use crate::credentials::ApiKey;
use crate::embedding::create_embedder;
use crate::index_store::{ensure_index, LoadedIndex};
use crate::progress::ProgressMode;

/// Build the configured embedder, resolving the API key only if the
/// provider needs one.
pub fn build_embedder(config: &Config, api_key: Option<&str>) -> Result<Box<dyn Embedder>> {
    let key = if config.embedding.needs_api_key() {
        Some(
            ApiKey::resolve(api_key, &config.embedding.api_key_env)
                .context("embedding provider credential")?,
        )
    } else {
        None
    };
    Ok(create_embedder(&config.embedding, key.as_ref())?)
}

/// Load the persisted index or rebuild it.
pub async fn open_index(
    config: &Config,
    embedder: &dyn Embedder,
    force_rebuild: bool,
    progress: ProgressMode,
) -> Result<LoadedIndex> {
    let reporter = progress.reporter();
    let sources = config.document.sources();
    let loaded = ensure_index(
        embedder,
        &sources,
        &config.index.dir,
        &config.chunking,
        force_rebuild,
        reporter.as_ref(),
    )
    .await
    .with_context(|| format!("preparing index in {}", config.index.dir.display()))?;
    Ok(loaded)
}

/// `civic index [--rebuild]`.
pub async fn run_index(
    config: &Config,
    api_key: Option<&str>,
    rebuild: bool,
    progress: ProgressMode,
) -> Result<()> {
    let embedder = build_embedder(config, api_key)?;
    let loaded = open_index(config, embedder.as_ref(), rebuild, progress).await?;

    println!("Index {}.", loaded.outcome.as_str());
    println!("  chunks:    {}", loaded.index.len());
    println!("  model:     {}", loaded.index.model_name());
    println!("  stamp:     {}", loaded.stamp);
    println!("  directory: {}", config.index.dir.display());
    Ok(())
}
