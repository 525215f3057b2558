use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use ragstore_core::config::{expand_path, EmbeddingProviderKind, EmbeddingSettings};
use ragstore_core::traits::Embedder;

use crate::hash::HashEmbedder;
use crate::model::{resolve_model_dir, CandleEmbedder};
use crate::timeout::TimeoutEmbedder;

/// `APP_USE_FAKE_EMBEDDINGS=1|true` swaps any configured provider for the hashing one.
pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Builds the configured provider, honouring `APP_USE_FAKE_EMBEDDINGS`.
/// `Ok(None)` means no provider is configured.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Option<Arc<dyn Embedder>>> {
    build_embedder(settings, use_fake_embeddings())
}

pub fn build_embedder(settings: &EmbeddingSettings, force_fake: bool) -> Result<Option<Arc<dyn Embedder>>> {
    let provider = if force_fake { EmbeddingProviderKind::Hash } else { settings.provider };
    let embedder: Arc<dyn Embedder> = match provider {
        EmbeddingProviderKind::None => {
            info!("no embedding provider configured");
            return Ok(None);
        }
        EmbeddingProviderKind::Hash => Arc::new(HashEmbedder::new(settings.dimension)?),
        EmbeddingProviderKind::Candle => {
            let configured = settings.model_dir.as_deref().map(expand_path);
            let model_dir = resolve_model_dir(configured.as_deref())?;
            Arc::new(CandleEmbedder::load(&model_dir, settings.max_len)?)
        }
    };
    info!(embedder = embedder.embedder_id(), forced = force_fake, "embedding provider ready");
    let embedder: Arc<dyn Embedder> = match settings.timeout() {
        Some(timeout) => Arc::new(TimeoutEmbedder::new(embedder, timeout)?),
        None => embedder,
    };
    Ok(Some(embedder))
}
