//! Engram embedding providers
//!
//! The embedding model runtime is an external collaborator: this crate only
//! defines the [`TextEmbedder`] contract and ships thin HTTP providers plus a
//! deterministic local embedder for development and tests.

pub mod error;
pub mod hash;
pub mod remote;
pub mod traits;

pub use error::{EmbeddingError, EmbeddingResult};
pub use hash::HashEmbedder;
pub use remote::{OllamaEmbedder, OpenAiEmbedder};
pub use traits::{TextEmbedder, embed_one};

use engram_config::{EmbeddingConfig, EmbeddingProviderKind};
use std::sync::Arc;

/// Build the configured embedding provider
///
/// # Errors
///
/// Returns a configuration error when the provider's HTTP client cannot be
/// constructed.
pub fn build_embedder(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn TextEmbedder>> {
    let embedder: Arc<dyn TextEmbedder> = match config.provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(
            config.url.clone(),
            config.model.clone(),
            config.dimension,
            config.max_chars,
        )?),
        EmbeddingProviderKind::Openai => Arc::new(OpenAiEmbedder::new(
            config.url.clone(),
            config.model.clone(),
            config.api_key.clone(),
            config.dimension,
            config.max_chars,
        )?),
        EmbeddingProviderKind::Hash => {
            Arc::new(HashEmbedder::new(config.dimension, config.max_chars))
        }
    };
    tracing::info!(
        provider = ?config.provider,
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "embedding provider ready"
    );
    Ok(embedder)
}
