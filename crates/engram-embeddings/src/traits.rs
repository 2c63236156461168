//! Trait abstraction for embedding generation
//!
//! Providers are interchangeable behind [`TextEmbedder`]; the rest of the
//! system only ever sees fixed-dimension float vectors and an input budget.

use crate::EmbeddingResult;
use async_trait::async_trait;

/// Produces dense vectors for batches of text
///
/// A `None` entry in the output marks a per-item failure. Callers tolerate
/// missing vectors: the affected record is stored without an embedding and
/// stays reachable through lexical search.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of documents, one output slot per input
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>>;

    /// Output dimension D of every produced vector
    fn dimension(&self) -> usize;

    /// Maximum input size in characters this provider accepts
    fn max_chars(&self) -> usize;

    /// Model identifier, for logs and stats
    fn model_name(&self) -> &str;
}

/// Convenience for embedding a single query string
pub async fn embed_one(
    embedder: &dyn TextEmbedder,
    text: &str,
) -> EmbeddingResult<Option<Vec<f32>>> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    Ok(vectors.pop().flatten())
}
