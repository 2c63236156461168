//! Deterministic local embedder for development and tests
//!
//! Maps text onto a fixed-dimension vector by hashing trigrams into buckets.
//! Similar strings land on overlapping buckets, which is enough for tests to
//! exercise cosine ranking without a model runtime.

use crate::{EmbeddingResult, TextEmbedder};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Trigram-bucket hashing embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    max_chars: usize,
}

impl HashEmbedder {
    pub const fn new(dimension: usize, max_chars: usize) -> Self {
        Self {
            dimension,
            max_chars,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let bytes = lowered.as_bytes();
        if bytes.is_empty() {
            return vector;
        }
        for window in bytes.windows(3.min(bytes.len())) {
            let digest = Sha256::digest(window);
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimension;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        // L2-normalise so cosine similarity behaves like the real providers
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>> {
        Ok(texts.iter().map(|t| Some(self.embed_text(t))).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn model_name(&self) -> &str {
        "hash-trigram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
    }

    #[tokio::test]
    async fn output_has_fixed_dimension() {
        let embedder = HashEmbedder::new(64, 900);
        let vectors = embedder
            .embed(&["hello world".to_string(), String::new()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        for v in vectors {
            assert_eq!(v.unwrap().len(), 64);
        }
    }

    #[tokio::test]
    async fn identical_text_is_identical() {
        let embedder = HashEmbedder::new(128, 900);
        let a = embedder.embed(&["database error".to_string()]).await.unwrap();
        let b = embedder.embed(&["database error".to_string()]).await.unwrap();
        assert_eq!(a[0], b[0]);
    }

    #[tokio::test]
    async fn similar_text_ranks_above_unrelated() {
        let embedder = HashEmbedder::new(256, 900);
        let vectors = embedder
            .embed(&[
                "database connection failed".to_string(),
                "the database connection".to_string(),
                "completely unrelated banana stand".to_string(),
            ])
            .await
            .unwrap();
        let query = vectors[0].as_ref().unwrap();
        let close = cosine(query, vectors[1].as_ref().unwrap());
        let far = cosine(query, vectors[2].as_ref().unwrap());
        assert!(close > far, "expected {close} > {far}");
    }
}
