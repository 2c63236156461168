//! HTTP embedding providers (Ollama and OpenAI-compatible)
//!
//! Both providers batch per request, retry transient failures once, and map a
//! per-item provider failure to `None` rather than failing the whole batch.

use crate::{EmbeddingError, EmbeddingResult, TextEmbedder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Ollama `/api/embed` provider
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    max_chars: usize,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Build a provider for an Ollama endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        max_chars: usize,
    ) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            dimension,
            max_chars,
        })
    }

    async fn request(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>> {
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = OllamaRequest {
            model: &self.model,
            input: texts,
        };
        let response = self.client.post(&endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(EmbeddingError::Response(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }
        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Response(e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Response(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed
            .embeddings
            .into_iter()
            .map(|v| if v.is_empty() { None } else { Some(v) })
            .collect())
    }
}

#[async_trait]
impl TextEmbedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.request(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(EmbeddingError::Network(first)) => {
                tracing::warn!(error = %first, "embedding request failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.request(texts).await
            }
            Err(e) => Err(e),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible `/v1/embeddings` provider
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    max_chars: usize,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiDatum>,
}

#[derive(Deserialize)]
struct OpenAiDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Build a provider for an OpenAI-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
        max_chars: usize,
    ) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            api_key,
            dimension,
            max_chars,
        })
    }

    async fn request(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>> {
        let endpoint = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let body = OpenAiRequest {
            model: &self.model,
            input: texts,
        };
        let mut request = self.client.post(&endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbeddingError::Response(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }
        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Response(e.to_string()))?;

        // The API is allowed to reorder; slot each datum by its index.
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for datum in parsed.data {
            if let Some(slot) = vectors.get_mut(datum.index) {
                *slot = Some(datum.embedding);
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl TextEmbedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.request(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(EmbeddingError::Network(first)) => {
                tracing::warn!(error = %first, "embedding request failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.request(texts).await
            }
            Err(e) => Err(e),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ollama_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "test-model", 2, 900).unwrap();
        let vectors = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], Some(vec![0.1, 0.2]));
        assert_eq!(vectors[1], Some(vec![0.3, 0.4]));
    }

    #[tokio::test]
    async fn ollama_empty_vector_is_item_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.5], []]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "test-model", 1, 900).unwrap();
        let vectors = embedder
            .embed(&["ok".to_string(), "bad".to_string()])
            .await
            .unwrap();
        assert!(vectors[0].is_some());
        assert!(vectors[1].is_none());
    }

    #[tokio::test]
    async fn openai_reordered_data_is_slotted_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [2.0]},
                    {"index": 0, "embedding": [1.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder =
            OpenAiEmbedder::new(server.uri(), "test-model", None, 1, 900).unwrap();
        let vectors = embedder
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], Some(vec![1.0]));
        assert_eq!(vectors[1], Some(vec![2.0]));
    }

    #[tokio::test]
    async fn server_error_surfaces_as_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "test-model", 2, 900).unwrap();
        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Response(_)));
    }
}
