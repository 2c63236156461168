//! Retrieval service over storage and the embedder
//!
//! Handles the parts storage should not know about: resolving relative time
//! windows, generating query embeddings, one retry on transient failures,
//! and attaching "did you mean" alternatives when a scoped read comes back
//! empty.

use crate::error::{SearchError, SearchResult};
use crate::types::{EventSearchRequest, Scoped};
use chrono::{DateTime, Duration, Months, Utc};
use engram_common::CorrelationId;
use engram_embeddings::{TextEmbedder, embed_one};
use engram_storage::{
    CodeSymbol, DocumentHit, EventHit, EventQuery, Storage, StorageError, SymbolHit, VectorHit,
};
use std::sync::Arc;

const RETRY_DELAY_MS: u64 = 100;

/// Hybrid search, semantic search and alternatives suggestion
pub struct SearchService {
    storage: Storage,
    embedder: Arc<dyn TextEmbedder>,
}

impl SearchService {
    pub fn new(storage: Storage, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { storage, embedder }
    }

    /// Event search across the four storage execution modes
    ///
    /// A text query is embedded server-side so the storage layer can run the
    /// BM25+cosine hybrid; if embedding fails the search degrades to
    /// BM25-only rather than failing the call.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Input` for malformed dates or a missing
    /// `user_id`, `SearchError::Storage` when the query fails after retry.
    pub async fn search_events(
        &self,
        request: &EventSearchRequest,
        correlation_id: &CorrelationId,
    ) -> SearchResult<Scoped<EventHit>> {
        if request.user_id.trim().is_empty() {
            return Err(SearchError::Input("user_id is required".into()));
        }

        let (from, to) = resolve_time_window(request, Utc::now())?;
        let embedding = match &request.query {
            Some(text) => match embed_one(self.embedder.as_ref(), text).await {
                Ok(vector) => vector,
                Err(e) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "query embedding failed, degrading to text-only search"
                    );
                    None
                }
            },
            None => None,
        };

        let query = EventQuery {
            user_id: request.user_id.clone(),
            subject: request.subject.clone(),
            text: request.query.clone(),
            embedding,
            from,
            to,
            limit: request.limit,
        };

        let hits = self
            .retry(|| async { self.storage.search_events(&query).await })
            .await?;
        if hits.is_empty() {
            let known = self.storage.list_event_users().await?;
            if !known.contains(&request.user_id) {
                return Ok(Scoped::empty_with(known));
            }
        }
        Ok(Scoped::hit(hits))
    }

    /// Semantic search over vector memories
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Embedding` when the query cannot be embedded,
    /// `SearchError::Storage` when the search fails after retry.
    pub async fn search_vectors(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> SearchResult<Scoped<VectorHit>> {
        let embedding = embed_one(self.embedder.as_ref(), query)
            .await?
            .ok_or_else(|| SearchError::Input("query produced no embedding".into()))?;
        let hits = self
            .retry(|| async {
                self.storage
                    .search_vectors(Some(user_id), &embedding, limit)
                    .await
            })
            .await?;
        if hits.is_empty() {
            let known = self.storage.list_vector_users().await?;
            if !known.iter().any(|u| u == user_id) {
                return Ok(Scoped::empty_with(known));
            }
        }
        Ok(Scoped::hit(hits))
    }

    /// Semantic search over code symbols, optionally filtered by kind
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Embedding` when the query cannot be embedded,
    /// `SearchError::Storage` when the search fails after retry.
    pub async fn search_symbols(
        &self,
        project_id: &str,
        query: &str,
        symbol_types: Option<&[String]>,
        limit: usize,
    ) -> SearchResult<Scoped<SymbolHit>> {
        let embedding = embed_one(self.embedder.as_ref(), query)
            .await?
            .ok_or_else(|| SearchError::Input("query produced no embedding".into()))?;
        let hits = self
            .retry(|| async {
                self.storage
                    .search_code_symbols(project_id, &embedding, symbol_types, limit)
                    .await
            })
            .await?;
        self.with_project_alternatives(project_id, hits).await
    }

    /// Lexical symbol lookup by exact name or prefix
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Storage` when the lookup fails after retry.
    pub async fn find_symbols_by_name(
        &self,
        project_id: &str,
        name: &str,
        limit: usize,
    ) -> SearchResult<Scoped<CodeSymbol>> {
        let hits = self
            .retry(|| async {
                self.storage
                    .find_symbols_by_name(project_id, name, limit)
                    .await
            })
            .await?;
        self.with_project_alternatives(project_id, hits).await
    }

    /// Every symbol extracted from one file
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Storage` when the lookup fails after retry.
    pub async fn find_symbols_by_file(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> SearchResult<Scoped<CodeSymbol>> {
        let hits = self
            .retry(|| async {
                self.storage
                    .find_symbols_by_file(project_id, file_path)
                    .await
            })
            .await?;
        self.with_project_alternatives(project_id, hits).await
    }

    /// Semantic search over knowledge-base documents
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Embedding` when the query cannot be embedded,
    /// `SearchError::Storage` when the search fails after retry.
    pub async fn search_documents(
        &self,
        query: &str,
        limit: usize,
    ) -> SearchResult<Vec<DocumentHit>> {
        let embedding = embed_one(self.embedder.as_ref(), query)
            .await?
            .ok_or_else(|| SearchError::Input("query produced no embedding".into()))?;
        Ok(self
            .retry(|| async { self.storage.search_documents(&embedding, limit).await })
            .await?)
    }

    async fn with_project_alternatives<T>(
        &self,
        project_id: &str,
        hits: Vec<T>,
    ) -> SearchResult<Scoped<T>> {
        if hits.is_empty() {
            let known = self.storage.list_project_ids().await?;
            if !known.iter().any(|p| p == project_id) {
                return Ok(Scoped::empty_with(known));
            }
        }
        Ok(Scoped::hit(hits))
    }

    /// One retry on transient storage failures
    async fn retry<T, F, Fut>(&self, operation: F) -> Result<T, StorageError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            Err(StorageError::Connection(first)) => {
                tracing::warn!(error = %first, "storage call failed, retrying once");
                tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                operation().await
            }
            Err(other) => Err(other),
        }
    }
}

/// Resolve the request's time filters into absolute bounds
///
/// Relative windows (`last_hours`/`last_days`/`last_months`) become a
/// `from` bound; explicit absolute bounds take precedence.
fn resolve_time_window(
    request: &EventSearchRequest,
    now: DateTime<Utc>,
) -> SearchResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let mut from = request
        .from_date
        .as_deref()
        .map(parse_rfc3339)
        .transpose()?;
    let to = request.to_date.as_deref().map(parse_rfc3339).transpose()?;

    if from.is_none() {
        if let Some(hours) = request.last_hours {
            from = Some(now - Duration::hours(hours));
        } else if let Some(days) = request.last_days {
            from = Some(now - Duration::days(days));
        } else if let Some(months) = request.last_months {
            from = now.checked_sub_months(Months::new(months));
        }
    }
    Ok((from, to))
}

fn parse_rfc3339(raw: &str) -> SearchResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SearchError::Input(format!("invalid RFC3339 date '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EventSearchRequest {
        EventSearchRequest {
            user_id: "u".into(),
            ..EventSearchRequest::default()
        }
    }

    #[test]
    fn absolute_bounds_win_over_relative() {
        let now = Utc::now();
        let mut req = request();
        req.from_date = Some("2026-01-01T00:00:00Z".into());
        req.last_days = Some(7);

        let (from, to) = resolve_time_window(&req, now).unwrap();
        assert_eq!(
            from.unwrap(),
            parse_rfc3339("2026-01-01T00:00:00Z").unwrap()
        );
        assert!(to.is_none());
    }

    #[test]
    fn relative_windows_resolve_against_now() {
        let now = Utc::now();
        let mut req = request();
        req.last_hours = Some(2);
        let (from, _) = resolve_time_window(&req, now).unwrap();
        assert_eq!(from.unwrap(), now - Duration::hours(2));

        let mut req = request();
        req.last_days = Some(7);
        let (from, _) = resolve_time_window(&req, now).unwrap();
        assert_eq!(from.unwrap(), now - Duration::days(7));

        let mut req = request();
        req.last_months = Some(1);
        let (from, _) = resolve_time_window(&req, now).unwrap();
        assert!(from.unwrap() < now - Duration::days(27));
    }

    #[test]
    fn malformed_dates_are_input_errors() {
        let mut req = request();
        req.from_date = Some("yesterday".into());
        let err = resolve_time_window(&req, Utc::now()).unwrap_err();
        assert!(matches!(err, SearchError::Input(_)));
    }
}
