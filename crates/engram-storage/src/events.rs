//! Temporal event operations
//!
//! Events are time-ordered logs with hybrid retrieval: BM25 over a
//! lowercase+snowball analyzer, cosine over the vector index, or both
//! combined. Subjects follow the `category:identifier` convention.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::EventHit;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use surrealdb::RecordId;
use surrealdb::sql::Datetime;
use uuid::Uuid;

/// Default result budget when the caller does not pass a limit
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Cosine floor a row must clear to survive the hybrid OR-filter
const HYBRID_COSINE_FLOOR: f64 = 0.3;

/// Resolved event search request
///
/// Time bounds are absolute; relative windows are resolved by the retrieval
/// layer before the request reaches storage. Execution mode follows from
/// which of `text`/`embedding` are present.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub user_id: String,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ScoredRow {
    id: RecordId,
    subject: String,
    content: String,
    metadata: Option<serde_json::Value>,
    created_at: Datetime,
    #[serde(default)]
    text_score: Option<f64>,
    #[serde(default)]
    cos_sim: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SubjectRow {
    subject: String,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: String,
}

impl ScoredRow {
    fn into_hit(self, relevance: f64) -> EventHit {
        EventHit {
            id: self.id.key().to_string(),
            subject: self.subject,
            content: self.content,
            metadata: self.metadata,
            created_at: self.created_at.to_rfc3339(),
            relevance,
        }
    }
}

impl Storage {
    /// Append one event; returns the generated id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn save_event(
        &self,
        user_id: &str,
        subject: &str,
        content: &str,
        embedding: &[f32],
        metadata: Option<serde_json::Value>,
    ) -> StorageResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let vector = self.normalize_embedding(embedding);
        self.db()
            .query(
                "CREATE type::thing('events', $id) CONTENT { \
                 user_id: $user_id, subject: $subject, content: $content, \
                 embedding: $embedding, metadata: $metadata, created_at: time::now() } \
                 RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("user_id", user_id.to_string()))
            .bind(("subject", subject.to_string()))
            .bind(("content", content.to_string()))
            .bind(("embedding", vector))
            .bind(("metadata", metadata))
            .await?
            .check()?;
        Ok(id)
    }

    /// Search events in one of four modes chosen by the request
    ///
    /// - text + embedding: hybrid `0.5·bm25 + 0.5·cosine`, keeping rows that
    ///   match the text OR clear the cosine floor
    /// - text only: BM25 order
    /// - embedding only: cosine order
    /// - neither: recency order with constant relevance 1.0
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the search fails.
    pub async fn search_events(&self, query: &EventQuery) -> StorageResult<Vec<EventHit>> {
        let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
        match (&query.text, &query.embedding) {
            (Some(text), Some(embedding)) => {
                self.search_events_hybrid(query, text, embedding, limit).await
            }
            (Some(text), None) => self.search_events_text(query, text, limit).await,
            (None, Some(embedding)) => {
                self.search_events_vector(query, embedding, limit).await
            }
            (None, None) => self.search_events_recent(query, limit).await,
        }
    }

    async fn search_events_hybrid(
        &self,
        query: &EventQuery,
        text: &str,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<EventHit>> {
        let filters = time_filters(query);
        let sql = format!(
            "SELECT id, subject, content, metadata, created_at, \
             search::score(1) AS text_score, \
             vector::similarity::cosine(embedding, $query_embedding) AS cos_sim \
             FROM events WHERE user_id = $user_id{filters} \
             AND (content @1@ $query_text \
             OR vector::similarity::cosine(embedding, $query_embedding) > {HYBRID_COSINE_FLOOR}) \
             LIMIT $fetch"
        );
        // Over-fetch, then rank by the combined score client-side: a row that
        // matched only one leg carries NONE for the other score.
        let rows = self
            .scored_query(&sql, query, limit.saturating_mul(2))
            .bind(("query_text", text.to_string()))
            .bind(("query_embedding", self.normalize_embedding(embedding)))
            .await?
            .check()?
            .take::<Vec<ScoredRow>>(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        let mut hits: Vec<EventHit> = rows
            .into_iter()
            .map(|row| {
                let relevance = 0.5 * row.text_score.unwrap_or(0.0)
                    + 0.5 * row.cos_sim.unwrap_or(0.0);
                row.into_hit(relevance)
            })
            .collect();
        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_events_text(
        &self,
        query: &EventQuery,
        text: &str,
        limit: usize,
    ) -> StorageResult<Vec<EventHit>> {
        let filters = time_filters(query);
        let sql = format!(
            "SELECT id, subject, content, metadata, created_at, \
             search::score(1) AS text_score \
             FROM events WHERE user_id = $user_id{filters} AND content @1@ $query_text \
             ORDER BY text_score DESC LIMIT $fetch"
        );
        let rows = self
            .scored_query(&sql, query, limit)
            .bind(("query_text", text.to_string()))
            .await?
            .check()?
            .take::<Vec<ScoredRow>>(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let relevance = row.text_score.unwrap_or(0.0);
                row.into_hit(relevance)
            })
            .collect())
    }

    async fn search_events_vector(
        &self,
        query: &EventQuery,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<EventHit>> {
        let filters = time_filters(query);
        let sql = format!(
            "SELECT id, subject, content, metadata, created_at, \
             vector::similarity::cosine(embedding, $query_embedding) AS cos_sim \
             FROM events WHERE user_id = $user_id{filters} \
             ORDER BY cos_sim DESC LIMIT $fetch"
        );
        let rows = self
            .scored_query(&sql, query, limit)
            .bind(("query_embedding", self.normalize_embedding(embedding)))
            .await?
            .check()?
            .take::<Vec<ScoredRow>>(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let relevance = row.cos_sim.unwrap_or(0.0);
                row.into_hit(relevance)
            })
            .collect())
    }

    async fn search_events_recent(
        &self,
        query: &EventQuery,
        limit: usize,
    ) -> StorageResult<Vec<EventHit>> {
        let filters = time_filters(query);
        let sql = format!(
            "SELECT id, subject, content, metadata, created_at \
             FROM events WHERE user_id = $user_id{filters} \
             ORDER BY created_at DESC LIMIT $fetch"
        );
        let rows = self
            .scored_query(&sql, query, limit)
            .await?
            .check()?
            .take::<Vec<ScoredRow>>(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.into_hit(1.0)).collect())
    }

    /// Common binds shared by all four modes
    fn scored_query<'a>(
        &'a self,
        sql: &str,
        query: &EventQuery,
        fetch: usize,
    ) -> surrealdb::method::Query<'a, surrealdb::engine::any::Any> {
        let mut request = self
            .db()
            .query(sql.to_string())
            .bind(("user_id", query.user_id.clone()))
            .bind(("fetch", fetch as i64));
        if let Some(subject) = &query.subject {
            request = request.bind(("subject", subject.clone()));
        }
        if let Some(from) = query.from {
            request = request.bind(("from", Datetime::from(from)));
        }
        if let Some(to) = query.to {
            request = request.bind(("to", Datetime::from(to)));
        }
        request
    }

    /// Known subjects, optionally scoped to one user
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_event_subjects(
        &self,
        user_id: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        let sql = if user_id.is_some() {
            "SELECT subject FROM events WHERE user_id = $user_id GROUP BY subject"
        } else {
            "SELECT subject FROM events GROUP BY subject"
        };
        let mut request = self.db().query(sql);
        if let Some(user) = user_id {
            request = request.bind(("user_id", user.to_string()));
        }
        let mut response = request.await?.check()?;
        let rows: Vec<SubjectRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.subject).collect())
    }

    /// Distinct scope ids known to the events table
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_event_users(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT user_id FROM events GROUP BY user_id")
            .await?
            .check()?;
        let rows: Vec<UserRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }
}

/// Extra WHERE clauses shared by every mode; values arrive via binds
fn time_filters(query: &EventQuery) -> String {
    let mut filters = String::new();
    if query.subject.is_some() {
        filters.push_str(" AND subject = $subject");
    }
    if query.from.is_some() {
        filters.push_str(" AND created_at >= $from");
    }
    if query.to.is_some() {
        filters.push_str(" AND created_at <= $to");
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::EventQuery;
    use crate::Storage;

    async fn storage() -> Storage {
        let storage = Storage::connect_memory(4).await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn recency_mode_orders_newest_first() {
        let storage = storage().await;
        storage
            .save_event("p1", "log:build", "first", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .save_event("p1", "log:build", "second", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();

        let hits = storage
            .search_events(&EventQuery {
                user_id: "p1".into(),
                ..EventQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "second");
        assert!((hits[0].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn text_mode_ranks_bm25_matches() {
        let storage = storage().await;
        storage
            .save_event("p1", "log:build", "build ok", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .save_event(
                "p1",
                "log:build",
                "build failed: database connection",
                &[0.0, 1.0, 0.0, 0.0],
                None,
            )
            .await
            .unwrap();
        storage
            .save_event(
                "p1",
                "conversation:c1",
                "user said hello",
                &[0.0, 0.0, 1.0, 0.0],
                None,
            )
            .await
            .unwrap();

        let hits = storage
            .search_events(&EventQuery {
                user_id: "p1".into(),
                text: Some("database".into()),
                ..EventQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("database"));
        assert!(hits[0].relevance > 0.0);
    }

    #[tokio::test]
    async fn hybrid_mode_keeps_text_and_cosine_matches_only() {
        let storage = storage().await;
        let query_vec = [1.0, 0.0, 0.0, 0.0];
        // A: cosine-close to the query but no text match
        storage
            .save_event("p1", "log:build", "build ok", &[0.9, 0.1, 0.0, 0.0], None)
            .await
            .unwrap();
        // B: text match and cosine-close
        storage
            .save_event(
                "p1",
                "log:build",
                "build failed: database connection",
                &[1.0, 0.0, 0.0, 0.0],
                None,
            )
            .await
            .unwrap();
        // C: neither text match nor cosine proximity
        storage
            .save_event(
                "p1",
                "conversation:c1",
                "user said hello",
                &[0.0, 0.0, 1.0, 0.0],
                None,
            )
            .await
            .unwrap();

        let hits = storage
            .search_events(&EventQuery {
                user_id: "p1".into(),
                text: Some("database".into()),
                embedding: Some(query_vec.to_vec()),
                ..EventQuery::default()
            })
            .await
            .unwrap();

        assert!(hits.iter().all(|h| h.content != "user said hello"));
        assert_eq!(hits[0].content, "build failed: database connection");
        if let Some(second) = hits.get(1) {
            assert_eq!(second.content, "build ok");
            assert!(second.relevance < hits[0].relevance);
        }
    }

    #[tokio::test]
    async fn subject_and_user_filters_apply_in_every_mode() {
        let storage = storage().await;
        storage
            .save_event("p1", "log:build", "one", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .save_event("p1", "log:test", "two", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .save_event("p2", "log:build", "three", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();

        let hits = storage
            .search_events(&EventQuery {
                user_id: "p1".into(),
                subject: Some("log:build".into()),
                ..EventQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "one");

        let subjects = storage.list_event_subjects(Some("p1")).await.unwrap();
        assert_eq!(subjects.len(), 2);
        let mut users = storage.list_event_users().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn results_never_exceed_the_limit() {
        let storage = storage().await;
        for i in 0..8 {
            storage
                .save_event("p1", "log:x", &format!("event {i}"), &[1.0, 0.0, 0.0, 0.0], None)
                .await
                .unwrap();
        }
        let hits = storage
            .search_events(&EventQuery {
                user_id: "p1".into(),
                limit: Some(3),
                ..EventQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }
}
