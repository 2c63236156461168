//! Vector memory operations
//!
//! Arbitrary text with dense embeddings for semantic recall. Every stored
//! vector is normalised to dimension D and widened to f64 on the wire.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::ids::record_key;
use crate::models::{VectorHit, VectorMemory};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: String,
}

impl Storage {
    /// Store a new vector memory; returns the generated id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn index_vector(
        &self,
        user_id: &str,
        content: &str,
        embedding: &[f32],
        metadata: Option<serde_json::Value>,
    ) -> StorageResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let vector = self.normalize_embedding(embedding);
        self.db()
            .query(
                "CREATE type::thing('vector_memories', $id) CONTENT { \
                 user_id: $user_id, content: $content, embedding: $embedding, \
                 metadata: $metadata, created_at: time::now(), updated_at: time::now() } \
                 RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("user_id", user_id.to_string()))
            .bind(("content", content.to_string()))
            .bind(("embedding", vector))
            .bind(("metadata", metadata))
            .await?
            .check()?;
        self.refresh_vector_stats(user_id).await?;
        Ok(id)
    }

    /// Read one vector memory by id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_vector(&self, id: &str) -> StorageResult<Option<VectorMemory>> {
        let key = record_key(id, "vector_memories").to_string();
        let mut response = self
            .db()
            .query("SELECT * FROM type::thing('vector_memories', $id)")
            .bind(("id", key))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Update content/embedding/metadata of an existing vector memory
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Missing` when the record does not exist.
    pub async fn update_vector(
        &self,
        id: &str,
        content: Option<&str>,
        embedding: Option<&[f32]>,
        metadata: Option<serde_json::Value>,
    ) -> StorageResult<()> {
        let existing = self.get_vector(id).await?;
        let Some(existing) = existing else {
            return Err(StorageError::Missing(format!("vector memory '{id}'")));
        };

        let key = record_key(id, "vector_memories").to_string();
        let vector = embedding.map(|e| self.normalize_embedding(e));
        self.db()
            .query(
                "UPDATE type::thing('vector_memories', $id) SET \
                 content = $content, embedding = $embedding, metadata = $metadata, \
                 updated_at = time::now() RETURN NONE",
            )
            .bind(("id", key))
            .bind((
                "content",
                content.map_or(existing.content, String::from),
            ))
            .bind(("embedding", vector.unwrap_or(existing.embedding)))
            .bind(("metadata", metadata.or(existing.metadata)))
            .await?
            .check()?;
        Ok(())
    }

    /// Delete a vector memory; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_vector(&self, id: &str) -> StorageResult<bool> {
        let Some(existing) = self.get_vector(id).await? else {
            return Ok(false);
        };
        let key = record_key(id, "vector_memories").to_string();
        self.db()
            .query("DELETE type::thing('vector_memories', $id)")
            .bind(("id", key))
            .await?
            .check()?;
        self.refresh_vector_stats(&existing.user_id).await?;
        Ok(true)
    }

    /// Cosine top-k over the vector memory index
    ///
    /// Scoping by `user_id` is optional but explicit: `None` searches every
    /// scope.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the search fails.
    pub async fn search_vectors(
        &self,
        user_id: Option<&str>,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<VectorHit>> {
        let vector = self.normalize_embedding(embedding);
        let sql = if user_id.is_some() {
            "SELECT id, content, metadata, \
             vector::similarity::cosine(embedding, $query_embedding) AS similarity \
             FROM vector_memories WHERE user_id = $user_id \
             ORDER BY similarity DESC LIMIT $limit"
        } else {
            "SELECT id, content, metadata, \
             vector::similarity::cosine(embedding, $query_embedding) AS similarity \
             FROM vector_memories ORDER BY similarity DESC LIMIT $limit"
        };
        let mut query = self
            .db()
            .query(sql)
            .bind(("query_embedding", vector))
            .bind(("limit", limit as i64));
        if let Some(user) = user_id {
            query = query.bind(("user_id", user.to_string()));
        }
        let mut response = query.await?.check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Distinct scope ids known to the vector memory table
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_vector_users(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT user_id FROM vector_memories GROUP BY user_id")
            .await?
            .check()?;
        let rows: Vec<UserRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::Storage;
    use serde_json::json;

    async fn storage() -> Storage {
        let storage = Storage::connect_memory(4).await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn stored_vectors_are_normalised_to_dimension() {
        let storage = storage().await;
        let id = storage
            .index_vector("u1", "short", &[1.0, 2.0], None)
            .await
            .unwrap();
        let memory = storage.get_vector(&id).await.unwrap().unwrap();
        assert_eq!(memory.embedding.len(), 4);
        assert_eq!(memory.embedding[2], 0.0);

        let id = storage
            .index_vector("u1", "long", &[1.0; 9], None)
            .await
            .unwrap();
        let memory = storage.get_vector(&id).await.unwrap().unwrap();
        assert_eq!(memory.embedding.len(), 4);
    }

    #[tokio::test]
    async fn search_is_scoped_and_ranked() {
        let storage = storage().await;
        storage
            .index_vector("u1", "close", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .index_vector("u1", "far", &[0.0, 1.0, 0.0, 0.0], None)
            .await
            .unwrap();
        storage
            .index_vector("u2", "other scope", &[1.0, 0.0, 0.0, 0.0], None)
            .await
            .unwrap();

        let hits = storage
            .search_vectors(Some("u1"), &[1.0, 0.1, 0.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "close");
        assert!(hits[0].similarity > hits[1].similarity);

        let limited = storage
            .search_vectors(Some("u1"), &[1.0, 0.1, 0.0, 0.0], 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let storage = storage().await;
        let id = storage
            .index_vector("u1", "before", &[1.0, 0.0, 0.0, 0.0], json!({"v": 1}).into())
            .await
            .unwrap();

        storage
            .update_vector(&id, Some("after"), None, None)
            .await
            .unwrap();
        let memory = storage.get_vector(&id).await.unwrap().unwrap();
        assert_eq!(memory.content, "after");
        assert_eq!(memory.metadata, Some(json!({"v": 1})));

        assert!(storage.delete_vector(&id).await.unwrap());
        assert!(storage.get_vector(&id).await.unwrap().is_none());
        assert!(!storage.delete_vector(&id).await.unwrap());
    }
}
