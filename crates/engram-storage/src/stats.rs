//! Statistics cache
//!
//! Every counter-affecting write re-derives the count with a fresh `count()`
//! aggregation and upserts the cached row. O(N) per write, but the cache
//! stays eventually consistent even when a writer is interrupted. The
//! reserved scope `"global"` carries graph and document counters.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::UserStats;
use serde::Deserialize;

/// Scope id that carries entity/relationship/document counts
pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: String,
}

impl Storage {
    /// Read the cached counters for a scope
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_user_stats(&self, user_id: &str) -> StorageResult<Option<UserStats>> {
        let mut response = self
            .db()
            .query("SELECT * FROM user_stats WHERE user_id = $user_id LIMIT 1")
            .bind(("user_id", user_id.to_string()))
            .await?
            .check()?;
        let mut rows: Vec<UserStats> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// Re-derive every counter for a scope plus the global scope
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when a count or upsert fails.
    pub async fn refresh_user_stats(&self, user_id: &str) -> StorageResult<()> {
        self.refresh_fact_stats(user_id).await?;
        self.refresh_vector_stats(user_id).await?;
        self.refresh_graph_stats().await?;
        self.refresh_document_stats().await?;
        Ok(())
    }

    pub(crate) async fn refresh_fact_stats(&self, user_id: &str) -> StorageResult<()> {
        let count = self
            .count_scoped("SELECT count() AS count FROM facts WHERE user_id = $user_id GROUP ALL", user_id)
            .await?;
        self.write_stat(user_id, "key_value_count", count).await
    }

    pub(crate) async fn refresh_vector_stats(&self, user_id: &str) -> StorageResult<()> {
        let count = self
            .count_scoped(
                "SELECT count() AS count FROM vector_memories WHERE user_id = $user_id GROUP ALL",
                user_id,
            )
            .await?;
        self.write_stat(user_id, "vector_count", count).await
    }

    pub(crate) async fn refresh_graph_stats(&self) -> StorageResult<()> {
        let entities = self
            .count_all("SELECT count() AS count FROM entities GROUP ALL")
            .await?;
        let relationships = self
            .count_all("SELECT count() AS count FROM relationships GROUP ALL")
            .await?;
        self.write_stat(GLOBAL_SCOPE, "entity_count", entities)
            .await?;
        self.write_stat(GLOBAL_SCOPE, "relationship_count", relationships)
            .await
    }

    pub(crate) async fn refresh_document_stats(&self) -> StorageResult<()> {
        let documents = self
            .count_all("SELECT count() AS count FROM kb_documents GROUP ALL")
            .await?;
        self.write_stat(GLOBAL_SCOPE, "document_count", documents)
            .await
    }

    async fn count_scoped(&self, sql: &str, user_id: &str) -> StorageResult<i64> {
        let mut response = self
            .db()
            .query(sql)
            .bind(("user_id", user_id.to_string()))
            .await?
            .check()?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    async fn count_all(&self, sql: &str) -> StorageResult<i64> {
        let mut response = self.db().query(sql).await?.check()?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Upsert one counter column for a scope
    ///
    /// `field` comes from a fixed set of column names, never caller input.
    async fn write_stat(&self, user_id: &str, field: &str, count: i64) -> StorageResult<()> {
        let mut response = self
            .db()
            .query("SELECT user_id FROM user_stats WHERE user_id = $user_id LIMIT 1")
            .bind(("user_id", user_id.to_string()))
            .await?
            .check()?;
        let rows: Vec<UserRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        if rows.is_empty() {
            let sql = format!(
                "CREATE user_stats CONTENT {{ user_id: $user_id, key_value_count: 0, \
                 vector_count: 0, entity_count: 0, relationship_count: 0, document_count: 0, \
                 updated_at: time::now() }} RETURN NONE; \
                 UPDATE user_stats SET {field} = $count, updated_at = time::now() \
                 WHERE user_id = $user_id RETURN NONE"
            );
            self.db()
                .query(sql)
                .bind(("user_id", user_id.to_string()))
                .bind(("count", count))
                .await?
                .check()?;
        } else {
            let sql = format!(
                "UPDATE user_stats SET {field} = $count, updated_at = time::now() \
                 WHERE user_id = $user_id RETURN NONE"
            );
            self.db()
                .query(sql)
                .bind(("user_id", user_id.to_string()))
                .bind(("count", count))
                .await?
                .check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::GLOBAL_SCOPE;
    use crate::Storage;
    use serde_json::json;

    #[tokio::test]
    async fn fact_writes_keep_the_counter_current() {
        let storage = Storage::connect_memory(8).await.unwrap();
        storage.initialize_schema().await.unwrap();

        storage.save_fact("u1", "a", json!(1)).await.unwrap();
        storage.save_fact("u1", "b", json!(2)).await.unwrap();
        let stats = storage.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.key_value_count, 2);

        storage.delete_fact("u1", "a").await.unwrap();
        let stats = storage.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.key_value_count, 1);
    }

    #[tokio::test]
    async fn graph_counts_live_under_the_global_scope() {
        let storage = Storage::connect_memory(8).await.unwrap();
        storage.initialize_schema().await.unwrap();

        storage
            .create_entity("person", "ada", None)
            .await
            .unwrap();
        let stats = storage.get_user_stats(GLOBAL_SCOPE).await.unwrap().unwrap();
        assert_eq!(stats.entity_count, 1);
        assert_eq!(stats.relationship_count, 0);
    }
}
