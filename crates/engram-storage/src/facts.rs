//! Key-value fact operations
//!
//! Facts are scoped by `(user_id, key)`; values are polymorphic (string,
//! number, bool, object, array) stored through the schema's flexible field.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::FactEntry;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct KeyRow {
    key: String,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: String,
}

impl Storage {
    /// Create or overwrite a fact
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn save_fact(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> StorageResult<()> {
        if self.fact_exists(user_id, key).await? {
            self.db()
                .query(
                    "UPDATE facts SET value = $value, updated_at = time::now() \
                     WHERE user_id = $user_id AND key = $key RETURN NONE",
                )
                .bind(("user_id", user_id.to_string()))
                .bind(("key", key.to_string()))
                .bind(("value", value))
                .await?
                .check()?;
        } else {
            self.db()
                .query(
                    "CREATE facts CONTENT { user_id: $user_id, key: $key, value: $value, \
                     created_at: time::now(), updated_at: time::now() } RETURN NONE",
                )
                .bind(("user_id", user_id.to_string()))
                .bind(("key", key.to_string()))
                .bind(("value", value))
                .await?
                .check()?;
        }
        self.refresh_fact_stats(user_id).await?;
        Ok(())
    }

    /// Read a fact's value; `None` when absent
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_fact(
        &self,
        user_id: &str,
        key: &str,
    ) -> StorageResult<Option<serde_json::Value>> {
        let mut response = self
            .db()
            .query("SELECT VALUE value FROM facts WHERE user_id = $user_id AND key = $key LIMIT 1")
            .bind(("user_id", user_id.to_string()))
            .bind(("key", key.to_string()))
            .await?
            .check()?;
        let mut values: Vec<serde_json::Value> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(values.pop())
    }

    /// Overwrite an existing fact
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Missing` when the fact does not exist.
    pub async fn update_fact(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> StorageResult<()> {
        if !self.fact_exists(user_id, key).await? {
            return Err(StorageError::Missing(format!("fact '{key}' for '{user_id}'")));
        }
        self.db()
            .query(
                "UPDATE facts SET value = $value, updated_at = time::now() \
                 WHERE user_id = $user_id AND key = $key RETURN NONE",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("key", key.to_string()))
            .bind(("value", value))
            .await?
            .check()?;
        Ok(())
    }

    /// Delete a fact; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_fact(&self, user_id: &str, key: &str) -> StorageResult<bool> {
        let existed = self.fact_exists(user_id, key).await?;
        if existed {
            self.db()
                .query("DELETE facts WHERE user_id = $user_id AND key = $key")
                .bind(("user_id", user_id.to_string()))
                .bind(("key", key.to_string()))
                .await?
                .check()?;
            self.refresh_fact_stats(user_id).await?;
        }
        Ok(existed)
    }

    /// All facts for one scope, ordered by key
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_facts(&self, user_id: &str) -> StorageResult<Vec<FactEntry>> {
        let mut response = self
            .db()
            .query("SELECT key, value FROM facts WHERE user_id = $user_id ORDER BY key")
            .bind(("user_id", user_id.to_string()))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Distinct scope ids known to the facts table, for "did you mean"
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_fact_users(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT user_id FROM facts GROUP BY user_id")
            .await?
            .check()?;
        let rows: Vec<UserRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }

    async fn fact_exists(&self, user_id: &str, key: &str) -> StorageResult<bool> {
        let mut response = self
            .db()
            .query("SELECT key FROM facts WHERE user_id = $user_id AND key = $key LIMIT 1")
            .bind(("user_id", user_id.to_string()))
            .bind(("key", key.to_string()))
            .await?
            .check()?;
        let rows: Vec<KeyRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::Storage;
    use serde_json::json;

    async fn storage() -> Storage {
        let storage = Storage::connect_memory(8).await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn fact_round_trip() {
        let storage = storage().await;

        storage.save_fact("proj1", "lang", json!("go")).await.unwrap();
        let facts = storage.list_facts("proj1").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "lang");
        assert_eq!(facts[0].value, json!("go"));

        storage
            .update_fact("proj1", "lang", json!("rust"))
            .await
            .unwrap();
        assert_eq!(
            storage.get_fact("proj1", "lang").await.unwrap(),
            Some(json!("rust"))
        );

        assert!(storage.delete_fact("proj1", "lang").await.unwrap());
        assert_eq!(storage.get_fact("proj1", "lang").await.unwrap(), None);
    }

    #[tokio::test]
    async fn structured_values_survive_bit_identically() {
        let storage = storage().await;
        let value = json!({
            "nested": { "list": [1, 2, 3], "flag": true },
            "pi": 3.5,
            "label": "x"
        });
        storage
            .save_fact("u1", "settings", value.clone())
            .await
            .unwrap();
        assert_eq!(
            storage.get_fact("u1", "settings").await.unwrap(),
            Some(value)
        );
    }

    #[tokio::test]
    async fn save_overwrites_and_scopes_are_isolated() {
        let storage = storage().await;
        storage.save_fact("a", "k", json!(1)).await.unwrap();
        storage.save_fact("a", "k", json!(2)).await.unwrap();
        storage.save_fact("b", "k", json!(3)).await.unwrap();

        assert_eq!(storage.get_fact("a", "k").await.unwrap(), Some(json!(2)));
        assert_eq!(storage.get_fact("b", "k").await.unwrap(), Some(json!(3)));
        assert_eq!(storage.list_facts("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_fact_is_an_error() {
        let storage = storage().await;
        let err = storage.update_fact("u", "nope", json!(1)).await.unwrap_err();
        assert!(matches!(err, crate::StorageError::Missing(_)));
    }

    #[tokio::test]
    async fn delete_then_list_matches_before() {
        let storage = storage().await;
        storage.save_fact("u", "a", json!(1)).await.unwrap();
        let before = storage.list_facts("u").await.unwrap().len();

        storage.save_fact("u", "tmp", json!("x")).await.unwrap();
        storage.delete_fact("u", "tmp").await.unwrap();

        assert_eq!(storage.list_facts("u").await.unwrap().len(), before);
        assert!(!storage.delete_fact("u", "tmp").await.unwrap());
    }

    #[tokio::test]
    async fn known_users_are_listed() {
        let storage = storage().await;
        storage.save_fact("alpha", "k", json!(1)).await.unwrap();
        storage.save_fact("beta", "k", json!(1)).await.unwrap();
        let mut users = storage.list_fact_users().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["alpha", "beta"]);
    }
}
