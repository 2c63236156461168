//! Storage engine connection handling
//!
//! One [`Storage`] is created at startup and shared process-wide; the
//! underlying driver is safe for concurrent use. Embedded mode opens a local
//! RocksDB-backed database in-process, remote mode authenticates against an
//! external server. Both run the same SurrealQL through the same interface.

use crate::error::{StorageError, StorageResult};
use engram_config::{StorageConfig, StorageMode};
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;

/// Handle to the multi-model database
#[derive(Clone)]
pub struct Storage {
    db: Surreal<Any>,
    dimension: usize,
}

impl Storage {
    /// Open the database selected by configuration and switch to the
    /// configured namespace/database pair
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the endpoint cannot be
    /// opened, authentication fails, or the namespace cannot be selected.
    pub async fn connect(config: &StorageConfig, dimension: usize) -> StorageResult<Self> {
        let db = match config.mode() {
            StorageMode::Embedded { path } => {
                let endpoint = format!("rocksdb://{}", path.display());
                tracing::info!(endpoint = %endpoint, "opening embedded database");
                any::connect(endpoint)
                    .await
                    .map_err(|e| StorageError::Connection(e.to_string()))?
            }
            StorageMode::Remote {
                url,
                username,
                password,
            } => {
                tracing::info!(endpoint = %url, "connecting to remote database");
                let db = any::connect(url.as_str())
                    .await
                    .map_err(|e| StorageError::Connection(e.to_string()))?;
                db.signin(Root {
                    username: &username,
                    password: &password,
                })
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
                db
            }
        };

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { db, dimension })
    }

    /// In-memory database for tests and ephemeral runs
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the in-memory engine is not
    /// compiled in.
    pub async fn connect_memory(dimension: usize) -> StorageResult<Self> {
        let db = any::connect("mem://")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        db.use_ns("engram")
            .use_db("memories")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { db, dimension })
    }

    /// Release the connection (embedded file handles included)
    pub async fn close(self) {
        // Dropping the last handle releases the embedded store; invalidate
        // first so a remote session is not left authenticated server-side.
        let _ = self.db.invalidate().await;
        tracing::info!("storage connection closed");
    }

    /// Output dimension D every stored vector is normalised to
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) const fn db(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Pad or truncate to exactly D and widen to the f64 wire format
    pub(crate) fn normalize_embedding(&self, input: &[f32]) -> Vec<f64> {
        let mut vector: Vec<f64> = input
            .iter()
            .take(self.dimension)
            .map(|v| f64::from(*v))
            .collect();
        vector.resize(self.dimension, 0.0);
        vector
    }

    /// Raw parametrised query for advanced callers
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the statement fails.
    pub async fn raw_query(
        &self,
        sql: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> StorageResult<Vec<serde_json::Value>> {
        let mut query = self.db.query(sql);
        for (name, value) in params {
            query = query.bind((name, value));
        }
        let mut response = query.await?.check()?;
        let rows: Vec<serde_json::Value> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_normalisation_pads_and_truncates() {
        let storage = Storage::connect_memory(4).await.unwrap();

        let padded = storage.normalize_embedding(&[1.0, 2.0]);
        assert_eq!(padded, vec![1.0, 2.0, 0.0, 0.0]);

        let truncated = storage.normalize_embedding(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(truncated, vec![1.0, 2.0, 3.0, 4.0]);

        let exact = storage.normalize_embedding(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(exact.len(), 4);
    }

    #[tokio::test]
    async fn raw_query_returns_rows() {
        let storage = Storage::connect_memory(4).await.unwrap();
        let rows = storage
            .raw_query(
                "RETURN [{ answer: $n }]",
                vec![("n".to_string(), serde_json::json!(42))],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["answer"], serde_json::json!(42));
    }
}
