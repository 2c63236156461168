//! Knowledge-base document operations
//!
//! Large Markdown files are chunked by the caller; chunks share a
//! `source_file` and use `<source>#chunk<i>` paths. `file_path` is unique,
//! so saving is delete-then-create, never an in-place round trip.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::{DocumentHit, KbDocument};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PathRow {
    file_path: String,
}

/// Payload for saving one document or document chunk
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub file_path: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Option<serde_json::Value>,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub source_file: Option<String>,
}

impl Storage {
    /// Create or replace one knowledge-base document row
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn save_document(&self, payload: DocumentPayload) -> StorageResult<()> {
        let vector = self.normalize_embedding(&payload.embedding);
        self.db()
            .query("DELETE kb_documents WHERE file_path = $file_path")
            .bind(("file_path", payload.file_path.clone()))
            .await?
            .check()?;
        self.db()
            .query(
                "CREATE kb_documents CONTENT { file_path: $file_path, content: $content, \
                 embedding: $embedding, metadata: $metadata, chunk_index: $chunk_index, \
                 chunk_count: $chunk_count, source_file: $source_file, \
                 created_at: time::now(), updated_at: time::now() } RETURN NONE",
            )
            .bind(("file_path", payload.file_path))
            .bind(("content", payload.content))
            .bind(("embedding", vector))
            .bind(("metadata", payload.metadata))
            .bind(("chunk_index", payload.chunk_index))
            .bind(("chunk_count", payload.chunk_count))
            .bind(("source_file", payload.source_file))
            .await?
            .check()?;
        self.refresh_document_stats().await?;
        Ok(())
    }

    /// Read a document by its unique path
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_document(&self, file_path: &str) -> StorageResult<Option<KbDocument>> {
        let mut response = self
            .db()
            .query("SELECT * FROM kb_documents WHERE file_path = $file_path LIMIT 1")
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        let mut rows: Vec<KbDocument> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// Delete a document and any chunks derived from it; returns whether
    /// anything was removed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_document(&self, file_path: &str) -> StorageResult<bool> {
        let existed = self.get_document(file_path).await?.is_some();
        self.db()
            .query(
                "DELETE kb_documents WHERE file_path = $file_path \
                 OR source_file = $file_path",
            )
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        self.refresh_document_stats().await?;
        Ok(existed)
    }

    /// Cosine top-k over the document index
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the search fails.
    pub async fn search_documents(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<DocumentHit>> {
        let vector = self.normalize_embedding(embedding);
        let mut response = self
            .db()
            .query(
                "SELECT file_path, content, source_file, chunk_index, \
                 vector::similarity::cosine(embedding, $query_embedding) AS similarity \
                 FROM kb_documents ORDER BY similarity DESC LIMIT $limit",
            )
            .bind(("query_embedding", vector))
            .bind(("limit", limit as i64))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Known document paths, for "did you mean" on empty reads
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_document_paths(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT file_path FROM kb_documents ORDER BY file_path")
            .await?
            .check()?;
        let rows: Vec<PathRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.file_path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentPayload;
    use crate::Storage;

    async fn storage() -> Storage {
        let storage = Storage::connect_memory(4).await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    fn payload(path: &str, source: Option<&str>, index: i64, count: i64) -> DocumentPayload {
        DocumentPayload {
            file_path: path.to_string(),
            content: format!("content of {path}"),
            embedding: vec![1.0, 0.0, 0.0, 0.0],
            metadata: None,
            chunk_index: index,
            chunk_count: count,
            source_file: source.map(String::from),
        }
    }

    #[tokio::test]
    async fn save_is_idempotent_per_path() {
        let storage = storage().await;
        storage
            .save_document(payload("guide.md", None, 0, 1))
            .await
            .unwrap();
        storage
            .save_document(payload("guide.md", None, 0, 1))
            .await
            .unwrap();

        let paths = storage.list_document_paths().await.unwrap();
        assert_eq!(paths, vec!["guide.md"]);
    }

    #[tokio::test]
    async fn deleting_a_source_removes_its_chunks() {
        let storage = storage().await;
        storage
            .save_document(payload("big.md", None, 0, 1))
            .await
            .unwrap();
        storage
            .save_document(payload("big.md#chunk0", Some("big.md"), 0, 2))
            .await
            .unwrap();
        storage
            .save_document(payload("big.md#chunk1", Some("big.md"), 1, 2))
            .await
            .unwrap();

        assert!(storage.delete_document("big.md").await.unwrap());
        assert!(storage.list_document_paths().await.unwrap().is_empty());
        assert!(!storage.delete_document("big.md").await.unwrap());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let storage = storage().await;
        for i in 0..5 {
            storage
                .save_document(payload(&format!("d{i}.md"), None, 0, 1))
                .await
                .unwrap();
        }
        let hits = storage
            .search_documents(&[1.0, 0.0, 0.0, 0.0], 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }
}
