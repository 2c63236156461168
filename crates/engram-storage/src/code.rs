//! Code-index storage: projects, files, symbols and symbol chunks
//!
//! Ownership flows downward: symbols belong to their file, files to their
//! project, chunks to their symbol. Deletes cascade in that order.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::{
    CodeFile, CodeProject, CodeSymbol, IndexingStatus, NewCodeChunk, NewCodeSymbol, SymbolHit,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use surrealdb::sql::Datetime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ProjectIdRow {
    project_id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

impl Storage {
    /// Create a project row, or refresh its name/root on re-submission
    ///
    /// The watcher flag and status survive re-submission; a brand new
    /// project starts `pending` with the watcher off.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn upsert_code_project(
        &self,
        project_id: &str,
        name: &str,
        root_path: &str,
    ) -> StorageResult<()> {
        if self.get_code_project(project_id).await?.is_some() {
            self.db()
                .query(
                    "UPDATE code_projects SET name = $name, root_path = $root_path \
                     WHERE project_id = $project_id RETURN NONE",
                )
                .bind(("project_id", project_id.to_string()))
                .bind(("name", name.to_string()))
                .bind(("root_path", root_path.to_string()))
                .await?
                .check()?;
        } else {
            self.db()
                .query(
                    "CREATE code_projects CONTENT { project_id: $project_id, name: $name, \
                     root_path: $root_path, language_stats: NONE, \
                     indexing_status: 'pending', watcher_enabled: false } RETURN NONE",
                )
                .bind(("project_id", project_id.to_string()))
                .bind(("name", name.to_string()))
                .bind(("root_path", root_path.to_string()))
                .await?
                .check()?;
        }
        Ok(())
    }

    /// Move a project through its indexing lifecycle
    ///
    /// `last_indexed_at` is only written when supplied; the schema-strict
    /// optional datetime rejects explicit nulls, so the field is omitted
    /// rather than nulled.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn set_project_status(
        &self,
        project_id: &str,
        status: IndexingStatus,
        last_indexed_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        if let Some(indexed_at) = last_indexed_at {
            self.db()
                .query(
                    "UPDATE code_projects SET indexing_status = $status, \
                     last_indexed_at = $last_indexed_at \
                     WHERE project_id = $project_id RETURN NONE",
                )
                .bind(("project_id", project_id.to_string()))
                .bind(("status", status.as_str()))
                .bind(("last_indexed_at", Datetime::from(indexed_at)))
                .await?
                .check()?;
        } else {
            self.db()
                .query(
                    "UPDATE code_projects SET indexing_status = $status \
                     WHERE project_id = $project_id RETURN NONE",
                )
                .bind(("project_id", project_id.to_string()))
                .bind(("status", status.as_str()))
                .await?
                .check()?;
        }
        Ok(())
    }

    /// Persist per-language file counts gathered by the scanner
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn set_project_language_stats(
        &self,
        project_id: &str,
        language_stats: serde_json::Value,
    ) -> StorageResult<()> {
        self.db()
            .query(
                "UPDATE code_projects SET language_stats = $language_stats \
                 WHERE project_id = $project_id RETURN NONE",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("language_stats", language_stats))
            .await?
            .check()?;
        Ok(())
    }

    /// Flip the persistent watcher flag
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn set_project_watcher(
        &self,
        project_id: &str,
        enabled: bool,
    ) -> StorageResult<()> {
        self.db()
            .query(
                "UPDATE code_projects SET watcher_enabled = $enabled \
                 WHERE project_id = $project_id RETURN NONE",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("enabled", enabled))
            .await?
            .check()?;
        Ok(())
    }

    /// Read one project
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_code_project(
        &self,
        project_id: &str,
    ) -> StorageResult<Option<CodeProject>> {
        let mut response = self
            .db()
            .query("SELECT * FROM code_projects WHERE project_id = $project_id LIMIT 1")
            .bind(("project_id", project_id.to_string()))
            .await?
            .check()?;
        let mut rows: Vec<CodeProject> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// All projects, most recently indexed first
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_code_projects(&self) -> StorageResult<Vec<CodeProject>> {
        let mut response = self
            .db()
            .query("SELECT * FROM code_projects ORDER BY project_id")
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Known project ids, for "did you mean" on empty reads
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_project_ids(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT project_id FROM code_projects ORDER BY project_id")
            .await?
            .check()?;
        let rows: Vec<ProjectIdRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.project_id).collect())
    }

    /// Delete a project and everything it owns; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_code_project(&self, project_id: &str) -> StorageResult<bool> {
        let existed = self.get_code_project(project_id).await?.is_some();
        self.db()
            .query(
                "DELETE code_chunks WHERE project_id = $project_id; \
                 DELETE code_symbols WHERE project_id = $project_id; \
                 DELETE code_files WHERE project_id = $project_id; \
                 DELETE code_projects WHERE project_id = $project_id",
            )
            .bind(("project_id", project_id.to_string()))
            .await?
            .check()?;
        Ok(existed)
    }

    /// Create or replace one file row
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn upsert_code_file(
        &self,
        project_id: &str,
        file_path: &str,
        language: &str,
        file_hash: &str,
        symbols_count: i64,
    ) -> StorageResult<()> {
        self.db()
            .query(
                "DELETE code_files WHERE project_id = $project_id AND file_path = $file_path",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        self.db()
            .query(
                "CREATE code_files CONTENT { project_id: $project_id, file_path: $file_path, \
                 language: $language, file_hash: $file_hash, symbols_count: $symbols_count, \
                 indexed_at: time::now() } RETURN NONE",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .bind(("language", language.to_string()))
            .bind(("file_hash", file_hash.to_string()))
            .bind(("symbols_count", symbols_count))
            .await?
            .check()?;
        Ok(())
    }

    /// Read one file row
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_code_file(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> StorageResult<Option<CodeFile>> {
        let mut response = self
            .db()
            .query(
                "SELECT * FROM code_files WHERE project_id = $project_id \
                 AND file_path = $file_path LIMIT 1",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        let mut rows: Vec<CodeFile> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// Every file row of one project
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_code_files(&self, project_id: &str) -> StorageResult<Vec<CodeFile>> {
        let mut response = self
            .db()
            .query(
                "SELECT * FROM code_files WHERE project_id = $project_id ORDER BY file_path",
            )
            .bind(("project_id", project_id.to_string()))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Delete one file row along with its symbols and chunks
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_code_file(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> StorageResult<()> {
        self.delete_file_symbols(project_id, file_path).await?;
        self.db()
            .query(
                "DELETE code_files WHERE project_id = $project_id AND file_path = $file_path",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    /// Persist a batch of symbols; returns their generated ids in order
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when a write fails; earlier symbols of
    /// the batch stay written.
    pub async fn save_code_symbols(
        &self,
        symbols: &[NewCodeSymbol],
    ) -> StorageResult<Vec<String>> {
        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let id = Uuid::new_v4().simple().to_string();
            let embedding = symbol
                .embedding
                .as_deref()
                .map(|e| self.normalize_embedding(e));
            self.db()
                .query(
                    "CREATE type::thing('code_symbols', $id) CONTENT { \
                     project_id: $project_id, file_path: $file_path, language: $language, \
                     symbol_type: $symbol_type, name: $name, name_path: $name_path, \
                     start_line: $start_line, end_line: $end_line, \
                     start_byte: $start_byte, end_byte: $end_byte, \
                     source_code: $source_code, signature: $signature, \
                     doc_string: $doc_string, embedding: $embedding, \
                     parent_id: NONE, metadata: NONE } RETURN NONE",
                )
                .bind(("id", id.clone()))
                .bind(("project_id", symbol.project_id.clone()))
                .bind(("file_path", symbol.file_path.clone()))
                .bind(("language", symbol.language.clone()))
                .bind(("symbol_type", symbol.symbol_type.clone()))
                .bind(("name", symbol.name.clone()))
                .bind(("name_path", symbol.name_path.clone()))
                .bind(("start_line", symbol.start_line))
                .bind(("end_line", symbol.end_line))
                .bind(("start_byte", symbol.start_byte))
                .bind(("end_byte", symbol.end_byte))
                .bind(("source_code", symbol.source_code.clone()))
                .bind(("signature", symbol.signature.clone()))
                .bind(("doc_string", symbol.doc_string.clone()))
                .bind(("embedding", embedding))
                .await?
                .check()?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Remove every symbol (and chunk) belonging to one file; returns how
    /// many symbols were removed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_file_symbols(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> StorageResult<i64> {
        let count = self.count_file_symbols(project_id, file_path).await?;
        self.db()
            .query(
                "DELETE code_chunks WHERE project_id = $project_id AND file_path = $file_path; \
                 DELETE code_symbols WHERE project_id = $project_id AND file_path = $file_path",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        Ok(count)
    }

    /// Symbols in one file
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn find_symbols_by_file(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> StorageResult<Vec<CodeSymbol>> {
        let mut response = self
            .db()
            .query(
                "SELECT * FROM code_symbols WHERE project_id = $project_id \
                 AND file_path = $file_path ORDER BY start_byte",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Exact-or-prefix lexical lookup by symbol name
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn find_symbols_by_name(
        &self,
        project_id: &str,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<CodeSymbol>> {
        let mut response = self
            .db()
            .query(
                "SELECT * FROM code_symbols WHERE project_id = $project_id \
                 AND (name = $name OR string::starts_with(name, $name) \
                 OR string::starts_with(name_path, $name)) \
                 ORDER BY name_path LIMIT $limit",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("name", name.to_string()))
            .bind(("limit", limit as i64))
            .await?
            .check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Cosine top-k over symbol embeddings, optionally filtered by kind
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the search fails.
    pub async fn search_code_symbols(
        &self,
        project_id: &str,
        embedding: &[f32],
        symbol_types: Option<&[String]>,
        limit: usize,
    ) -> StorageResult<Vec<SymbolHit>> {
        let vector = self.normalize_embedding(embedding);
        let type_filter = if symbol_types.is_some_and(|t| !t.is_empty()) {
            " AND symbol_type INSIDE $symbol_types"
        } else {
            ""
        };
        let sql = format!(
            "SELECT file_path, symbol_type, name, name_path, start_line, end_line, \
             signature, doc_string, \
             vector::similarity::cosine(embedding, $query_embedding) AS similarity \
             FROM code_symbols WHERE project_id = $project_id \
             AND embedding != NONE{type_filter} \
             ORDER BY similarity DESC LIMIT $limit"
        );
        let mut query = self
            .db()
            .query(sql)
            .bind(("project_id", project_id.to_string()))
            .bind(("query_embedding", vector))
            .bind(("limit", limit as i64));
        if let Some(types) = symbol_types {
            if !types.is_empty() {
                query = query.bind(("symbol_types", types.to_vec()));
            }
        }
        let mut response = query.await?.check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    /// Persist chunk windows for one over-sized symbol
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when a write fails.
    pub async fn save_code_chunks(
        &self,
        symbol_id: &str,
        chunks: &[NewCodeChunk],
    ) -> StorageResult<()> {
        for chunk in chunks {
            let embedding = chunk
                .embedding
                .as_deref()
                .map(|e| self.normalize_embedding(e));
            self.db()
                .query(
                    "CREATE code_chunks CONTENT { \
                     symbol_id: type::thing('code_symbols', $symbol_id), \
                     project_id: $project_id, file_path: $file_path, \
                     chunk_index: $chunk_index, chunk_count: $chunk_count, \
                     content: $content, start_offset: $start_offset, \
                     end_offset: $end_offset, embedding: $embedding, \
                     symbol_name: $symbol_name, symbol_type: $symbol_type, \
                     language: $language } RETURN NONE",
                )
                .bind(("symbol_id", symbol_id.to_string()))
                .bind(("project_id", chunk.project_id.clone()))
                .bind(("file_path", chunk.file_path.clone()))
                .bind(("chunk_index", chunk.chunk_index))
                .bind(("chunk_count", chunk.chunk_count))
                .bind(("content", chunk.content.clone()))
                .bind(("start_offset", chunk.start_offset))
                .bind(("end_offset", chunk.end_offset))
                .bind(("embedding", embedding))
                .bind(("symbol_name", chunk.symbol_name.clone()))
                .bind(("symbol_type", chunk.symbol_type.clone()))
                .bind(("language", chunk.language.clone()))
                .await?
                .check()?;
        }
        Ok(())
    }

    /// Count symbols in one file
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the count fails.
    pub async fn count_file_symbols(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> StorageResult<i64> {
        let mut response = self
            .db()
            .query(
                "SELECT count() AS count FROM code_symbols \
                 WHERE project_id = $project_id AND file_path = $file_path GROUP ALL",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("file_path", file_path.to_string()))
            .await?
            .check()?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Count symbols across one project
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the count fails.
    pub async fn count_project_symbols(&self, project_id: &str) -> StorageResult<i64> {
        let mut response = self
            .db()
            .query(
                "SELECT count() AS count FROM code_symbols \
                 WHERE project_id = $project_id GROUP ALL",
            )
            .bind(("project_id", project_id.to_string()))
            .await?
            .check()?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.first().map_or(0, |r| r.count))
    }
}
