//! Handlers for the knowledge-base document tools
//!
//! Saving handles the chunk fan-out: documents larger than the configured
//! window are split into overlapping chunks sharing a `source_file`, each
//! embedded and stored under `<source>#chunk<i>`.

use crate::handlers::common::{search_error, storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use engram_parsing::Chunker;
use engram_storage::DocumentPayload;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SaveDocumentParams {
    #[schemars(description = "Unique document path, e.g. guides/setup.md")]
    pub file_path: String,
    pub content: String,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DocumentPathParams {
    pub file_path: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchDocumentsParams {
    pub query: String,
    #[schemars(description = "Maximum results (default 10)")]
    pub limit: Option<usize>,
}

pub async fn save_document(
    state: &AppState,
    params: SaveDocumentParams,
) -> Result<CallToolResult, McpError> {
    // Replace whatever was stored under this path, chunks included
    state
        .storage
        .delete_document(&params.file_path)
        .await
        .map_err(storage_error)?;

    let chunk_size = state.config.indexing.document_chunk_size;
    let overlap = state.config.indexing.document_chunk_overlap;

    let chunks_written = if params.content.len() <= chunk_size {
        let embedding = embed_or_fail(state, &params.content).await?;
        state
            .storage
            .save_document(DocumentPayload {
                file_path: params.file_path.clone(),
                content: params.content,
                embedding,
                metadata: params.metadata,
                chunk_index: 0,
                chunk_count: 1,
                source_file: None,
            })
            .await
            .map_err(storage_error)?;
        1
    } else {
        let windows = Chunker::new(chunk_size, overlap).split(&params.content);
        let texts: Vec<String> = windows.iter().map(|w| w.content.clone()).collect();
        let embeddings = state
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let count = windows.len();
        for (window, embedding) in windows.into_iter().zip(embeddings) {
            let embedding = embedding.ok_or_else(|| {
                McpError::internal_error("embedding provider returned no vector", None)
            })?;
            state
                .storage
                .save_document(DocumentPayload {
                    file_path: format!("{}#chunk{}", params.file_path, window.chunk_index),
                    content: window.content,
                    embedding,
                    metadata: params.metadata.clone(),
                    chunk_index: window.chunk_index as i64,
                    chunk_count: window.chunk_count as i64,
                    source_file: Some(params.file_path.clone()),
                })
                .await
                .map_err(storage_error)?;
        }
        count
    };

    yaml_result(&serde_json::json!({
        "status": "saved",
        "file_path": params.file_path,
        "chunks": chunks_written,
    }))
}

pub async fn get_document(
    state: &AppState,
    params: DocumentPathParams,
) -> Result<CallToolResult, McpError> {
    let document = state
        .storage
        .get_document(&params.file_path)
        .await
        .map_err(storage_error)?;
    match document {
        Some(document) => yaml_result(&document),
        None => {
            let alternatives = state
                .storage
                .list_document_paths()
                .await
                .map_err(storage_error)?;
            yaml_result(&serde_json::json!({
                "document": Value::Null,
                "alternatives": alternatives,
            }))
        }
    }
}

pub async fn search_documents(
    state: &AppState,
    params: SearchDocumentsParams,
) -> Result<CallToolResult, McpError> {
    let hits = state
        .search
        .search_documents(&params.query, params.limit.unwrap_or(10))
        .await
        .map_err(search_error)?;
    yaml_result(&serde_json::json!({ "count": hits.len(), "documents": hits }))
}

pub async fn delete_document(
    state: &AppState,
    params: DocumentPathParams,
) -> Result<CallToolResult, McpError> {
    let deleted = state
        .storage
        .delete_document(&params.file_path)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "deleted": deleted }))
}

async fn embed_or_fail(state: &AppState, text: &str) -> Result<Vec<f32>, McpError> {
    engram_embeddings::embed_one(state.embedder.as_ref(), text)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?
        .ok_or_else(|| McpError::internal_error("embedding provider returned no vector", None))
}
