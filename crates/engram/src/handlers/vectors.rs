//! Handlers for the vector memory tools

use crate::handlers::common::{search_error, storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use engram_embeddings::embed_one;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct IndexVectorParams {
    pub user_id: String,
    #[schemars(description = "Text to remember; the embedding is generated server-side")]
    pub content: String,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchVectorsParams {
    pub user_id: String,
    pub query: String,
    #[schemars(description = "Maximum results (default 10)")]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateVectorParams {
    pub id: String,
    pub content: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeleteVectorParams {
    pub id: String,
}

pub async fn index_vector(
    state: &AppState,
    params: IndexVectorParams,
) -> Result<CallToolResult, McpError> {
    let embedding = embed_one(state.embedder.as_ref(), &params.content)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?
        .ok_or_else(|| {
            McpError::internal_error("embedding provider returned no vector", None)
        })?;
    let id = state
        .storage
        .index_vector(&params.user_id, &params.content, &embedding, params.metadata)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "id": id }))
}

pub async fn search_vectors(
    state: &AppState,
    params: SearchVectorsParams,
) -> Result<CallToolResult, McpError> {
    let outcome = state
        .search
        .search_vectors(&params.user_id, &params.query, params.limit.unwrap_or(10))
        .await
        .map_err(search_error)?;
    yaml_result(&outcome)
}

pub async fn update_vector(
    state: &AppState,
    params: UpdateVectorParams,
) -> Result<CallToolResult, McpError> {
    // New content means a new embedding; metadata-only updates keep the old one
    let embedding = match &params.content {
        Some(content) => embed_one(state.embedder.as_ref(), content)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?,
        None => None,
    };
    state
        .storage
        .update_vector(
            &params.id,
            params.content.as_deref(),
            embedding.as_deref(),
            params.metadata,
        )
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "status": "updated", "id": params.id }))
}

pub async fn delete_vector(
    state: &AppState,
    params: DeleteVectorParams,
) -> Result<CallToolResult, McpError> {
    let deleted = state
        .storage
        .delete_vector(&params.id)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "deleted": deleted }))
}
