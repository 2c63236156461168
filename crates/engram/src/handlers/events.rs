//! Handlers for the temporal event tools

use crate::handlers::common::{search_error, storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use engram_common::CorrelationId;
use engram_embeddings::embed_one;
use engram_search::EventSearchRequest;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SaveEventParams {
    pub user_id: String,
    #[schemars(description = "Conventional category:identifier label, e.g. log:build")]
    pub subject: String,
    pub content: String,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchEventsParams {
    pub user_id: String,
    #[schemars(description = "Free-text query; omit for pure recency ordering")]
    pub query: Option<String>,
    #[schemars(description = "Exact subject filter")]
    pub subject: Option<String>,
    #[schemars(description = "Absolute lower bound, RFC3339")]
    pub from_date: Option<String>,
    #[schemars(description = "Absolute upper bound, RFC3339")]
    pub to_date: Option<String>,
    pub last_hours: Option<i64>,
    pub last_days: Option<i64>,
    pub last_months: Option<u32>,
    #[schemars(description = "Maximum results (default 50)")]
    pub limit: Option<usize>,
}

pub async fn save_event(
    state: &AppState,
    params: SaveEventParams,
) -> Result<CallToolResult, McpError> {
    // Events stay writable when the embedder is down; a zero vector keeps
    // the row reachable via BM25 and recency
    let embedding = match embed_one(state.embedder.as_ref(), &params.content).await {
        Ok(Some(vector)) => vector,
        Ok(None) | Err(_) => {
            tracing::warn!(subject = %params.subject, "event saved without a usable embedding");
            vec![0.0; state.embedder.dimension()]
        }
    };
    let id = state
        .storage
        .save_event(
            &params.user_id,
            &params.subject,
            &params.content,
            &embedding,
            params.metadata,
        )
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "id": id, "subject": params.subject }))
}

pub async fn search_events(
    state: &AppState,
    params: SearchEventsParams,
) -> Result<CallToolResult, McpError> {
    let correlation_id = CorrelationId::new();
    let request = EventSearchRequest {
        user_id: params.user_id,
        query: params.query,
        subject: params.subject,
        from_date: params.from_date,
        to_date: params.to_date,
        last_hours: params.last_hours,
        last_days: params.last_days,
        last_months: params.last_months,
        limit: params.limit,
    };
    let outcome = state
        .search
        .search_events(&request, &correlation_id)
        .await
        .map_err(search_error)?;
    yaml_result(&serde_json::json!({
        "count": outcome.results.len(),
        "events": outcome.results,
        "alternatives": outcome.alternatives,
    }))
}
