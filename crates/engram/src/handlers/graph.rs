//! Handlers for the graph memory tools

use crate::handlers::common::{storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateEntityParams {
    #[schemars(description = "Entity type, e.g. person, service, concept")]
    pub entity_type: String,
    #[schemars(description = "Entity name; usable as an alternate lookup key")]
    pub name: String,
    pub properties: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateRelationshipParams {
    #[schemars(description = "Source entity: record id or name")]
    pub from_entity: String,
    #[schemars(description = "Target entity: record id or name")]
    pub to_entity: String,
    pub relationship_type: String,
    pub properties: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct TraverseGraphParams {
    #[schemars(description = "Start entity: record id or name")]
    pub start: String,
    #[schemars(description = "Only follow edges of this type")]
    pub relationship_type: Option<String>,
    #[schemars(description = "Traversal depth (default 2)")]
    pub max_depth: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct EntityRefParams {
    #[schemars(description = "Entity record id or name")]
    pub entity: String,
}

pub async fn create_entity(
    state: &AppState,
    params: CreateEntityParams,
) -> Result<CallToolResult, McpError> {
    let id = state
        .storage
        .create_entity(&params.entity_type, &params.name, params.properties)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "id": id, "name": params.name }))
}

pub async fn create_relationship(
    state: &AppState,
    params: CreateRelationshipParams,
) -> Result<CallToolResult, McpError> {
    let id = state
        .storage
        .create_relationship(
            &params.from_entity,
            &params.to_entity,
            &params.relationship_type,
            params.properties,
        )
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "id": id }))
}

pub async fn traverse_graph(
    state: &AppState,
    params: TraverseGraphParams,
) -> Result<CallToolResult, McpError> {
    let steps = state
        .storage
        .traverse(
            &params.start,
            params.relationship_type.as_deref(),
            params.max_depth.unwrap_or(2),
        )
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "count": steps.len(), "steps": steps }))
}

pub async fn get_entity(
    state: &AppState,
    params: EntityRefParams,
) -> Result<CallToolResult, McpError> {
    let entity = state
        .storage
        .get_entity(&params.entity)
        .await
        .map_err(storage_error)?;
    match entity {
        Some(entity) => yaml_result(&entity),
        None => {
            let alternatives = state
                .storage
                .list_entity_names()
                .await
                .map_err(storage_error)?;
            yaml_result(&serde_json::json!({
                "entity": Value::Null,
                "alternatives": alternatives,
            }))
        }
    }
}

pub async fn delete_entity(
    state: &AppState,
    params: EntityRefParams,
) -> Result<CallToolResult, McpError> {
    let deleted = state
        .storage
        .delete_entity(&params.entity)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "deleted": deleted }))
}
