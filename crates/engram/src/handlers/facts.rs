//! Handlers for the key-value fact tools

use crate::handlers::common::{storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SaveFactParams {
    #[schemars(description = "User or project scope of the fact")]
    pub user_id: String,
    #[schemars(description = "Fact key, unique per scope")]
    pub key: String,
    #[schemars(description = "Fact value: string, number, bool, object or array")]
    pub value: Value,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct FactKeyParams {
    pub user_id: String,
    pub key: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListFactsParams {
    pub user_id: String,
}

#[derive(Serialize)]
struct FactWritten<'a> {
    status: &'a str,
    user_id: &'a str,
    key: &'a str,
}

#[derive(Serialize)]
struct FactValue {
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternatives: Option<Vec<String>>,
}

#[derive(Serialize)]
struct FactList {
    facts: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternatives: Option<Vec<String>>,
}

pub async fn save_fact(
    state: &AppState,
    params: SaveFactParams,
) -> Result<CallToolResult, McpError> {
    state
        .storage
        .save_fact(&params.user_id, &params.key, params.value)
        .await
        .map_err(storage_error)?;
    yaml_result(&FactWritten {
        status: "saved",
        user_id: &params.user_id,
        key: &params.key,
    })
}

pub async fn get_fact(
    state: &AppState,
    params: FactKeyParams,
) -> Result<CallToolResult, McpError> {
    let value = state
        .storage
        .get_fact(&params.user_id, &params.key)
        .await
        .map_err(storage_error)?;
    let alternatives = if value.is_none() {
        unknown_scope_alternatives(state, &params.user_id).await?
    } else {
        None
    };
    yaml_result(&FactValue {
        value,
        alternatives,
    })
}

pub async fn update_fact(
    state: &AppState,
    params: SaveFactParams,
) -> Result<CallToolResult, McpError> {
    state
        .storage
        .update_fact(&params.user_id, &params.key, params.value)
        .await
        .map_err(storage_error)?;
    yaml_result(&FactWritten {
        status: "updated",
        user_id: &params.user_id,
        key: &params.key,
    })
}

pub async fn delete_fact(
    state: &AppState,
    params: FactKeyParams,
) -> Result<CallToolResult, McpError> {
    let deleted = state
        .storage
        .delete_fact(&params.user_id, &params.key)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "deleted": deleted }))
}

pub async fn list_facts(
    state: &AppState,
    params: ListFactsParams,
) -> Result<CallToolResult, McpError> {
    let entries = state
        .storage
        .list_facts(&params.user_id)
        .await
        .map_err(storage_error)?;
    let alternatives = if entries.is_empty() {
        unknown_scope_alternatives(state, &params.user_id).await?
    } else {
        None
    };
    let facts: BTreeMap<String, Value> =
        entries.into_iter().map(|f| (f.key, f.value)).collect();
    yaml_result(&FactList {
        facts,
        alternatives,
    })
}

/// "Did you mean" support: known scope ids when this scope has no rows
async fn unknown_scope_alternatives(
    state: &AppState,
    user_id: &str,
) -> Result<Option<Vec<String>>, McpError> {
    let known = state
        .storage
        .list_fact_users()
        .await
        .map_err(storage_error)?;
    if known.iter().any(|u| u == user_id) {
        Ok(None)
    } else {
        Ok(Some(known))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_from_tool_json() {
        let params: SaveFactParams = serde_json::from_value(serde_json::json!({
            "user_id": "proj1",
            "key": "lang",
            "value": {"name": "rust", "edition": 2024}
        }))
        .unwrap();
        assert_eq!(params.key, "lang");
        assert!(params.value.is_object());
    }
}
