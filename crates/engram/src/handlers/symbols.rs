//! Handlers for the code-symbol search tools

use crate::handlers::common::{search_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchSymbolsParams {
    pub project_id: String,
    #[schemars(description = "Natural language query over symbol embeddings")]
    pub query: String,
    #[schemars(description = "Restrict to these symbol types, e.g. [\"function\", \"struct\"]")]
    pub symbol_types: Option<Vec<String>>,
    #[schemars(description = "Maximum results (default 10)")]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct FindByNameParams {
    pub project_id: String,
    #[schemars(description = "Exact name or prefix")]
    pub name: String,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct FindByFileParams {
    pub project_id: String,
    #[schemars(description = "Project-relative file path")]
    pub file_path: String,
}

pub async fn search_code_symbols(
    state: &AppState,
    params: SearchSymbolsParams,
) -> Result<CallToolResult, McpError> {
    let outcome = state
        .search
        .search_symbols(
            &params.project_id,
            &params.query,
            params.symbol_types.as_deref(),
            params.limit.unwrap_or(10),
        )
        .await
        .map_err(search_error)?;
    yaml_result(&outcome)
}

pub async fn find_symbols_by_name(
    state: &AppState,
    params: FindByNameParams,
) -> Result<CallToolResult, McpError> {
    let outcome = state
        .search
        .find_symbols_by_name(&params.project_id, &params.name, params.limit.unwrap_or(25))
        .await
        .map_err(search_error)?;
    yaml_result(&outcome)
}

pub async fn find_symbols_by_file(
    state: &AppState,
    params: FindByFileParams,
) -> Result<CallToolResult, McpError> {
    let outcome = state
        .search
        .find_symbols_by_file(&params.project_id, &params.file_path)
        .await
        .map_err(search_error)?;
    yaml_result(&outcome)
}
