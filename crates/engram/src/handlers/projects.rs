//! Handlers for the code-project tools: indexing jobs and the watcher

use crate::handlers::common::{indexing_error, storage_error, yaml_result};
use crate::state::AppState;
use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct IndexProjectParams {
    #[schemars(description = "Absolute path of the project root")]
    pub path: String,
    #[schemars(description = "Display name (defaults to the directory name)")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ProjectStatusParams {
    #[schemars(description = "Job id returned by index_code_project")]
    pub job_id: Option<String>,
    #[schemars(description = "Project id, when no job id is at hand")]
    pub project_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ProjectIdParams {
    pub project_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListProjectsParams {}

pub async fn index_code_project(
    state: &AppState,
    params: IndexProjectParams,
) -> Result<CallToolResult, McpError> {
    let path = PathBuf::from(&params.path);
    if !path.is_dir() {
        return Err(McpError::invalid_params(
            format!("'{}' is not a directory", params.path),
            None,
        ));
    }
    let name = params.name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    });
    let job_id = state
        .jobs
        .submit(path.clone(), name)
        .map_err(indexing_error)?;
    let project_id = engram_storage::derive_project_id(&path.canonicalize().unwrap_or(path));
    yaml_result(&serde_json::json!({ "job_id": job_id, "project_id": project_id }))
}

pub async fn get_code_project_status(
    state: &AppState,
    params: ProjectStatusParams,
) -> Result<CallToolResult, McpError> {
    if let Some(job_id) = &params.job_id {
        let view = state.jobs.status(job_id).map_err(indexing_error)?;
        return yaml_result(&view);
    }
    let Some(project_id) = &params.project_id else {
        return Err(McpError::invalid_params(
            "either job_id or project_id is required",
            None,
        ));
    };
    let project = state
        .storage
        .get_code_project(project_id)
        .await
        .map_err(storage_error)?;
    match project {
        Some(project) => {
            let progress = state.indexer.progress(project_id);
            yaml_result(&serde_json::json!({
                "project": project,
                "progress": progress,
            }))
        }
        None => {
            let alternatives = state
                .storage
                .list_project_ids()
                .await
                .map_err(storage_error)?;
            yaml_result(&serde_json::json!({
                "project": Value::Null,
                "alternatives": alternatives,
            }))
        }
    }
}

pub async fn list_code_projects(
    state: &AppState,
    _params: ListProjectsParams,
) -> Result<CallToolResult, McpError> {
    let projects = state
        .storage
        .list_code_projects()
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "count": projects.len(), "projects": projects }))
}

pub async fn delete_code_project(
    state: &AppState,
    params: ProjectIdParams,
) -> Result<CallToolResult, McpError> {
    // A watched project must stop being watched before its rows go away
    if state.watchers.active_project().await.as_deref() == Some(params.project_id.as_str()) {
        state
            .watchers
            .deactivate(&params.project_id)
            .await
            .map_err(indexing_error)?;
    }
    let deleted = state
        .storage
        .delete_code_project(&params.project_id)
        .await
        .map_err(storage_error)?;
    yaml_result(&serde_json::json!({ "deleted": deleted }))
}

pub async fn reindex_code_project(
    state: &AppState,
    params: ProjectIdParams,
) -> Result<CallToolResult, McpError> {
    let job_id = state
        .jobs
        .reindex(&params.project_id)
        .await
        .map_err(indexing_error)?;
    yaml_result(&serde_json::json!({ "job_id": job_id, "project_id": params.project_id }))
}

pub async fn activate_project(
    state: &AppState,
    params: ProjectIdParams,
) -> Result<CallToolResult, McpError> {
    let status = state
        .watchers
        .activate(&params.project_id)
        .await
        .map_err(indexing_error)?;
    yaml_result(&status)
}

pub async fn deactivate_project(
    state: &AppState,
    params: ProjectIdParams,
) -> Result<CallToolResult, McpError> {
    let status = state
        .watchers
        .deactivate(&params.project_id)
        .await
        .map_err(indexing_error)?;
    yaml_result(&status)
}

pub async fn get_project_watch_status(
    state: &AppState,
    params: ProjectIdParams,
) -> Result<CallToolResult, McpError> {
    let status = state
        .watchers
        .watch_status(&params.project_id)
        .await
        .map_err(indexing_error)?;
    yaml_result(&status)
}
