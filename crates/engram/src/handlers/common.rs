//! Shared helpers for tool handlers
//!
//! Every tool returns a YAML-encoded payload; structured errors map to MCP
//! error codes by category (input errors vs everything else).

use agenterra_rmcp::Error as McpError;
use agenterra_rmcp::model::{CallToolResult, Content};
use engram_indexing::IndexingError;
use engram_search::SearchError;
use engram_storage::StorageError;
use serde::Serialize;

/// Serialize a response payload as YAML tool output
pub fn yaml_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let yaml = serde_yaml::to_string(value)
        .map_err(|e| McpError::internal_error(format!("response encoding failed: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(yaml)]))
}

pub fn storage_error(e: StorageError) -> McpError {
    match e {
        StorageError::Missing(_) | StorageError::InvalidInput(_) | StorageError::Resolution(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

pub fn search_error(e: SearchError) -> McpError {
    match e {
        SearchError::Input(_) => McpError::invalid_params(e.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

pub fn indexing_error(e: IndexingError) -> McpError {
    match e {
        IndexingError::QueueFull
        | IndexingError::JobNotFound(_)
        | IndexingError::ProjectNotFound(_)
        | IndexingError::Watcher(_) => McpError::invalid_params(e.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}
