//! Domain models for storage entities
//!
//! Timestamps use the database's native datetime type so rows round-trip
//! through both the embedded and remote drivers without casts; deref to
//! `chrono::DateTime<Utc>` where callers need calendar math.

use serde::{Deserialize, Serialize, Serializer};
use surrealdb::RecordId;
use surrealdb::sql::Datetime;

/// Record ids render as `table:key` strings in tool output
fn id_as_string<S: Serializer>(id: &RecordId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

fn opt_id_as_string<S: Serializer>(
    id: &Option<RecordId>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.serialize_some(&id.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Datetimes render as RFC3339 strings in tool output
fn datetime_as_rfc3339<S: Serializer>(dt: &Datetime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.to_rfc3339())
}

fn opt_datetime_as_rfc3339<S: Serializer>(
    dt: &Option<Datetime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match dt {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

/// One key/value fact scoped to a user or project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactEntry {
    pub key: String,
    pub value: serde_json::Value,
}

/// A stored vector memory row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMemory {
    #[serde(serialize_with = "id_as_string")]
    pub id: RecordId,
    pub user_id: String,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f64>,
    pub metadata: Option<serde_json::Value>,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub created_at: Datetime,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub updated_at: Datetime,
}

/// A vector search hit with its cosine similarity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    #[serde(serialize_with = "id_as_string")]
    pub id: RecordId,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub similarity: f64,
}

/// A graph node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(serialize_with = "id_as_string")]
    pub id: RecordId,
    pub entity_type: String,
    pub name: String,
    pub properties: Option<serde_json::Value>,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub created_at: Datetime,
}

/// A typed edge between two resolved entities
#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    pub id: RecordId,
    pub from_entity: RecordId,
    pub to_entity: RecordId,
    pub relationship_type: String,
    pub properties: Option<serde_json::Value>,
    pub created_at: Datetime,
}

/// One step of a graph traversal: the edge taken and the entity reached
#[derive(Debug, Clone, Serialize)]
pub struct TraversalStep {
    pub depth: usize,
    pub relationship_type: String,
    pub entity_id: String,
    pub entity_name: String,
    pub entity_type: String,
}

/// A knowledge-base document or document chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbDocument {
    pub file_path: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub source_file: Option<String>,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub created_at: Datetime,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub updated_at: Datetime,
}

/// A knowledge-base search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHit {
    pub file_path: String,
    pub content: String,
    pub source_file: Option<String>,
    pub chunk_index: i64,
    pub similarity: f64,
}

/// A temporal event row
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: RecordId,
    pub user_id: String,
    pub subject: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Datetime,
}

/// An event search hit; `relevance` depends on the search mode
#[derive(Debug, Clone, Serialize)]
pub struct EventHit {
    pub id: String,
    pub subject: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub relevance: f64,
}

/// Lifecycle of a project index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl IndexingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for IndexingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid indexing status: {s}")),
        }
    }
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An indexed code project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeProject {
    pub project_id: String,
    pub name: String,
    pub root_path: String,
    pub language_stats: Option<serde_json::Value>,
    #[serde(serialize_with = "opt_datetime_as_rfc3339")]
    pub last_indexed_at: Option<Datetime>,
    pub indexing_status: IndexingStatus,
    pub watcher_enabled: bool,
}

/// One indexed file inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeFile {
    pub project_id: String,
    pub file_path: String,
    pub language: String,
    pub file_hash: String,
    pub symbols_count: i64,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub indexed_at: Datetime,
}

/// A code symbol to be written; the storage layer assigns the record id
#[derive(Debug, Clone, Serialize)]
pub struct NewCodeSymbol {
    pub project_id: String,
    pub file_path: String,
    pub language: String,
    pub symbol_type: String,
    pub name: String,
    pub name_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub start_byte: i64,
    pub end_byte: i64,
    pub source_code: Option<String>,
    pub signature: Option<String>,
    pub doc_string: Option<String>,
    /// Normalised to dimension D on write; `None` survives as a vector-less
    /// symbol reachable by name lookup
    pub embedding: Option<Vec<f32>>,
}

/// A stored code symbol row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSymbol {
    #[serde(serialize_with = "id_as_string")]
    pub id: RecordId,
    pub project_id: String,
    pub file_path: String,
    pub language: String,
    pub symbol_type: String,
    pub name: String,
    pub name_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub start_byte: i64,
    pub end_byte: i64,
    pub source_code: Option<String>,
    pub signature: Option<String>,
    pub doc_string: Option<String>,
    #[serde(serialize_with = "opt_id_as_string")]
    pub parent_id: Option<RecordId>,
}

/// A symbol search hit with its cosine similarity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolHit {
    pub file_path: String,
    pub symbol_type: String,
    pub name: String,
    pub name_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub signature: Option<String>,
    pub doc_string: Option<String>,
    pub similarity: f64,
}

/// A chunk of an over-sized symbol to be written
#[derive(Debug, Clone, Serialize)]
pub struct NewCodeChunk {
    pub project_id: String,
    pub file_path: String,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub content: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub symbol_name: String,
    pub symbol_type: String,
    pub language: String,
    pub embedding: Option<Vec<f32>>,
}

/// A persisted indexing job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredJob {
    pub job_id: String,
    pub project_id: String,
    pub project_path: String,
    pub status: IndexingStatus,
    pub progress: f64,
    pub files_total: i64,
    pub files_indexed: i64,
    pub started_at: Datetime,
    pub completed_at: Option<Datetime>,
    pub error: Option<String>,
}

/// Cached per-scope counters; re-derived from `count()` on every write,
/// never authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub key_value_count: i64,
    pub vector_count: i64,
    pub entity_count: i64,
    pub relationship_count: i64,
    pub document_count: i64,
    #[serde(serialize_with = "datetime_as_rfc3339")]
    pub updated_at: Datetime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn indexing_status_round_trips() {
        for status in [
            IndexingStatus::Pending,
            IndexingStatus::InProgress,
            IndexingStatus::Completed,
            IndexingStatus::Failed,
            IndexingStatus::Cancelled,
        ] {
            assert_eq!(
                IndexingStatus::from_str(status.as_str()).unwrap(),
                status
            );
        }
        assert!(IndexingStatus::from_str("bogus").is_err());
    }

    #[test]
    fn indexing_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&IndexingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
