//! Schema versioning and idempotent migrations
//!
//! A single `schema_version:current` record holds the installed version.
//! Migrations are numbered 1..=TARGET_VERSION and applied in strict
//! sequence. A statement failing with an "already exists"-class error is
//! logged and treated as success; any other failure aborts before the
//! version record is advanced.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use serde::Deserialize;

/// Version the schema reaches when every migration has been applied
pub const TARGET_VERSION: u32 = 12;

#[derive(Debug, Deserialize)]
struct VersionRow {
    version: i64,
}

impl Storage {
    /// Bring the schema up to [`TARGET_VERSION`]
    ///
    /// Re-running against a current database performs zero DDL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Migration` when a statement fails with a
    /// non-idempotent error; the version record is left at the last fully
    /// applied migration.
    pub async fn initialize_schema(&self) -> StorageResult<()> {
        let current = self.schema_version().await?;
        if current >= TARGET_VERSION {
            tracing::debug!(version = current, "schema already current");
            return Ok(());
        }

        self.ensure_version_table().await?;

        for version in (current + 1)..=TARGET_VERSION {
            self.apply_migration(version).await?;
            self.db()
                .query(
                    "UPSERT schema_version:current SET version = $version, updated_at = time::now()",
                )
                .bind(("version", i64::from(version)))
                .await?
                .check()?;
            tracing::info!(version, "migration applied");
        }
        Ok(())
    }

    /// Read the installed schema version (0 when absent)
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the version record cannot be read.
    pub async fn schema_version(&self) -> StorageResult<u32> {
        let mut response = self
            .db()
            .query("SELECT version FROM schema_version:current")
            .await?
            .check()?;
        let row: Option<VersionRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(row.map_or(0, |r| u32::try_from(r.version).unwrap_or(0)))
    }

    async fn ensure_version_table(&self) -> StorageResult<()> {
        for statement in [
            "DEFINE TABLE schema_version SCHEMAFULL",
            "DEFINE FIELD version ON schema_version TYPE int",
            "DEFINE FIELD updated_at ON schema_version TYPE datetime",
        ] {
            self.run_ddl(0, statement).await?;
        }
        Ok(())
    }

    async fn apply_migration(&self, version: u32) -> StorageResult<()> {
        for statement in migration_statements(version, self.dimension()) {
            self.run_ddl(version, &statement).await?;
        }
        Ok(())
    }

    async fn run_ddl(&self, version: u32, statement: &str) -> StorageResult<()> {
        let result = match self.db().query(statement).await {
            Ok(response) => response.check().map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_idempotent_clash(&e.to_string()) => {
                tracing::info!(version, statement, "schema element already present");
                Ok(())
            }
            Err(e) => Err(StorageError::Migration {
                version,
                message: e.to_string(),
            }),
        }
    }
}

/// DDL-on-existing-element errors that migrations tolerate
fn is_idempotent_clash(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("already exists")
        || lowered.contains("already defined")
        || lowered.contains("duplicate")
}

/// The statements for one numbered migration
fn migration_statements(version: u32, dimension: usize) -> Vec<String> {
    let d = dimension;
    match version {
        1 => vec![
            "DEFINE TABLE facts SCHEMAFULL".into(),
            "DEFINE FIELD user_id ON facts TYPE string".into(),
            "DEFINE FIELD key ON facts TYPE string".into(),
            "DEFINE FIELD value ON facts FLEXIBLE TYPE any".into(),
            "DEFINE FIELD created_at ON facts TYPE datetime".into(),
            "DEFINE FIELD updated_at ON facts TYPE datetime".into(),
            "DEFINE INDEX idx_facts_user_key ON facts FIELDS user_id, key UNIQUE".into(),
            "DEFINE INDEX idx_facts_user ON facts FIELDS user_id".into(),
        ],
        2 => vec![
            "DEFINE TABLE vector_memories SCHEMAFULL".into(),
            "DEFINE FIELD user_id ON vector_memories TYPE string".into(),
            "DEFINE FIELD content ON vector_memories TYPE string".into(),
            "DEFINE FIELD embedding ON vector_memories TYPE array<float>".into(),
            "DEFINE FIELD metadata ON vector_memories FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD created_at ON vector_memories TYPE datetime".into(),
            "DEFINE FIELD updated_at ON vector_memories TYPE datetime".into(),
            "DEFINE INDEX idx_vector_memories_user ON vector_memories FIELDS user_id".into(),
            format!(
                "DEFINE INDEX idx_vector_memories_embedding ON vector_memories FIELDS embedding MTREE DIMENSION {d} DIST COSINE TYPE F64"
            ),
        ],
        3 => vec![
            "DEFINE TABLE entities SCHEMAFULL".into(),
            "DEFINE FIELD entity_type ON entities TYPE string".into(),
            "DEFINE FIELD name ON entities TYPE string".into(),
            "DEFINE FIELD properties ON entities FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD created_at ON entities TYPE datetime".into(),
            "DEFINE INDEX idx_entities_name ON entities FIELDS name".into(),
            "DEFINE INDEX idx_entities_type ON entities FIELDS entity_type".into(),
        ],
        4 => vec![
            "DEFINE TABLE relationships SCHEMAFULL".into(),
            "DEFINE FIELD from_entity ON relationships TYPE record<entities>".into(),
            "DEFINE FIELD to_entity ON relationships TYPE record<entities>".into(),
            "DEFINE FIELD relationship_type ON relationships TYPE string".into(),
            "DEFINE FIELD properties ON relationships FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD created_at ON relationships TYPE datetime".into(),
            "DEFINE INDEX idx_relationships_from ON relationships FIELDS from_entity".into(),
            "DEFINE INDEX idx_relationships_to ON relationships FIELDS to_entity".into(),
            "DEFINE INDEX idx_relationships_type ON relationships FIELDS relationship_type".into(),
        ],
        5 => vec![
            "DEFINE TABLE kb_documents SCHEMAFULL".into(),
            "DEFINE FIELD file_path ON kb_documents TYPE string".into(),
            "DEFINE FIELD content ON kb_documents TYPE string".into(),
            "DEFINE FIELD embedding ON kb_documents TYPE array<float>".into(),
            "DEFINE FIELD metadata ON kb_documents FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD chunk_index ON kb_documents TYPE int".into(),
            "DEFINE FIELD chunk_count ON kb_documents TYPE int".into(),
            "DEFINE FIELD source_file ON kb_documents TYPE option<string>".into(),
            "DEFINE FIELD created_at ON kb_documents TYPE datetime".into(),
            "DEFINE FIELD updated_at ON kb_documents TYPE datetime".into(),
            "DEFINE INDEX idx_kb_documents_path ON kb_documents FIELDS file_path UNIQUE".into(),
            "DEFINE INDEX idx_kb_documents_source ON kb_documents FIELDS source_file".into(),
            format!(
                "DEFINE INDEX idx_kb_documents_embedding ON kb_documents FIELDS embedding MTREE DIMENSION {d} DIST COSINE TYPE F64"
            ),
        ],
        6 => vec![
            "DEFINE ANALYZER event_analyzer TOKENIZERS CLASS FILTERS LOWERCASE, SNOWBALL(ENGLISH)"
                .into(),
            "DEFINE TABLE events SCHEMAFULL".into(),
            "DEFINE FIELD user_id ON events TYPE string".into(),
            "DEFINE FIELD subject ON events TYPE string".into(),
            "DEFINE FIELD content ON events TYPE string".into(),
            "DEFINE FIELD embedding ON events TYPE array<float>".into(),
            "DEFINE FIELD metadata ON events FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD created_at ON events TYPE datetime".into(),
            "DEFINE INDEX idx_events_user ON events FIELDS user_id".into(),
            "DEFINE INDEX idx_events_subject ON events FIELDS subject".into(),
            "DEFINE INDEX idx_events_user_subject ON events FIELDS user_id, subject".into(),
            "DEFINE INDEX idx_events_created ON events FIELDS created_at".into(),
            "DEFINE INDEX idx_events_content_search ON events FIELDS content SEARCH ANALYZER event_analyzer BM25 HIGHLIGHTS"
                .into(),
            format!(
                "DEFINE INDEX idx_events_embedding ON events FIELDS embedding MTREE DIMENSION {d} DIST COSINE TYPE F64"
            ),
        ],
        7 => vec![
            "DEFINE TABLE user_stats SCHEMAFULL".into(),
            "DEFINE FIELD user_id ON user_stats TYPE string".into(),
            "DEFINE FIELD key_value_count ON user_stats TYPE int".into(),
            "DEFINE FIELD vector_count ON user_stats TYPE int".into(),
            "DEFINE FIELD entity_count ON user_stats TYPE int".into(),
            "DEFINE FIELD relationship_count ON user_stats TYPE int".into(),
            "DEFINE FIELD document_count ON user_stats TYPE int".into(),
            "DEFINE FIELD updated_at ON user_stats TYPE datetime".into(),
            "DEFINE INDEX idx_user_stats_user ON user_stats FIELDS user_id UNIQUE".into(),
        ],
        8 => vec![
            "DEFINE TABLE code_projects SCHEMAFULL".into(),
            "DEFINE FIELD project_id ON code_projects TYPE string".into(),
            "DEFINE FIELD name ON code_projects TYPE string".into(),
            "DEFINE FIELD root_path ON code_projects TYPE string".into(),
            "DEFINE FIELD language_stats ON code_projects FLEXIBLE TYPE option<object>".into(),
            "DEFINE FIELD last_indexed_at ON code_projects TYPE option<datetime>".into(),
            "DEFINE FIELD indexing_status ON code_projects TYPE string".into(),
            "DEFINE FIELD watcher_enabled ON code_projects TYPE bool".into(),
            "DEFINE INDEX idx_code_projects_id ON code_projects FIELDS project_id UNIQUE".into(),
        ],
        9 => vec![
            "DEFINE TABLE code_files SCHEMAFULL".into(),
            "DEFINE FIELD project_id ON code_files TYPE string".into(),
            "DEFINE FIELD file_path ON code_files TYPE string".into(),
            "DEFINE FIELD language ON code_files TYPE string".into(),
            "DEFINE FIELD file_hash ON code_files TYPE string".into(),
            "DEFINE FIELD symbols_count ON code_files TYPE int".into(),
            "DEFINE FIELD indexed_at ON code_files TYPE datetime".into(),
            "DEFINE INDEX idx_code_files_project_path ON code_files FIELDS project_id, file_path UNIQUE"
                .into(),
            "DEFINE INDEX idx_code_files_project ON code_files FIELDS project_id".into(),
        ],
        10 => vec![
            "DEFINE TABLE code_symbols SCHEMAFULL".into(),
            "DEFINE FIELD project_id ON code_symbols TYPE string".into(),
            "DEFINE FIELD file_path ON code_symbols TYPE string".into(),
            "DEFINE FIELD language ON code_symbols TYPE string".into(),
            "DEFINE FIELD symbol_type ON code_symbols TYPE string".into(),
            "DEFINE FIELD name ON code_symbols TYPE string".into(),
            "DEFINE FIELD name_path ON code_symbols TYPE string".into(),
            "DEFINE FIELD start_line ON code_symbols TYPE int".into(),
            "DEFINE FIELD end_line ON code_symbols TYPE int".into(),
            "DEFINE FIELD start_byte ON code_symbols TYPE int".into(),
            "DEFINE FIELD end_byte ON code_symbols TYPE int".into(),
            "DEFINE FIELD source_code ON code_symbols TYPE option<string>".into(),
            "DEFINE FIELD signature ON code_symbols TYPE option<string>".into(),
            "DEFINE FIELD doc_string ON code_symbols TYPE option<string>".into(),
            "DEFINE FIELD embedding ON code_symbols TYPE option<array<float>>".into(),
            "DEFINE FIELD parent_id ON code_symbols TYPE option<record<code_symbols>>".into(),
            "DEFINE FIELD metadata ON code_symbols FLEXIBLE TYPE option<object>".into(),
            "DEFINE INDEX idx_code_symbols_project_name_path ON code_symbols FIELDS project_id, name_path UNIQUE"
                .into(),
            "DEFINE INDEX idx_code_symbols_project_file ON code_symbols FIELDS project_id, file_path"
                .into(),
            "DEFINE INDEX idx_code_symbols_name ON code_symbols FIELDS name".into(),
            format!(
                "DEFINE INDEX idx_code_symbols_embedding ON code_symbols FIELDS embedding MTREE DIMENSION {d} DIST COSINE TYPE F64"
            ),
        ],
        11 => vec![
            "DEFINE TABLE code_chunks SCHEMAFULL".into(),
            "DEFINE FIELD symbol_id ON code_chunks TYPE record<code_symbols>".into(),
            "DEFINE FIELD project_id ON code_chunks TYPE string".into(),
            "DEFINE FIELD file_path ON code_chunks TYPE string".into(),
            "DEFINE FIELD chunk_index ON code_chunks TYPE int".into(),
            "DEFINE FIELD chunk_count ON code_chunks TYPE int".into(),
            "DEFINE FIELD content ON code_chunks TYPE string".into(),
            "DEFINE FIELD start_offset ON code_chunks TYPE int".into(),
            "DEFINE FIELD end_offset ON code_chunks TYPE int".into(),
            "DEFINE FIELD embedding ON code_chunks TYPE option<array<float>>".into(),
            "DEFINE FIELD symbol_name ON code_chunks TYPE string".into(),
            "DEFINE FIELD symbol_type ON code_chunks TYPE string".into(),
            "DEFINE FIELD language ON code_chunks TYPE string".into(),
            "DEFINE INDEX idx_code_chunks_symbol_index ON code_chunks FIELDS symbol_id, chunk_index UNIQUE"
                .into(),
            "DEFINE INDEX idx_code_chunks_project ON code_chunks FIELDS project_id".into(),
            format!(
                "DEFINE INDEX idx_code_chunks_embedding ON code_chunks FIELDS embedding MTREE DIMENSION {d} DIST COSINE TYPE F64"
            ),
        ],
        12 => vec![
            "DEFINE TABLE indexing_jobs SCHEMAFULL".into(),
            "DEFINE FIELD job_id ON indexing_jobs TYPE string".into(),
            "DEFINE FIELD project_id ON indexing_jobs TYPE string".into(),
            "DEFINE FIELD project_path ON indexing_jobs TYPE string".into(),
            "DEFINE FIELD status ON indexing_jobs TYPE string".into(),
            "DEFINE FIELD progress ON indexing_jobs TYPE float".into(),
            "DEFINE FIELD files_total ON indexing_jobs TYPE int".into(),
            "DEFINE FIELD files_indexed ON indexing_jobs TYPE int".into(),
            "DEFINE FIELD started_at ON indexing_jobs TYPE datetime".into(),
            "DEFINE FIELD completed_at ON indexing_jobs TYPE option<datetime>".into(),
            "DEFINE FIELD error ON indexing_jobs TYPE option<string>".into(),
            "DEFINE INDEX idx_indexing_jobs_id ON indexing_jobs FIELDS job_id UNIQUE".into(),
            "DEFINE INDEX idx_indexing_jobs_project ON indexing_jobs FIELDS project_id".into(),
        ],
        _ => Vec::new(),
    }
}
