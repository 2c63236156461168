//! Centralized configuration management for engram
//!
//! This crate provides a unified configuration system that eliminates
//! duplication across the codebase and provides type-safe, validated
//! configuration.
//!
//! Configuration follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Environment variable overrides (`ENGRAM_*`)
//! 3. Runtime validation

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// SAFE DEFAULTS - Work for any environment (dev, staging, prod, test)
// =============================================================================

// Storage Configuration (embedded database in the working directory)
const DEFAULT_DB_PATH: &str = "./engram.db";
const DEFAULT_SURREALDB_NAMESPACE: &str = "engram";
const DEFAULT_SURREALDB_DATABASE: &str = "memories";
const DEFAULT_SURREALDB_USER: &str = "root";

// Embedding Configuration
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_EMBEDDING_MAX_CHARS: usize = 900;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

// Indexing Configuration
const DEFAULT_INDEX_WORKERS: usize = 4;
const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024; // 1 MiB
const DEFAULT_MAX_SYMBOL_SIZE: usize = 100 * 1024;
const DEFAULT_SYMBOL_CHUNK_SIZE: usize = 800;
const DEFAULT_SYMBOL_CHUNK_OVERLAP: usize = 100;
const DEFAULT_DOCUMENT_CHUNK_SIZE: usize = 3200;
const DEFAULT_DOCUMENT_CHUNK_OVERLAP: usize = 400;
const DEFAULT_INCLUDE_SOURCE_CODE: bool = true;

// Job Manager Configuration
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;
const DEFAULT_JOB_QUEUE_CAPACITY: usize = 32;
const DEFAULT_JOB_RETENTION_SECS: u64 = 24 * 60 * 60;

// Watcher Configuration
const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_WATCH_TICK_MS: u64 = 500;

/// Core configuration for the entire engram application
///
/// All settings have safe defaults and can be overridden via environment
/// variables. No profile/environment selection needed - same defaults work
/// everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Storage engine configuration (embedded or remote)
    pub storage: StorageConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Code indexing configuration
    pub indexing: IndexingConfig,

    /// Indexing job queue configuration
    pub jobs: JobConfig,

    /// Filesystem watcher configuration
    pub watcher: WatchConfig,

    /// Directory watched for knowledge-base Markdown, if any
    pub knowledge_base: Option<PathBuf>,
}

/// Which storage transport to open at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// Local on-disk database driven in-process
    Embedded { path: PathBuf },
    /// Network connection to an external server
    Remote {
        url: String,
        username: String,
        password: String,
    },
}

/// Storage engine configuration
///
/// When `db_path` is set and no remote `url` is configured the engine runs
/// embedded; otherwise it connects to the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: Option<PathBuf>,
    pub url: Option<String>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub namespace: String,
    pub database: String,
}

impl StorageConfig {
    /// Resolve the transport mode from the configured endpoint fields
    pub fn mode(&self) -> StorageMode {
        match (&self.db_path, &self.url) {
            (Some(path), None) => StorageMode::Embedded { path: path.clone() },
            (_, Some(url)) => StorageMode::Remote {
                url: url.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            },
            (None, None) => StorageMode::Embedded {
                path: PathBuf::from(DEFAULT_DB_PATH),
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from(DEFAULT_DB_PATH)),
            url: None,
            username: DEFAULT_SURREALDB_USER.to_string(),
            password: String::new(),
            namespace: DEFAULT_SURREALDB_NAMESPACE.to_string(),
            database: DEFAULT_SURREALDB_DATABASE.to_string(),
        }
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Ollama embeddings endpoint
    Ollama,
    /// OpenAI-compatible embeddings endpoint
    Openai,
    /// Deterministic local hashing (dev/test)
    Hash,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,

    /// Model identifier passed to the provider
    pub model: String,

    /// Provider endpoint URL
    pub url: String,

    /// API key for hosted providers
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Output dimension D; every stored vector is normalised to this length
    pub dimension: usize,

    /// Maximum input size in characters the provider accepts
    pub max_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            url: DEFAULT_OLLAMA_URL.to_string(),
            api_key: None,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_chars: DEFAULT_EMBEDDING_MAX_CHARS,
        }
    }
}

/// Code indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Number of concurrent parse workers, each owning a dedicated parser
    pub workers: usize,

    /// Files larger than this are skipped with reason `too_large`
    pub max_file_size: u64,

    /// Symbols whose source exceeds this are stored without `source_code`
    pub max_symbol_size: usize,

    /// Window size in bytes for symbol chunking
    pub symbol_chunk_size: usize,

    /// Overlap in bytes between consecutive symbol chunks
    pub symbol_chunk_overlap: usize,

    /// Window size in bytes for knowledge-base document chunking
    pub document_chunk_size: usize,

    /// Overlap in bytes between consecutive document chunks
    pub document_chunk_overlap: usize,

    /// Whether to persist symbol source code alongside the symbol row
    pub include_source_code: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_INDEX_WORKERS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_symbol_size: DEFAULT_MAX_SYMBOL_SIZE,
            symbol_chunk_size: DEFAULT_SYMBOL_CHUNK_SIZE,
            symbol_chunk_overlap: DEFAULT_SYMBOL_CHUNK_OVERLAP,
            document_chunk_size: DEFAULT_DOCUMENT_CHUNK_SIZE,
            document_chunk_overlap: DEFAULT_DOCUMENT_CHUNK_OVERLAP,
            include_source_code: DEFAULT_INCLUDE_SOURCE_CODE,
        }
    }
}

/// Indexing job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Number of job workers pulling from the queue
    pub max_concurrent_jobs: usize,

    /// Queue capacity; `submit` fails fast once full
    pub queue_capacity: usize,

    /// Completed jobs older than this are purged from memory
    pub retention_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            queue_capacity: DEFAULT_JOB_QUEUE_CAPACITY,
            retention_secs: DEFAULT_JOB_RETENTION_SECS,
        }
    }
}

/// Filesystem watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last write before a file is reindexed
    pub debounce_ms: u64,

    /// Interval at which the pending map is flushed
    pub tick_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
            tick_ms: DEFAULT_WATCH_TICK_MS,
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            indexing: IndexingConfig::default(),
            jobs: JobConfig::default(),
            watcher: WatchConfig::default(),
            knowledge_base: None,
        }
    }
}

impl ApplicationConfig {
    /// Build configuration from defaults plus `ENGRAM_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error when an override cannot be parsed or the resulting
    /// configuration fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        engram_common::initialize_environment();

        let mut config = Self::default();

        if let Some(path) = env_string("ENGRAM_DB_PATH") {
            config.storage.db_path = Some(PathBuf::from(path));
        }
        if let Some(url) = env_string("ENGRAM_SURREALDB_URL") {
            config.storage.url = Some(url);
            // A configured remote endpoint wins over the default local path
            if std::env::var("ENGRAM_DB_PATH").is_err() {
                config.storage.db_path = None;
            }
        }
        if let Some(user) = env_string("ENGRAM_SURREALDB_USER") {
            config.storage.username = user;
        }
        if let Some(pass) = env_string("ENGRAM_SURREALDB_PASS") {
            config.storage.password = pass;
        }
        if let Some(ns) = env_string("ENGRAM_SURREALDB_NAMESPACE") {
            config.storage.namespace = ns;
        }
        if let Some(db) = env_string("ENGRAM_SURREALDB_DATABASE") {
            config.storage.database = db;
        }

        if let Some(provider) = env_string("ENGRAM_EMBEDDING_PROVIDER") {
            config.embedding.provider = match provider.to_lowercase().as_str() {
                "ollama" => EmbeddingProviderKind::Ollama,
                "openai" => EmbeddingProviderKind::Openai,
                "hash" => EmbeddingProviderKind::Hash,
                other => {
                    return Err(ConfigError::invalid(
                        "ENGRAM_EMBEDDING_PROVIDER",
                        format!("unknown provider '{other}' (expected ollama, openai or hash)"),
                    ));
                }
            };
            if config.embedding.provider == EmbeddingProviderKind::Openai
                && std::env::var("ENGRAM_EMBEDDING_MODEL").is_err()
            {
                config.embedding.model = DEFAULT_OPENAI_MODEL.to_string();
            }
        }
        if let Some(model) = env_string("ENGRAM_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(url) = env_string("ENGRAM_EMBEDDING_URL") {
            config.embedding.url = url;
        }
        if let Some(key) = env_string("ENGRAM_EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Some(dim) = env_parse::<usize>("ENGRAM_EMBEDDING_DIMENSION")? {
            config.embedding.dimension = dim;
        }
        if let Some(max_chars) = env_parse::<usize>("ENGRAM_EMBEDDING_MAX_CHARS")? {
            config.embedding.max_chars = max_chars;
        }

        if let Some(workers) = env_parse::<usize>("ENGRAM_INDEX_WORKERS")? {
            config.indexing.workers = workers;
        }
        if let Some(size) = env_parse::<u64>("ENGRAM_MAX_FILE_SIZE")? {
            config.indexing.max_file_size = size;
        }
        if let Some(size) = env_parse::<usize>("ENGRAM_SYMBOL_CHUNK_SIZE")? {
            config.indexing.symbol_chunk_size = size;
        }
        if let Some(overlap) = env_parse::<usize>("ENGRAM_SYMBOL_CHUNK_OVERLAP")? {
            config.indexing.symbol_chunk_overlap = overlap;
        }
        if let Some(include) = env_parse::<bool>("ENGRAM_INCLUDE_SOURCE_CODE")? {
            config.indexing.include_source_code = include;
        }

        if let Some(jobs) = env_parse::<usize>("ENGRAM_MAX_CONCURRENT_JOBS")? {
            config.jobs.max_concurrent_jobs = jobs;
        }
        if let Some(capacity) = env_parse::<usize>("ENGRAM_JOB_QUEUE_CAPACITY")? {
            config.jobs.queue_capacity = capacity;
        }

        if let Some(ms) = env_parse::<u64>("ENGRAM_WATCH_DEBOUNCE_MS")? {
            config.watcher.debounce_ms = ms;
        }
        if let Some(kb) = env_string("ENGRAM_KNOWLEDGE_BASE") {
            config.knowledge_base = Some(PathBuf::from(kb));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first violated
    /// constraint.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Validation(
                "embedding dimension must be positive".into(),
            ));
        }
        if self.indexing.workers == 0 {
            return Err(ConfigError::Validation(
                "at least one index worker is required".into(),
            ));
        }
        if self.indexing.symbol_chunk_overlap >= self.indexing.symbol_chunk_size {
            return Err(ConfigError::Validation(format!(
                "symbol chunk overlap ({}) must be smaller than the chunk size ({})",
                self.indexing.symbol_chunk_overlap, self.indexing.symbol_chunk_size
            )));
        }
        if self.indexing.document_chunk_overlap >= self.indexing.document_chunk_size {
            return Err(ConfigError::Validation(format!(
                "document chunk overlap ({}) must be smaller than the chunk size ({})",
                self.indexing.document_chunk_overlap, self.indexing.document_chunk_size
            )));
        }
        // Chunks are embedded as "<kind> <name>: <content>"; the window has to
        // fit the provider budget with headroom for the prefix.
        if self.indexing.symbol_chunk_size > self.embedding.max_chars {
            return Err(ConfigError::Validation(format!(
                "symbol chunk size ({}) exceeds the embedder input budget ({})",
                self.indexing.symbol_chunk_size, self.embedding.max_chars
            )));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ConfigError::Validation(
                "at least one job worker is required".into(),
            ));
        }
        if let StorageMode::Remote { url, .. } = self.storage.mode() {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::Validation(format!(
                    "remote storage URL '{url}' must use the ws:// or wss:// scheme"
                )));
            }
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e.to_string())),
        _ => Ok(None),
    }
}
