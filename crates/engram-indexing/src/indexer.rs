//! Concurrent project indexer
//!
//! Orchestrates scan -> parse -> extract -> embed -> persist with a fixed
//! pool of parse workers. Each worker constructs its own parser: tree-sitter
//! parsers are not safe for concurrent use and must never be shared. A
//! panic while processing one file is caught, counted as that file's
//! failure, and the worker moves on.

use crate::error::{IndexingError, IndexingResult};
use crate::progress::{ProgressMap, ProjectProgress};
use crate::scanner::{FileScanner, ScannedFile, hash_bytes};
use engram_config::IndexingConfig;
use engram_embeddings::TextEmbedder;
use engram_parsing::{Chunker, SourceParser, WalkOptions, embedding_prompt, extract_symbols};
use engram_storage::{IndexingStatus, NewCodeChunk, NewCodeSymbol, Storage, derive_project_id};
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Outcome of one project index run
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub project_id: String,
    pub files_total: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub symbols_found: usize,
    pub status: IndexingStatus,
}

enum FileOutcome {
    /// Hash unchanged, nothing re-parsed
    Unchanged,
    /// Parsed and persisted with this many symbols
    Indexed(usize),
}

/// Project indexer with incremental per-file hashing
pub struct Indexer {
    storage: Storage,
    embedder: Arc<dyn TextEmbedder>,
    config: IndexingConfig,
    progress: ProgressMap,
}

impl Indexer {
    pub fn new(
        storage: Storage,
        embedder: Arc<dyn TextEmbedder>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            config,
            progress: ProgressMap::new(),
        }
    }

    /// Live progress for a project, if an index run has touched it
    pub fn progress(&self, project_id: &str) -> Option<ProjectProgress> {
        self.progress.get(project_id)
    }

    /// Scanner configured the way this indexer scans (watcher reuses it)
    pub fn scanner(&self) -> FileScanner {
        FileScanner::new(self.config.max_file_size)
    }

    /// Index a whole project from its root directory
    ///
    /// # Errors
    ///
    /// Returns `StorageError` wrappers when project bookkeeping writes fail;
    /// individual file failures are tallied, not propagated.
    pub async fn index_project(
        self: &Arc<Self>,
        root_path: &Path,
        name: &str,
        token: &CancellationToken,
    ) -> IndexingResult<IndexReport> {
        let root = root_path
            .canonicalize()
            .map_err(|e| IndexingError::Other(format!("unreadable root {root_path:?}: {e}")))?;
        let project_id = derive_project_id(&root);

        self.storage
            .upsert_code_project(&project_id, name, &root.to_string_lossy())
            .await?;
        self.storage
            .set_project_status(&project_id, IndexingStatus::InProgress, None)
            .await?;

        let scan = self.scanner().scan(&root);
        for error in &scan.errors {
            tracing::warn!(project_id = %project_id, error = %error, "scan entry failed");
        }
        let language_stats = serde_json::to_value(&scan.language_counts)
            .unwrap_or(serde_json::Value::Null);
        self.storage
            .set_project_language_stats(&project_id, language_stats)
            .await?;

        let files_total = scan.files.len();
        self.progress
            .insert(&project_id, ProjectProgress::new(files_total));

        let (indexed, failed, symbols) = self
            .run_worker_pool(&project_id, scan.files, token)
            .await;

        let status = if token.is_cancelled() {
            IndexingStatus::Cancelled
        } else if files_total > 0 && failed == files_total {
            IndexingStatus::Failed
        } else {
            if failed > 0 {
                tracing::warn!(
                    project_id = %project_id,
                    failed,
                    files_total,
                    "project completed with partial failures"
                );
            }
            IndexingStatus::Completed
        };

        let indexed_at = (status == IndexingStatus::Completed).then(chrono::Utc::now);
        self.storage
            .set_project_status(&project_id, status, indexed_at)
            .await?;
        self.progress.update(&project_id, |progress| {
            progress.status = status;
        });

        Ok(IndexReport {
            project_id,
            files_total,
            files_indexed: indexed,
            files_failed: failed,
            symbols_found: symbols,
            status,
        })
    }

    /// Dispatch files to N workers over a bounded channel
    async fn run_worker_pool(
        self: &Arc<Self>,
        project_id: &str,
        files: Vec<ScannedFile>,
        token: &CancellationToken,
    ) -> (usize, usize, usize) {
        let capacity = files.len().max(1);
        let (tx, rx) = mpsc::channel::<ScannedFile>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let indexed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let symbols = Arc::new(AtomicUsize::new(0));

        let mut workers = tokio::task::JoinSet::new();
        for worker_id in 0..self.config.workers {
            let indexer = Arc::clone(self);
            let rx = Arc::clone(&rx);
            let project_id = project_id.to_string();
            let indexed = Arc::clone(&indexed);
            let failed = Arc::clone(&failed);
            let symbols = Arc::clone(&symbols);
            let token = token.clone();

            workers.spawn(async move {
                // One parser per worker: never shared across tasks
                let mut parser = SourceParser::new();
                loop {
                    let file = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(file) = file else { break };
                    if token.is_cancelled() {
                        break;
                    }

                    let rel_path = file.rel_path.clone();
                    indexer.progress.update(&project_id, |p| {
                        p.current_file = Some(rel_path.clone());
                    });

                    // A panic in one file must not take down the pool
                    let outcome = std::panic::AssertUnwindSafe(
                        indexer.index_scanned_file(&project_id, &file, &mut parser),
                    )
                    .catch_unwind()
                    .await;

                    match outcome {
                        Ok(Ok(FileOutcome::Indexed(count))) => {
                            indexed.fetch_add(1, Ordering::Relaxed);
                            symbols.fetch_add(count, Ordering::Relaxed);
                            indexer.progress.update(&project_id, |p| {
                                p.files_indexed += 1;
                                p.symbols_found += count;
                            });
                        }
                        Ok(Ok(FileOutcome::Unchanged)) => {
                            indexed.fetch_add(1, Ordering::Relaxed);
                            indexer.progress.update(&project_id, |p| {
                                p.files_indexed += 1;
                            });
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(
                                project_id = %project_id,
                                file = %file.rel_path,
                                error = %e,
                                "file failed to index"
                            );
                            failed.fetch_add(1, Ordering::Relaxed);
                            indexer.progress.update(&project_id, |p| {
                                p.files_failed += 1;
                            });
                        }
                        Err(panic) => {
                            tracing::error!(
                                project_id = %project_id,
                                file = %file.rel_path,
                                worker_id,
                                panic = ?panic_message(&panic),
                                "worker recovered from panic"
                            );
                            failed.fetch_add(1, Ordering::Relaxed);
                            indexer.progress.update(&project_id, |p| {
                                p.files_failed += 1;
                            });
                        }
                    }
                }
            });
        }

        // Sender blocks when every worker is busy; cancellation is checked
        // before each dispatch so queued work is dropped, in-flight work
        // completes.
        for file in files {
            if token.is_cancelled() {
                break;
            }
            if tx.send(file).await.is_err() {
                break;
            }
        }
        drop(tx);
        while workers.join_next().await.is_some() {}

        (
            indexed.load(Ordering::Relaxed),
            failed.load(Ordering::Relaxed),
            symbols.load(Ordering::Relaxed),
        )
    }

    /// Re-index a single file, e.g. after a watcher event
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project and storage/parse
    /// errors for the file itself.
    pub async fn reindex_file(
        &self,
        project_id: &str,
        rel_path: &str,
    ) -> IndexingResult<usize> {
        let project = self
            .storage
            .get_code_project(project_id)
            .await?
            .ok_or_else(|| IndexingError::ProjectNotFound(project_id.to_string()))?;
        let abs_path = PathBuf::from(&project.root_path).join(rel_path);

        let extension = abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let Some(language) = engram_parsing::get_language_from_extension(&extension) else {
            return Err(IndexingError::Other(format!(
                "unsupported extension for {rel_path}"
            )));
        };

        let bytes = std::fs::read(&abs_path)?;
        let file = ScannedFile {
            abs_path,
            rel_path: rel_path.to_string(),
            language: language.to_string(),
            size: bytes.len() as u64,
            sha256: hash_bytes(&bytes),
        };

        let mut parser = SourceParser::new();
        match self.index_scanned_file(project_id, &file, &mut parser).await? {
            FileOutcome::Indexed(count) => Ok(count),
            FileOutcome::Unchanged => Ok(0),
        }
    }

    /// Drop one file's rows after it disappeared from disk
    ///
    /// # Errors
    ///
    /// Returns storage errors from the cascade delete.
    pub async fn remove_file(&self, project_id: &str, rel_path: &str) -> IndexingResult<()> {
        self.storage.delete_code_file(project_id, rel_path).await?;
        tracing::info!(project_id = %project_id, file = %rel_path, "removed deleted file from index");
        Ok(())
    }

    /// Per-file pipeline: hash check, parse, replace symbols, embed, chunk
    async fn index_scanned_file(
        &self,
        project_id: &str,
        file: &ScannedFile,
        parser: &mut SourceParser,
    ) -> IndexingResult<FileOutcome> {
        if let Some(stored) = self
            .storage
            .get_code_file(project_id, &file.rel_path)
            .await?
        {
            if stored.file_hash == file.sha256 {
                tracing::debug!(file = %file.rel_path, "hash unchanged, skipping");
                return Ok(FileOutcome::Unchanged);
            }
        }

        let content = std::fs::read_to_string(&file.abs_path)?;
        let tree = parser.parse(&content, &file.language)?;
        let options = WalkOptions {
            max_symbol_size: self.config.max_symbol_size,
            include_source_code: self.config.include_source_code,
        };
        let parsed = extract_symbols(&tree, &content, &file.language, &options)?;

        // Replace, never merge: old symbols go before the new ones land
        self.storage
            .delete_file_symbols(project_id, &file.rel_path)
            .await?;

        let embeddings = self.embed_symbols(&parsed).await;
        // Name paths are prefixed with the file's module path so the
        // per-project uniqueness of (project_id, name_path) holds even when
        // two files define the same top-level name
        let module = module_path(&file.rel_path);
        let new_symbols: Vec<NewCodeSymbol> = parsed
            .iter()
            .zip(embeddings.iter())
            .map(|(symbol, embedding)| NewCodeSymbol {
                project_id: project_id.to_string(),
                file_path: file.rel_path.clone(),
                language: file.language.clone(),
                symbol_type: symbol.kind.as_str().to_string(),
                name: symbol.name.clone(),
                name_path: format!("{module}.{}", symbol.name_path),
                start_line: symbol.start_line as i64,
                end_line: symbol.end_line as i64,
                start_byte: symbol.start_byte as i64,
                end_byte: symbol.end_byte as i64,
                source_code: symbol.source_code.clone(),
                signature: symbol.signature.clone(),
                doc_string: symbol.doc_string.clone(),
                embedding: embedding.clone(),
            })
            .collect();

        let symbol_ids = self.storage.save_code_symbols(&new_symbols).await?;
        self.storage
            .upsert_code_file(
                project_id,
                &file.rel_path,
                &file.language,
                &file.sha256,
                new_symbols.len() as i64,
            )
            .await?;

        // Chunk fan-out is best-effort: a chunking failure downgrades, it
        // never fails the file
        if let Err(e) = self
            .chunk_oversized_symbols(project_id, file, &parsed, &symbol_ids)
            .await
        {
            tracing::warn!(file = %file.rel_path, error = %e, "chunking failed");
        }

        Ok(FileOutcome::Indexed(new_symbols.len()))
    }

    /// Embed one file's symbols as a batch
    ///
    /// A failed batch degrades every symbol to vector-less; a `None` slot
    /// degrades just that symbol. Either way the file proceeds.
    async fn embed_symbols(
        &self,
        symbols: &[engram_parsing::ParsedSymbol],
    ) -> Vec<Option<Vec<f32>>> {
        if symbols.is_empty() {
            return Vec::new();
        }
        let max_chars = self.embedder.max_chars();
        let prompts: Vec<String> = symbols
            .iter()
            .map(|symbol| {
                let body = symbol
                    .source_code
                    .as_deref()
                    .or(symbol.signature.as_deref())
                    .unwrap_or(&symbol.name);
                embedding_prompt(symbol.kind.as_str(), &symbol.name_path, body, max_chars)
            })
            .collect();
        match self.embedder.embed(&prompts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!(error = %e, "symbol embedding batch failed, saving without vectors");
                vec![None; symbols.len()]
            }
        }
    }

    async fn chunk_oversized_symbols(
        &self,
        project_id: &str,
        file: &ScannedFile,
        parsed: &[engram_parsing::ParsedSymbol],
        symbol_ids: &[String],
    ) -> IndexingResult<()> {
        let chunker = Chunker::new(
            self.config.symbol_chunk_size,
            self.config.symbol_chunk_overlap,
        );
        let max_chars = self.embedder.max_chars();

        for (symbol, symbol_id) in parsed.iter().zip(symbol_ids.iter()) {
            let Some(source) = symbol.source_code.as_deref() else {
                continue;
            };
            if source.len() <= self.config.symbol_chunk_size {
                continue;
            }

            let windows = chunker.split(source);
            let prompts: Vec<String> = windows
                .iter()
                .map(|w| {
                    embedding_prompt(symbol.kind.as_str(), &symbol.name_path, &w.content, max_chars)
                })
                .collect();
            let embeddings = match self.embedder.embed(&prompts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    tracing::warn!(error = %e, "chunk embedding batch failed");
                    vec![None; windows.len()]
                }
            };

            let chunks: Vec<NewCodeChunk> = windows
                .iter()
                .zip(embeddings.iter())
                .map(|(window, embedding)| NewCodeChunk {
                    project_id: project_id.to_string(),
                    file_path: file.rel_path.clone(),
                    chunk_index: window.chunk_index as i64,
                    chunk_count: window.chunk_count as i64,
                    content: window.content.clone(),
                    start_offset: window.start_offset as i64,
                    end_offset: window.end_offset as i64,
                    symbol_name: symbol.name.clone(),
                    symbol_type: symbol.kind.as_str().to_string(),
                    language: file.language.clone(),
                    embedding: embedding.clone(),
                })
                .collect();
            self.storage.save_code_chunks(symbol_id, &chunks).await?;
        }
        Ok(())
    }
}

/// Dotted module path of a file: `src/net/server.rs` -> `src.net.server`
fn module_path(rel_path: &str) -> String {
    let without_ext = rel_path
        .rsplit_once('.')
        .map_or(rel_path, |(stem, _)| stem);
    without_ext.replace(['/', '\\'], ".")
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::module_path;

    #[test]
    fn module_paths_flatten_directories() {
        assert_eq!(module_path("src/net/server.rs"), "src.net.server");
        assert_eq!(module_path("main.py"), "main");
        assert_eq!(module_path("pkg\\windows.go"), "pkg.windows");
        assert_eq!(module_path("Makefile"), "Makefile");
    }
}
