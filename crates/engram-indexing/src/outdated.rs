//! Index/disk reconciliation
//!
//! Compares the set of indexed files against what is on disk right now:
//! files that appeared, files whose hash changed, and files that vanished.
//! Used by the watcher manager when a project is (re)activated after the
//! watcher was down.

use crate::error::{IndexingError, IndexingResult};
use crate::indexer::Indexer;
use crate::scanner::FileScanner;
use engram_storage::Storage;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Differences between the stored index and the working tree
#[derive(Debug, Default, Clone)]
pub struct OutdatedFiles {
    pub new_files: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl OutdatedFiles {
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Diff the stored file rows against a fresh scan of `root`
///
/// # Errors
///
/// Returns storage errors from reading the indexed file set.
pub async fn scan_outdated_files(
    storage: &Storage,
    scanner: &FileScanner,
    project_id: &str,
    root: &Path,
) -> IndexingResult<OutdatedFiles> {
    let indexed: HashMap<String, String> = storage
        .list_code_files(project_id)
        .await?
        .into_iter()
        .map(|file| (file.file_path, file.file_hash))
        .collect();

    let scan = scanner.scan(root);
    let mut outdated = OutdatedFiles::default();
    let mut seen: HashMap<&str, ()> = HashMap::new();

    for file in &scan.files {
        seen.insert(file.rel_path.as_str(), ());
        match indexed.get(&file.rel_path) {
            None => outdated.new_files.push(file.rel_path.clone()),
            Some(stored_hash) if *stored_hash != file.sha256 => {
                outdated.modified.push(file.rel_path.clone());
            }
            Some(_) => {}
        }
    }
    for indexed_path in indexed.keys() {
        if !seen.contains_key(indexed_path.as_str()) {
            outdated.deleted.push(indexed_path.clone());
        }
    }
    Ok(outdated)
}

/// Bring the index in line with the diff: reindex new/modified, delete
/// removed. Cancellation aborts between files, never mid-write.
///
/// # Errors
///
/// Returns `Cancelled` when the token trips; per-file failures are logged
/// and skipped.
pub async fn process_outdated_files(
    indexer: &Indexer,
    project_id: &str,
    outdated: &OutdatedFiles,
    token: &CancellationToken,
) -> IndexingResult<usize> {
    let mut processed = 0usize;

    for rel_path in outdated.new_files.iter().chain(&outdated.modified) {
        if token.is_cancelled() {
            return Err(IndexingError::Cancelled);
        }
        match indexer.reindex_file(project_id, rel_path).await {
            Ok(_) => processed += 1,
            Err(e) => {
                tracing::warn!(project_id = %project_id, file = %rel_path, error = %e, "reconcile reindex failed");
            }
        }
    }
    for rel_path in &outdated.deleted {
        if token.is_cancelled() {
            return Err(IndexingError::Cancelled);
        }
        match indexer.remove_file(project_id, rel_path).await {
            Ok(()) => processed += 1,
            Err(e) => {
                tracing::warn!(project_id = %project_id, file = %rel_path, error = %e, "reconcile delete failed");
            }
        }
    }
    Ok(processed)
}
