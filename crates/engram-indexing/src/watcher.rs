//! Per-project filesystem watcher
//!
//! Registers every non-excluded directory with the OS event source, then
//! runs an event loop over the event stream and a periodic tick. Writes are
//! debounced per path - editors that write through a temp-rename cycle fire
//! several events in quick succession - and deletions are applied
//! immediately.

use crate::error::{IndexingError, IndexingResult};
use crate::indexer::Indexer;
use crate::scanner::FileScanner;
use engram_config::WatchConfig;
use engram_parsing::get_language_from_extension;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// A running watcher for exactly one project
pub struct CodeWatcher {
    project_id: String,
    token: CancellationToken,
    stopped: AtomicBool,
}

impl CodeWatcher {
    /// Register the directory tree and spawn the event loop
    ///
    /// # Errors
    ///
    /// Returns `IndexingError::Watcher` when the OS event source cannot be
    /// created or the root cannot be registered.
    pub fn start(
        project_id: String,
        root: PathBuf,
        indexer: Arc<Indexer>,
        scanner: FileScanner,
        config: WatchConfig,
        token: CancellationToken,
    ) -> IndexingResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = tx.send(event);
        })
        .map_err(|e| IndexingError::Watcher(e.to_string()))?;

        // Excluded directories are never registered, so their events never
        // arrive; new directories join the watch set from Create events.
        let mut registered = 0usize;
        for entry in WalkDir::new(&root).follow_links(false).into_iter().flatten() {
            if !entry.file_type().is_dir() {
                continue;
            }
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if !rel.as_os_str().is_empty() && scanner.should_exclude(rel) {
                continue;
            }
            if let Err(e) = watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
                tracing::warn!(path = ?entry.path(), error = %e, "failed to watch directory");
            } else {
                registered += 1;
            }
        }
        if registered == 0 {
            return Err(IndexingError::Watcher(format!(
                "no watchable directories under {}",
                root.display()
            )));
        }
        tracing::info!(project_id = %project_id, directories = registered, "watcher started");

        let loop_token = token.clone();
        let loop_project = project_id.clone();
        tokio::spawn(event_loop(
            watcher, rx, loop_project, root, indexer, scanner, config, loop_token,
        ));

        Ok(Self {
            project_id,
            token,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Stop the event loop and release the OS watches; idempotent
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        tracing::info!(project_id = %self.project_id, "watcher stopped");
    }
}

impl Drop for CodeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
async fn event_loop(
    mut watcher: RecommendedWatcher,
    mut rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    project_id: String,
    root: PathBuf,
    indexer: Arc<Indexer>,
    scanner: FileScanner,
    config: WatchConfig,
    token: CancellationToken,
) {
    let debounce = Duration::from_millis(config.debounce_ms);
    let mut tick = tokio::time::interval(Duration::from_millis(config.tick_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Pending reindexes keyed by relative path, stamped at the last event
    let mut pending: HashMap<String, Instant> = HashMap::new();

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            event = rx.recv() => {
                match event {
                    Some(Ok(event)) => {
                        handle_event(
                            &event, &mut watcher, &project_id, &root,
                            &indexer, &scanner, &mut pending,
                        ).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(project_id = %project_id, error = %e, "watch event error");
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                flush_pending(&indexer, &project_id, &mut pending, debounce).await;
            }
        }
    }
    // Dropping the watcher here closes the event source
    drop(watcher);
    tracing::debug!(project_id = %project_id, "watcher event loop exited");
}

async fn handle_event(
    event: &notify::Event,
    watcher: &mut RecommendedWatcher,
    project_id: &str,
    root: &Path,
    indexer: &Arc<Indexer>,
    scanner: &FileScanner,
    pending: &mut HashMap<String, Instant>,
) {
    for path in &event.paths {
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if scanner.should_exclude(rel) {
            continue;
        }

        // A created directory joins the watch set so events keep flowing
        if matches!(event.kind, EventKind::Create(_)) && path.is_dir() {
            if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
                tracing::warn!(path = ?path, error = %e, "failed to watch new directory");
            }
            continue;
        }

        if !is_code_file(path) {
            continue;
        }
        let rel_path = rel.to_string_lossy().replace('\\', "/");

        let removed = match event.kind {
            EventKind::Remove(_) => true,
            // Renames arrive as name-modify pairs; the source half of the
            // pair no longer exists on disk
            EventKind::Modify(ModifyKind::Name(_)) => !path.exists(),
            _ => false,
        };

        if removed {
            pending.remove(&rel_path);
            if let Err(e) = indexer.remove_file(project_id, &rel_path).await {
                tracing::warn!(file = %rel_path, error = %e, "failed to remove watched file");
            }
        } else {
            pending.insert(rel_path, Instant::now());
        }
    }
}

/// Reindex entries whose debounce window has elapsed
async fn flush_pending(
    indexer: &Arc<Indexer>,
    project_id: &str,
    pending: &mut HashMap<String, Instant>,
    debounce: Duration,
) {
    if pending.is_empty() {
        return;
    }
    let now = Instant::now();
    let ready: Vec<String> = pending
        .iter()
        .filter(|(_, stamp)| now.duration_since(**stamp) >= debounce)
        .map(|(path, _)| path.clone())
        .collect();

    for rel_path in ready {
        pending.remove(&rel_path);
        match indexer.reindex_file(project_id, &rel_path).await {
            Ok(symbols) => {
                tracing::info!(file = %rel_path, symbols, "reindexed after change");
            }
            Err(e) => {
                tracing::warn!(file = %rel_path, error = %e, "watched reindex failed");
            }
        }
    }
}

fn is_code_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| get_language_from_extension(&ext).is_some())
}
