//! Watcher manager
//!
//! The system watches exactly one project at a time. Activating project B
//! while A is active stops A, clears A's persistent flag, reconciles B's
//! index against disk, and starts B's watcher. The active slot is guarded
//! by a mutex so only one activation runs at a time.

use crate::error::{IndexingError, IndexingResult};
use crate::indexer::Indexer;
use crate::outdated::{process_outdated_files, scan_outdated_files};
use crate::watcher::CodeWatcher;
use engram_config::WatchConfig;
use engram_storage::{IndexingStatus, Storage};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Watch state of one project as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub project_id: String,
    pub is_active: bool,
    pub watcher_enabled: bool,
}

/// Enforces the single-active-watcher invariant
pub struct WatcherManager {
    storage: Storage,
    indexer: Arc<Indexer>,
    config: WatchConfig,
    active: Mutex<Option<CodeWatcher>>,
}

impl WatcherManager {
    pub fn new(storage: Storage, indexer: Arc<Indexer>, config: WatchConfig) -> Self {
        Self {
            storage,
            indexer,
            config,
            active: Mutex::new(None),
        }
    }

    /// Activate watching for a project
    ///
    /// The project must have been indexed at least once: `pending` and
    /// `failed` projects are rejected. Any previously active watcher is
    /// stopped and its persistent flag cleared. Before the new watcher
    /// starts, files changed while no watcher was running are reconciled.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, `Watcher` for lifecycle violations, and
    /// storage errors from flag persistence.
    pub async fn activate(&self, project_id: &str) -> IndexingResult<WatchStatus> {
        let mut slot = self.active.lock().await;

        let project = self
            .storage
            .get_code_project(project_id)
            .await?
            .ok_or_else(|| IndexingError::ProjectNotFound(project_id.to_string()))?;
        match project.indexing_status {
            IndexingStatus::Completed | IndexingStatus::InProgress | IndexingStatus::Cancelled => {}
            IndexingStatus::Pending | IndexingStatus::Failed => {
                return Err(IndexingError::Watcher(format!(
                    "project '{project_id}' cannot be watched while {}",
                    project.indexing_status
                )));
            }
        }

        if let Some(current) = slot.as_ref() {
            if current.project_id() == project_id {
                return Ok(WatchStatus {
                    project_id: project_id.to_string(),
                    is_active: true,
                    watcher_enabled: true,
                });
            }
            let previous = current.project_id().to_string();
            current.stop();
            self.storage.set_project_watcher(&previous, false).await?;
            tracing::info!(previous = %previous, next = %project_id, "watcher handed over");
        }
        *slot = None;

        let root = PathBuf::from(&project.root_path);
        let token = CancellationToken::new();

        // Catch up on edits made while nothing was watching
        let scanner = self.indexer.scanner();
        match scan_outdated_files(&self.storage, &scanner, project_id, &root).await {
            Ok(outdated) if !outdated.is_empty() => {
                tracing::info!(
                    project_id = %project_id,
                    new = outdated.new_files.len(),
                    modified = outdated.modified.len(),
                    deleted = outdated.deleted.len(),
                    "reconciling outdated files"
                );
                if let Err(e) =
                    process_outdated_files(&self.indexer, project_id, &outdated, &token).await
                {
                    tracing::warn!(project_id = %project_id, error = %e, "reconciliation aborted");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(project_id = %project_id, error = %e, "reconciliation scan failed");
            }
        }

        let watcher = CodeWatcher::start(
            project_id.to_string(),
            root,
            Arc::clone(&self.indexer),
            scanner,
            self.config.clone(),
            token,
        )?;
        *slot = Some(watcher);
        self.storage.set_project_watcher(project_id, true).await?;

        Ok(WatchStatus {
            project_id: project_id.to_string(),
            is_active: true,
            watcher_enabled: true,
        })
    }

    /// Stop watching a project (no-op when it is not the active one)
    ///
    /// # Errors
    ///
    /// Returns storage errors from flag persistence.
    pub async fn deactivate(&self, project_id: &str) -> IndexingResult<WatchStatus> {
        let mut slot = self.active.lock().await;
        if slot
            .as_ref()
            .is_some_and(|watcher| watcher.project_id() == project_id)
        {
            if let Some(watcher) = slot.take() {
                watcher.stop();
            }
        }
        self.storage.set_project_watcher(project_id, false).await?;
        Ok(WatchStatus {
            project_id: project_id.to_string(),
            is_active: false,
            watcher_enabled: false,
        })
    }

    /// Watch state of one project
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project.
    pub async fn watch_status(&self, project_id: &str) -> IndexingResult<WatchStatus> {
        let project = self
            .storage
            .get_code_project(project_id)
            .await?
            .ok_or_else(|| IndexingError::ProjectNotFound(project_id.to_string()))?;
        let slot = self.active.lock().await;
        Ok(WatchStatus {
            project_id: project_id.to_string(),
            is_active: slot
                .as_ref()
                .is_some_and(|watcher| watcher.project_id() == project_id),
            watcher_enabled: project.watcher_enabled,
        })
    }

    /// Project id currently holding the watcher slot, if any
    pub async fn active_project(&self) -> Option<String> {
        let slot = self.active.lock().await;
        slot.as_ref().map(|watcher| watcher.project_id().to_string())
    }

    /// Stop whatever is active (shutdown path)
    pub async fn shutdown(&self) {
        let mut slot = self.active.lock().await;
        if let Some(watcher) = slot.take() {
            watcher.stop();
        }
    }

    /// At boot, resume the first project with its persistent flag set
    ///
    /// Failures are logged, never fatal: a missing directory must not keep
    /// the server from starting.
    pub async fn auto_activate_on_boot(&self) {
        let projects = match self.storage.list_code_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!(error = %e, "could not list projects for watcher auto-start");
                return;
            }
        };
        let Some(project) = projects.into_iter().find(|p| p.watcher_enabled) else {
            return;
        };
        match self.activate(&project.project_id).await {
            Ok(_) => {
                tracing::info!(project_id = %project.project_id, "watcher auto-activated");
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %project.project_id,
                    error = %e,
                    "watcher auto-activation failed"
                );
            }
        }
    }
}
