//! Async queue of project-indexing jobs
//!
//! Bounded capacity with fail-fast submission, a fixed number of job
//! workers, per-job cancellation tokens, and persistence of terminal jobs
//! through the storage engine.

use crate::error::{IndexingError, IndexingResult};
use crate::indexer::Indexer;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use engram_config::JobConfig;
use engram_storage::{IndexingStatus, Storage, StoredJob};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A queued or running job as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub project_id: String,
    pub project_path: String,
    pub status: IndexingStatus,
    /// `files_indexed / files_total`, live from the indexer while running
    pub progress: f64,
    pub files_total: usize,
    pub files_indexed: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct JobEntry {
    view: JobView,
    token: CancellationToken,
}

struct JobRequest {
    job_id: String,
    project_path: PathBuf,
    project_name: String,
}

/// Bounded job queue with `max_concurrent_jobs` workers
pub struct JobManager {
    indexer: Arc<Indexer>,
    storage: Storage,
    jobs: Arc<DashMap<String, JobEntry>>,
    sender: mpsc::Sender<JobRequest>,
}

impl JobManager {
    /// Construct the manager and spawn its workers
    pub fn new(indexer: Arc<Indexer>, storage: Storage, config: &JobConfig) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<JobRequest>(config.queue_capacity);
        let manager = Arc::new(Self {
            indexer,
            storage,
            jobs: Arc::new(DashMap::new()),
            sender,
        });

        let receiver = Arc::new(Mutex::new(receiver));
        for worker_id in 0..config.max_concurrent_jobs {
            let manager_ref = Arc::clone(&manager);
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    let request = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(request) = request else { break };
                    manager_ref.run_job(request).await;
                }
                tracing::debug!(worker_id, "job worker shutting down");
            });
        }
        manager
    }

    /// Enqueue an indexing job; non-blocking
    ///
    /// # Errors
    ///
    /// Returns `IndexingError::QueueFull` when the bounded queue is at
    /// capacity.
    pub fn submit(
        &self,
        project_path: PathBuf,
        project_name: String,
    ) -> IndexingResult<String> {
        let job_id = Uuid::new_v4().simple().to_string();
        // Match the indexer's id derivation, which canonicalizes the root
        let resolved = project_path
            .canonicalize()
            .unwrap_or_else(|_| project_path.clone());
        let project_id = engram_storage::derive_project_id(&resolved);
        let view = JobView {
            job_id: job_id.clone(),
            project_id,
            project_path: project_path.to_string_lossy().to_string(),
            status: IndexingStatus::Pending,
            progress: 0.0,
            files_total: 0,
            files_indexed: 0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        };
        self.jobs.insert(
            job_id.clone(),
            JobEntry {
                view,
                token: CancellationToken::new(),
            },
        );

        let request = JobRequest {
            job_id: job_id.clone(),
            project_path,
            project_name,
        };
        if self.sender.try_send(request).is_err() {
            self.jobs.remove(&job_id);
            return Err(IndexingError::QueueFull);
        }
        tracing::info!(job_id = %job_id, "indexing job submitted");
        Ok(job_id)
    }

    /// Resolve a project's stored root path and submit a fresh job
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown project and `QueueFull`
    /// when the queue is at capacity.
    pub async fn reindex(&self, project_id: &str) -> IndexingResult<String> {
        let project = self
            .storage
            .get_code_project(project_id)
            .await?
            .ok_or_else(|| IndexingError::ProjectNotFound(project_id.to_string()))?;
        self.submit(PathBuf::from(project.root_path), project.name)
    }

    /// Live status; running jobs report progress from the indexer's map
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` for an unknown id.
    pub fn status(&self, job_id: &str) -> IndexingResult<JobView> {
        let entry = self
            .jobs
            .get(job_id)
            .ok_or_else(|| IndexingError::JobNotFound(job_id.to_string()))?;
        let mut view = entry.view.clone();
        if view.status == IndexingStatus::InProgress {
            if let Some(progress) = self.indexer.progress(&view.project_id) {
                view.files_total = progress.files_total;
                view.files_indexed = progress.files_indexed;
                view.progress = progress.fraction();
            }
        }
        Ok(view)
    }

    /// All jobs currently held in memory
    pub fn list(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .jobs
            .iter()
            .map(|entry| entry.view.clone())
            .collect();
        views.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        views
    }

    /// Trip a job's cancellation token
    ///
    /// The indexer observes it at worker-loop boundaries and before each
    /// file dispatch; the final status becomes `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` for an unknown id.
    pub fn cancel(&self, job_id: &str) -> IndexingResult<()> {
        let entry = self
            .jobs
            .get(job_id)
            .ok_or_else(|| IndexingError::JobNotFound(job_id.to_string()))?;
        entry.token.cancel();
        tracing::info!(job_id = %job_id, "job cancellation requested");
        Ok(())
    }

    /// Purge completed jobs older than `ttl` from memory
    pub fn cleanup_old_jobs(&self, ttl: std::time::Duration) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        self.jobs.retain(|_, entry| {
            match entry.view.completed_at {
                Some(completed) => completed > cutoff,
                None => true, // queued or running jobs always stay
            }
        });
    }

    async fn run_job(&self, request: JobRequest) {
        let Some(token) = self.jobs.get(&request.job_id).map(|e| e.token.clone()) else {
            return; // cleaned up before it ran
        };
        self.update_view(&request.job_id, |view| {
            view.status = IndexingStatus::InProgress;
            view.started_at = Utc::now();
        });

        let result = self
            .indexer
            .index_project(&request.project_path, &request.project_name, &token)
            .await;

        let completed_at = Utc::now();
        match result {
            Ok(report) => {
                self.update_view(&request.job_id, |view| {
                    view.project_id = report.project_id.clone();
                    view.status = report.status;
                    view.files_total = report.files_total;
                    view.files_indexed = report.files_indexed;
                    view.progress = if report.files_total == 0 {
                        1.0
                    } else {
                        #[allow(clippy::cast_precision_loss)]
                        {
                            report.files_indexed as f64 / report.files_total as f64
                        }
                    };
                    view.completed_at = Some(completed_at);
                });
            }
            Err(e) => {
                tracing::error!(job_id = %request.job_id, error = %e, "indexing job failed");
                self.update_view(&request.job_id, |view| {
                    view.status = IndexingStatus::Failed;
                    view.error = Some(e.to_string());
                    view.completed_at = Some(completed_at);
                });
            }
        }

        self.persist_terminal_job(&request.job_id).await;
    }

    fn update_view<F: FnOnce(&mut JobView)>(&self, job_id: &str, apply: F) {
        if let Some(mut entry) = self.jobs.get_mut(job_id) {
            apply(&mut entry.view);
        }
    }

    /// Terminal jobs are persisted for post-hoc inspection
    async fn persist_terminal_job(&self, job_id: &str) {
        let Some(view) = self.jobs.get(job_id).map(|e| e.view.clone()) else {
            return;
        };
        let record = StoredJob {
            job_id: view.job_id.clone(),
            project_id: view.project_id.clone(),
            project_path: view.project_path.clone(),
            status: view.status,
            progress: view.progress,
            files_total: view.files_total as i64,
            files_indexed: view.files_indexed as i64,
            started_at: view.started_at.into(),
            completed_at: view.completed_at.map(Into::into),
            error: view.error.clone(),
        };
        if let Err(e) = self.storage.persist_job(&record).await {
            tracing::warn!(job_id = %job_id, error = %e, "failed to persist job record");
        }
    }
}
