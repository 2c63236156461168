//! Persisted indexing-job records
//!
//! Jobs live in memory while running; terminal jobs (completed, failed,
//! cancelled) are written here for post-hoc inspection.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::models::StoredJob;

impl Storage {
    /// Write or replace a job record keyed by its job id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn persist_job(&self, job: &StoredJob) -> StorageResult<()> {
        self.db()
            .query("DELETE indexing_jobs WHERE job_id = $job_id")
            .bind(("job_id", job.job_id.clone()))
            .await?
            .check()?;
        self.db()
            .query("CREATE indexing_jobs CONTENT $data RETURN NONE")
            .bind(("data", job.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Read one persisted job
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_job(&self, job_id: &str) -> StorageResult<Option<StoredJob>> {
        let mut response = self
            .db()
            .query("SELECT * FROM indexing_jobs WHERE job_id = $job_id LIMIT 1")
            .bind(("job_id", job_id.to_string()))
            .await?
            .check()?;
        let mut rows: Vec<StoredJob> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// Persisted jobs, newest first, optionally scoped to a project
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_jobs(&self, project_id: Option<&str>) -> StorageResult<Vec<StoredJob>> {
        let sql = if project_id.is_some() {
            "SELECT * FROM indexing_jobs WHERE project_id = $project_id \
             ORDER BY started_at DESC"
        } else {
            "SELECT * FROM indexing_jobs ORDER BY started_at DESC"
        };
        let mut request = self.db().query(sql);
        if let Some(project) = project_id {
            request = request.bind(("project_id", project.to_string()));
        }
        let mut response = request.await?.check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }
}
