//! Shared indexing progress state
//!
//! One entry per project, updated by the single writer driving that
//! project's index run and read concurrently by job status queries.

use chrono::{DateTime, Utc};
use engram_storage::IndexingStatus;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Live progress of one project's index run
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub files_total: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub symbols_found: usize,
    pub current_file: Option<String>,
    pub status: IndexingStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectProgress {
    pub fn new(files_total: usize) -> Self {
        let now = Utc::now();
        Self {
            files_total,
            files_indexed: 0,
            files_failed: 0,
            symbols_found: 0,
            current_file: None,
            status: IndexingStatus::InProgress,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.files_total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (self.files_indexed + self.files_failed) as f64 / self.files_total as f64
        }
    }
}

/// Read-write-locked progress map keyed by project id
#[derive(Clone, Default)]
pub struct ProgressMap {
    inner: Arc<RwLock<HashMap<String, ProjectProgress>>>,
}

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &str, progress: ProjectProgress) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(project_id.to_string(), progress);
        }
    }

    pub fn get(&self, project_id: &str) -> Option<ProjectProgress> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(project_id).cloned())
    }

    /// Apply a mutation under the write lock
    pub fn update<F>(&self, project_id: &str, apply: F)
    where
        F: FnOnce(&mut ProjectProgress),
    {
        if let Ok(mut map) = self.inner.write() {
            if let Some(progress) = map.get_mut(project_id) {
                apply(progress);
                progress.updated_at = Utc::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_counts_failures_as_progress() {
        let mut progress = ProjectProgress::new(4);
        progress.files_indexed = 1;
        progress.files_failed = 1;
        assert!((progress.fraction() - 0.5).abs() < f64::EPSILON);

        let empty = ProjectProgress::new(0);
        assert!((empty.fraction()).abs() < f64::EPSILON);
    }

    #[test]
    fn map_updates_are_visible_to_readers() {
        let map = ProgressMap::new();
        map.insert("p", ProjectProgress::new(2));
        map.update("p", |progress| progress.files_indexed += 1);
        assert_eq!(map.get("p").unwrap().files_indexed, 1);
        assert!(map.get("missing").is_none());
    }
}
