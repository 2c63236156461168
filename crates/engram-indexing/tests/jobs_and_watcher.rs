//! Job queue and watcher-manager behaviour against an in-memory database

use engram_config::{IndexingConfig, JobConfig, WatchConfig};
use engram_embeddings::HashEmbedder;
use engram_indexing::{Indexer, IndexingError, JobManager, WatcherManager};
use engram_storage::{IndexingStatus, Storage, derive_project_id};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DIMENSION: usize = 16;

async fn storage() -> Storage {
    let storage = Storage::connect_memory(DIMENSION).await.expect("storage");
    storage.initialize_schema().await.expect("schema");
    storage
}

fn indexer(storage: &Storage) -> Arc<Indexer> {
    let embedder = Arc::new(HashEmbedder::new(DIMENSION, 900));
    Arc::new(Indexer::new(
        storage.clone(),
        embedder,
        IndexingConfig::default(),
    ))
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, content).expect("write");
}

async fn wait_for_terminal(jobs: &JobManager, job_id: &str) -> IndexingStatus {
    for _ in 0..200 {
        let view = jobs.status(job_id).expect("status");
        match view.status {
            IndexingStatus::Completed | IndexingStatus::Failed | IndexingStatus::Cancelled => {
                return view.status;
            }
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
    panic!("job {job_id} never reached a terminal status");
}

#[tokio::test]
async fn submitted_jobs_run_and_persist() {
    let storage = storage().await;
    let jobs = JobManager::new(indexer(&storage), storage.clone(), &JobConfig::default());

    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "lib.rs", "fn a() {}\nfn b() {}\n");

    let job_id = jobs
        .submit(dir.path().to_path_buf(), "queued".into())
        .expect("submit");
    let status = wait_for_terminal(&jobs, &job_id).await;
    assert_eq!(status, IndexingStatus::Completed);

    let view = jobs.status(&job_id).expect("status");
    assert_eq!(view.files_total, 1);
    assert_eq!(view.files_indexed, 1);
    assert!(view.completed_at.is_some());
    assert!((view.progress - 1.0).abs() < f64::EPSILON);

    // Terminal jobs are persisted for post-hoc inspection
    let stored = storage
        .get_job(&job_id)
        .await
        .expect("stored job")
        .expect("exists");
    assert_eq!(stored.status, IndexingStatus::Completed);
    assert_eq!(stored.files_indexed, 1);

    // Reindex resolves the stored root path and re-runs
    let project_id = derive_project_id(&dir.path().canonicalize().expect("canon"));
    let second = jobs.reindex(&project_id).await.expect("reindex");
    assert_eq!(wait_for_terminal(&jobs, &second).await, IndexingStatus::Completed);
}

#[tokio::test]
async fn full_queue_fails_fast() {
    let storage = storage().await;
    let config = JobConfig {
        max_concurrent_jobs: 1,
        queue_capacity: 1,
        ..JobConfig::default()
    };
    let jobs = JobManager::new(indexer(&storage), storage.clone(), &config);

    let dir = tempfile::tempdir().expect("tempdir");
    for i in 0..400 {
        write(dir.path(), &format!("f{i}.rs"), "fn x() {}\n");
    }

    // Saturate: the first may start draining immediately, so push until the
    // bounded queue rejects
    let mut rejected = false;
    for _ in 0..8 {
        match jobs.submit(dir.path().to_path_buf(), "fill".into()) {
            Ok(_) => {}
            Err(IndexingError::QueueFull) => {
                rejected = true;
                break;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(rejected, "queue never reported being full");
}

#[tokio::test]
async fn unknown_ids_are_reported() {
    let storage = storage().await;
    let jobs = JobManager::new(indexer(&storage), storage.clone(), &JobConfig::default());
    assert!(matches!(
        jobs.status("missing"),
        Err(IndexingError::JobNotFound(_))
    ));
    assert!(matches!(
        jobs.cancel("missing"),
        Err(IndexingError::JobNotFound(_))
    ));
    assert!(matches!(
        jobs.reindex("no-such-project").await,
        Err(IndexingError::ProjectNotFound(_))
    ));
}

#[tokio::test]
async fn watcher_single_writer_handoff() {
    let storage = storage().await;
    let indexer = indexer(&storage);

    let dir_a = tempfile::tempdir().expect("tempdir");
    write(dir_a.path(), "a.rs", "fn a() {}\n");
    let dir_b = tempfile::tempdir().expect("tempdir");
    write(dir_b.path(), "b.rs", "fn b() {}\n");

    let token = tokio_util::sync::CancellationToken::new();
    let report_a = indexer
        .index_project(dir_a.path(), "a", &token)
        .await
        .expect("index a");
    let report_b = indexer
        .index_project(dir_b.path(), "b", &token)
        .await
        .expect("index b");

    let manager = WatcherManager::new(
        storage.clone(),
        Arc::clone(&indexer),
        WatchConfig::default(),
    );

    let status = manager.activate(&report_a.project_id).await.expect("activate a");
    assert!(status.is_active);
    assert_eq!(
        manager.active_project().await.as_deref(),
        Some(report_a.project_id.as_str())
    );

    // Activating B stops A and clears A's persistent flag
    manager.activate(&report_b.project_id).await.expect("activate b");

    let status_a = manager
        .watch_status(&report_a.project_id)
        .await
        .expect("status a");
    assert!(!status_a.is_active);
    assert!(!status_a.watcher_enabled);

    let status_b = manager
        .watch_status(&report_b.project_id)
        .await
        .expect("status b");
    assert!(status_b.is_active);
    assert!(status_b.watcher_enabled);

    let project_a = storage
        .get_code_project(&report_a.project_id)
        .await
        .expect("project a")
        .expect("exists");
    assert!(!project_a.watcher_enabled);
    let project_b = storage
        .get_code_project(&report_b.project_id)
        .await
        .expect("project b")
        .expect("exists");
    assert!(project_b.watcher_enabled);

    manager.shutdown().await;
    assert!(manager.active_project().await.is_none());
}

#[tokio::test]
async fn unindexed_projects_cannot_be_watched() {
    let storage = storage().await;
    let indexer = indexer(&storage);
    let manager = WatcherManager::new(
        storage.clone(),
        Arc::clone(&indexer),
        WatchConfig::default(),
    );

    // Unknown project
    assert!(matches!(
        manager.activate("ghost").await,
        Err(IndexingError::ProjectNotFound(_))
    ));

    // Known but never indexed: status is pending, activation is rejected
    storage
        .upsert_code_project("fresh", "Fresh", "/tmp/fresh")
        .await
        .expect("project");
    assert!(matches!(
        manager.activate("fresh").await,
        Err(IndexingError::Watcher(_))
    ));

    // Failed projects are rejected too
    storage
        .set_project_status("fresh", IndexingStatus::Failed, None)
        .await
        .expect("status");
    assert!(matches!(
        manager.activate("fresh").await,
        Err(IndexingError::Watcher(_))
    ));
}

// The watcher spawns tasks that outlive individual test bodies; the shared
// runtime keeps their context alive until the whole suite finishes.
#[test]
fn watcher_reindexes_changed_files() {
    engram_test_utils::get_test_runtime().block_on(async {
        let storage = storage().await;
        let indexer = indexer(&storage);

        let dir = tempfile::tempdir().expect("tempdir");
        let marker = engram_test_utils::next_name_counter();
        write(dir.path(), "watched.rs", "fn one() {}\n");

        let token = tokio_util::sync::CancellationToken::new();
        let report = indexer
            .index_project(dir.path(), &format!("watched-{marker}"), &token)
            .await
            .expect("index");
        let project_id = report.project_id.clone();

        let manager = WatcherManager::new(
            storage.clone(),
            Arc::clone(&indexer),
            WatchConfig {
                debounce_ms: 50,
                tick_ms: 50,
            },
        );
        manager.activate(&project_id).await.expect("activate");

        // Let the OS watcher settle, then change the file
        tokio::time::sleep(Duration::from_millis(200)).await;
        write(dir.path(), "watched.rs", "fn one() {}\nfn two() {}\n");

        let mut symbols = 0;
        for _ in 0..100 {
            symbols = storage
                .count_project_symbols(&project_id)
                .await
                .expect("count");
            if symbols == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(symbols, 2, "watcher never picked up the change");

        manager.shutdown().await;
    });
}
