//! End-to-end indexing pipeline tests against an in-memory database
//!
//! Covers full project indexing, hash-based idempotence, single-file
//! incremental reindexing, and reconciliation of files changed while no
//! watcher was running.

use engram_config::IndexingConfig;
use engram_embeddings::HashEmbedder;
use engram_indexing::{Indexer, scan_outdated_files, process_outdated_files};
use engram_storage::{IndexingStatus, Storage, derive_project_id};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

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

const FILE_ONE: &str = "fn alpha() {}\n\nfn beta() {}\n";
const FILE_TWO: &str = "fn gamma() {}\n\nfn delta() {}\n";

#[tokio::test]
async fn full_index_then_incremental_reindex() {
    let storage = storage().await;
    let indexer = indexer(&storage);
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "src/one.rs", FILE_ONE);
    write(dir.path(), "src/two.rs", FILE_TWO);

    let token = CancellationToken::new();
    let report = indexer
        .index_project(dir.path(), "demo", &token)
        .await
        .expect("index");
    let project_id = report.project_id.clone();

    assert_eq!(report.status, IndexingStatus::Completed);
    assert_eq!(report.files_total, 2);
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.symbols_found, 4);
    assert_eq!(
        storage.count_project_symbols(&project_id).await.expect("count"),
        4
    );

    let project = storage
        .get_code_project(&project_id)
        .await
        .expect("project")
        .expect("exists");
    assert_eq!(project.indexing_status, IndexingStatus::Completed);
    assert!(project.last_indexed_at.is_some());

    // Second run with unchanged content: nothing re-parsed, counts stable
    let report = indexer
        .index_project(dir.path(), "demo", &token)
        .await
        .expect("reindex");
    assert_eq!(report.status, IndexingStatus::Completed);
    assert_eq!(report.symbols_found, 0);
    assert_eq!(
        storage.count_project_symbols(&project_id).await.expect("count"),
        4
    );

    // Modify one file: one symbol added
    let old_hash = storage
        .get_code_file(&project_id, "src/one.rs")
        .await
        .expect("file")
        .expect("exists")
        .file_hash;
    write(
        dir.path(),
        "src/one.rs",
        "fn alpha() {}\n\nfn beta() {}\n\nfn extra() {}\n",
    );
    let symbols = indexer
        .reindex_file(&project_id, "src/one.rs")
        .await
        .expect("single-file reindex");
    assert_eq!(symbols, 3);

    // Untouched file is untouched; total count reflects the replacement
    assert_eq!(
        storage.count_project_symbols(&project_id).await.expect("count"),
        5
    );
    let one = storage
        .get_code_file(&project_id, "src/one.rs")
        .await
        .expect("file")
        .expect("exists");
    assert_ne!(one.file_hash, old_hash);
    assert_eq!(one.symbols_count, 3);
    let two = storage
        .get_code_file(&project_id, "src/two.rs")
        .await
        .expect("file")
        .expect("exists");
    assert_eq!(two.symbols_count, 2);
}

#[tokio::test]
async fn name_paths_stay_unique_per_project() {
    let storage = storage().await;
    let indexer = indexer(&storage);
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.rs", "fn run() {}\n");
    write(dir.path(), "b.rs", "fn run() {}\n");

    let token = CancellationToken::new();
    let report = indexer
        .index_project(dir.path(), "dupes", &token)
        .await
        .expect("index");

    // Same bare name in two files: both persist, paths scoped by file
    assert_eq!(report.files_indexed, 2);
    assert_eq!(
        storage
            .count_project_symbols(&report.project_id)
            .await
            .expect("count"),
        2
    );
}

#[tokio::test]
async fn cancellation_drops_queued_work() {
    let storage = storage().await;
    let indexer = indexer(&storage);
    let dir = tempfile::tempdir().expect("tempdir");
    for i in 0..20 {
        write(dir.path(), &format!("f{i}.rs"), "fn x() {}\n");
    }

    let token = CancellationToken::new();
    token.cancel();
    let report = indexer
        .index_project(dir.path(), "cancelled", &token)
        .await
        .expect("index");
    assert_eq!(report.status, IndexingStatus::Cancelled);
    assert!(report.files_indexed < 20);
}

#[tokio::test]
async fn oversized_symbols_produce_chunks() {
    let storage = storage().await;
    let embedder = Arc::new(HashEmbedder::new(DIMENSION, 900));
    let config = IndexingConfig {
        symbol_chunk_size: 120,
        symbol_chunk_overlap: 20,
        ..IndexingConfig::default()
    };
    let indexer = Arc::new(Indexer::new(storage.clone(), embedder, config));

    let dir = tempfile::tempdir().expect("tempdir");
    let body = "    let x = 1 + 1;\n".repeat(20);
    write(dir.path(), "big.rs", &format!("fn big() {{\n{body}}}\n"));

    let token = CancellationToken::new();
    let report = indexer
        .index_project(dir.path(), "chunky", &token)
        .await
        .expect("index");
    assert_eq!(report.status, IndexingStatus::Completed);

    let rows = storage
        .raw_query(
            "SELECT chunk_index, chunk_count FROM code_chunks WHERE project_id = $p ORDER BY chunk_index",
            vec![("p".to_string(), serde_json::json!(report.project_id))],
        )
        .await
        .expect("chunks");
    assert!(rows.len() > 1, "expected multiple chunks, got {}", rows.len());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["chunk_index"], serde_json::json!(i));
        assert_eq!(row["chunk_count"], serde_json::json!(rows.len()));
    }
}

#[tokio::test]
async fn reconciliation_converges_to_empty() {
    let storage = storage().await;
    let indexer = indexer(&storage);
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "keep.rs", "fn keep() {}\n");
    write(dir.path(), "gone.rs", "fn gone() {}\n");

    let token = CancellationToken::new();
    let report = indexer
        .index_project(dir.path(), "recon", &token)
        .await
        .expect("index");
    let project_id = report.project_id.clone();
    let root = dir.path().canonicalize().expect("canon");
    assert_eq!(project_id, derive_project_id(&root));

    // Mutate the tree behind the index's back
    std::fs::remove_file(dir.path().join("gone.rs")).expect("rm");
    write(dir.path(), "keep.rs", "fn keep() {}\nfn more() {}\n");
    write(dir.path(), "fresh.rs", "fn fresh() {}\n");

    let scanner = indexer.scanner();
    let outdated = scan_outdated_files(&storage, &scanner, &project_id, &root)
        .await
        .expect("scan");
    assert_eq!(outdated.new_files, vec!["fresh.rs"]);
    assert_eq!(outdated.modified, vec!["keep.rs"]);
    assert_eq!(outdated.deleted, vec!["gone.rs"]);

    let processed = process_outdated_files(&indexer, &project_id, &outdated, &token)
        .await
        .expect("process");
    assert_eq!(processed, 3);

    // A second scan finds nothing left to reconcile
    let outdated = scan_outdated_files(&storage, &scanner, &project_id, &root)
        .await
        .expect("rescan");
    assert!(outdated.is_empty());
    assert!(
        storage
            .get_code_file(&project_id, "gone.rs")
            .await
            .expect("row")
            .is_none()
    );
}
