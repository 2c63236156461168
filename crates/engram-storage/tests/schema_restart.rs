//! Embedded-mode schema lifecycle across process restarts
//!
//! Opens a RocksDB-backed database in a temp directory, initialises the
//! schema, drops the connection, reopens the same directory and checks the
//! version survived and no migration re-runs.

use engram_config::StorageConfig;
use engram_storage::{Storage, TARGET_VERSION};
use std::path::PathBuf;

fn embedded_config(path: PathBuf) -> StorageConfig {
    StorageConfig {
        db_path: Some(path),
        url: None,
        ..StorageConfig::default()
    }
}

#[tokio::test]
async fn schema_version_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("engram.db");

    {
        let storage = Storage::connect(&embedded_config(db_path.clone()), 8)
            .await
            .expect("first open");
        assert_eq!(storage.schema_version().await.expect("version"), 0);
        storage.initialize_schema().await.expect("initialise");
        assert_eq!(
            storage.schema_version().await.expect("version"),
            TARGET_VERSION
        );
        storage
            .save_fact("restart", "k", serde_json::json!("v"))
            .await
            .expect("write");
        storage.close().await;
    }

    let storage = Storage::connect(&embedded_config(db_path), 8)
        .await
        .expect("reopen");
    assert_eq!(
        storage.schema_version().await.expect("version"),
        TARGET_VERSION
    );
    // Re-running is a no-op and the data is still there
    storage.initialize_schema().await.expect("re-initialise");
    assert_eq!(
        storage.get_fact("restart", "k").await.expect("read"),
        Some(serde_json::json!("v"))
    );
}
