//! Process-wide application state
//!
//! The storage engine, the embedder, the job manager and the watcher
//! manager are process singletons initialised at startup and torn down in
//! reverse order on shutdown.

use engram_config::ApplicationConfig;
use engram_embeddings::{TextEmbedder, build_embedder};
use engram_indexing::{Indexer, JobManager, WatcherManager};
use engram_search::SearchService;
use engram_storage::Storage;
use std::sync::Arc;

/// Shared handle to every long-lived subsystem
#[derive(Clone)]
pub struct AppState {
    pub config: ApplicationConfig,
    pub storage: Storage,
    pub embedder: Arc<dyn TextEmbedder>,
    pub indexer: Arc<Indexer>,
    pub jobs: Arc<JobManager>,
    pub watchers: Arc<WatcherManager>,
    pub search: Arc<SearchService>,
}

impl AppState {
    /// Bring every subsystem up, in dependency order
    ///
    /// # Errors
    ///
    /// Fatal startup errors: unreachable database, failed migration, or an
    /// unconstructable embedding provider.
    pub async fn build(config: ApplicationConfig) -> anyhow::Result<Self> {
        let storage = Storage::connect(&config.storage, config.embedding.dimension).await?;
        storage.initialize_schema().await?;

        let embedder = build_embedder(&config.embedding)?;

        let indexer = Arc::new(Indexer::new(
            storage.clone(),
            Arc::clone(&embedder),
            config.indexing.clone(),
        ));
        let jobs = JobManager::new(Arc::clone(&indexer), storage.clone(), &config.jobs);
        let watchers = Arc::new(WatcherManager::new(
            storage.clone(),
            Arc::clone(&indexer),
            config.watcher.clone(),
        ));
        let search = Arc::new(SearchService::new(storage.clone(), Arc::clone(&embedder)));

        // Resume watching whichever project had its flag set last run
        watchers.auto_activate_on_boot().await;

        // Completed jobs age out of memory periodically
        let retention = std::time::Duration::from_secs(config.jobs.retention_secs);
        let cleanup_jobs = Arc::clone(&jobs);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                tick.tick().await;
                cleanup_jobs.cleanup_old_jobs(retention);
            }
        });

        Ok(Self {
            config,
            storage,
            embedder,
            indexer,
            jobs,
            watchers,
            search,
        })
    }

    /// Tear down in reverse initialisation order
    pub async fn shutdown(self) {
        self.watchers.shutdown().await;
        self.storage.close().await;
        tracing::info!("application state shut down");
    }

    /// State over an in-memory database and a deterministic embedder
    #[cfg(test)]
    pub(crate) async fn for_tests() -> Self {
        let mut config = ApplicationConfig::default();
        config.embedding.dimension = 32;

        let storage = Storage::connect_memory(config.embedding.dimension)
            .await
            .expect("in-memory storage");
        storage.initialize_schema().await.expect("schema");

        let embedder: Arc<dyn TextEmbedder> = Arc::new(engram_embeddings::HashEmbedder::new(
            config.embedding.dimension,
            config.embedding.max_chars,
        ));
        let indexer = Arc::new(Indexer::new(
            storage.clone(),
            Arc::clone(&embedder),
            config.indexing.clone(),
        ));
        let jobs = JobManager::new(Arc::clone(&indexer), storage.clone(), &config.jobs);
        let watchers = Arc::new(WatcherManager::new(
            storage.clone(),
            Arc::clone(&indexer),
            config.watcher.clone(),
        ));
        let search = Arc::new(SearchService::new(storage.clone(), Arc::clone(&embedder)));

        Self {
            config,
            storage,
            embedder,
            indexer,
            jobs,
            watchers,
            search,
        }
    }
}
