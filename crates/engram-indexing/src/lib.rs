//! Engram code-indexing pipeline
//!
//! Scan -> parse -> extract -> embed -> persist with bounded worker pools,
//! an async job queue, and a single-active-project filesystem watcher with
//! debounce and reconciliation.

pub mod error;
pub mod indexer;
pub mod jobs;
pub mod manager;
pub mod outdated;
pub mod progress;
pub mod scanner;
pub mod watcher;

pub use error::{IndexingError, IndexingResult};
pub use indexer::{IndexReport, Indexer};
pub use jobs::{JobManager, JobView};
pub use manager::{WatchStatus, WatcherManager};
pub use outdated::{OutdatedFiles, process_outdated_files, scan_outdated_files};
pub use progress::{ProgressMap, ProjectProgress};
pub use scanner::{FileScanner, ScanResult, ScannedFile};
pub use watcher::CodeWatcher;
