//! Shared test utilities for Engram integration tests
//!
//! Provides a persistent Tokio runtime and an atomic counter shared across
//! integration tests, preventing race conditions and name collisions when
//! tests run in parallel across crates.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

static TEST_RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
static NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Get the shared test runtime (creates on first call, reuses thereafter)
///
/// Spawned tasks that outlive their originating test keep a valid runtime
/// context instead of hitting "context is being shutdown" errors.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
#[allow(clippy::expect_used)] // Test infrastructure - panic on init failure is acceptable
pub fn get_test_runtime() -> &'static tokio::runtime::Runtime {
    TEST_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build shared test runtime")
    })
}

/// Unique suffix for test-scoped names (databases, projects, directories)
pub fn next_name_counter() -> usize {
    NAME_COUNTER.fetch_add(1, Ordering::SeqCst)
}
