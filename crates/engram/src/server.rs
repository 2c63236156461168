//! Unified server orchestration for engram
//!
//! Handles transport selection (stdio, SSE/Axum), async signal handling,
//! and launches the correct server loop with graceful shutdown.

// Internal imports (std, crate)
use crate::handlers::McpServer;
use crate::signal::{SignalEvent, SignalEventArc, spawn_signal_listener};
use crate::state::AppState;
use crate::transport::Transport;

// External imports (alphabetized)
use agenterra_rmcp::ServiceExt;
use agenterra_rmcp::transport::sse_server::{SseServer, SseServerConfig};
use agenterra_rmcp::transport::stdio;
use engram_config::ApplicationConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Transport options resolved from the command line
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub transport: Transport,
    pub sse_addr: SocketAddr,
    pub sse_keep_alive: Duration,
}

/// Runs the unified server orchestrator
///
/// Builds the application state, spawns the server for the selected
/// transport plus the signal listener, and tears state down in reverse
/// order when either finishes.
///
/// # Errors
///
/// Returns startup errors (database unreachable, migration failure) and
/// fatal transport errors.
pub async fn start(
    config: ApplicationConfig,
    options: ServerOptions,
    file_guard: impl Send + Sync + 'static,
    stderr_guard: impl Send + Sync + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::build(config).await?;

    let notify = Arc::new(Notify::new());
    let event: SignalEventArc = Arc::new(Mutex::new(None));
    spawn_signal_listener(Arc::clone(&notify), Arc::clone(&event)).await;

    let server_state = state.clone();
    let server_task = tokio::spawn(async move {
        let result = match options.transport {
            Transport::Stdio => run_stdio_server(server_state).await,
            Transport::Sse => run_sse_server(server_state, &options).await,
        };
        if let Err(e) = result {
            info!(target = "server", "server exited with error: {e:?}");
        }
    });

    let signal_task = tokio::spawn(wait_for_shutdown(notify, event));

    tokio::select! {
        result = server_task => {
            info!(target = "server", "server task ended: {result:?}");
        }
        result = signal_task => {
            info!(target = "server", "signal handler task ended: {result:?}");
        }
    }

    // Singletons come down in reverse initialisation order
    state.shutdown().await;

    // Guards must remain alive for the duration of main
    let _ = (file_guard, stderr_guard);
    Ok(())
}

/// Runs the stdio (CLI/Inspector) server loop
async fn run_stdio_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let service = McpServer::new(state).serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Runs the SSE/Axum (web) server loop
async fn run_sse_server(
    state: AppState,
    options: &ServerOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let sse_config = SseServerConfig {
        bind: options.sse_addr,
        sse_path: "/sse".to_string(),
        post_path: "/message".to_string(),
        ct: CancellationToken::new(),
        sse_keep_alive: Some(options.sse_keep_alive),
    };
    let (sse_server, router) = SseServer::new(sse_config);
    let _ct = sse_server.with_service(move || McpServer::new(state.clone()));

    info!("SSE server listening on {}", options.sse_addr);
    let listener = tokio::net::TcpListener::bind(options.sse_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

async fn wait_for_shutdown(notify: Arc<Notify>, event: SignalEventArc) {
    loop {
        notify.notified().await;
        let mut guard = event.lock().await;
        if matches!(*guard, Some(SignalEvent::Shutdown)) {
            info!(target = "signal", "shutdown signal received");
            return;
        }
        *guard = None;
    }
}
