//! Async signal handling for graceful shutdown

use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Events the signal listener can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
}

pub type SignalEventArc = Arc<Mutex<Option<SignalEvent>>>;

/// Spawn listeners for SIGINT/SIGTERM that record an event and notify
pub async fn spawn_signal_listener(notify: Arc<Notify>, event: SignalEventArc) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let notify_term = Arc::clone(&notify);
        let event_term = Arc::clone(&event);
        tokio::spawn(async move {
            let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
                tracing::warn!("could not install SIGTERM handler");
                return;
            };
            sigterm.recv().await;
            *event_term.lock().await = Some(SignalEvent::Shutdown);
            notify_term.notify_one();
        });
    }

    let notify_int = Arc::clone(&notify);
    let event_int = Arc::clone(&event);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("could not install SIGINT handler");
            return;
        }
        *event_int.lock().await = Some(SignalEvent::Shutdown);
        notify_int.notify_one();
    });
}
