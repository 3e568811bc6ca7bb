//! Cooperative shutdown shared by the server and the background loops.

use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

/// Waits for Ctrl-C, then tells every receiver to stop.
pub async fn trigger_on_ctrl_c(sender: ShutdownSender) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown signal received, stopping after the current cycle");
    let _ = sender.send(true);
}

/// Resolves once shutdown was requested or the sender is gone.
pub async fn requested(receiver: &mut ShutdownReceiver) {
    while !*receiver.borrow_and_update() {
        if receiver.changed().await.is_err() {
            return;
        }
    }
}

/// Sleeps for `duration`; returns `false` when shutdown interrupted the sleep.
pub async fn sleep_or_shutdown(duration: Duration, receiver: &mut ShutdownReceiver) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = requested(receiver) => false,
    }
}
