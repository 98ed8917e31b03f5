// Cooperative Stop Token
//
// Cancellation is checked at item boundaries only: in-flight external calls
// cannot be aborted without leaving inconsistent remote state. A fresh
// channel is created per run, so the token is never tied to the lifetime of
// any caller-side component.

use tokio::sync::watch;

/// Stop signal polled by the engine between work units
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Check if a stop was requested
    pub fn is_stop_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the stop signal (used to cut inter-item delays short)
    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Operator-side handle that requests the running job to stop
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request the run to stop after the current item
    pub fn request_stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a stop channel for one run
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}
