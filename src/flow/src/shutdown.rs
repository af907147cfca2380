//! Two-phase shutdown signalling shared by adapters, pipelines and streams.
//!
//! Shutdown is a broadcast close signal plus a completion latch, rather
//! than a cancellation token threaded through every call. A component
//! task holds the [`ShutdownListener`]; its supervisor keeps the
//! [`ShutdownHandle`] and sequences `close_async` / `wait_for_close`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("component failed to close within {0:?}")]
    Timeout(Duration),
}

/// Supervisor half: request close, await completion.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    close_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

/// Component half: observe close requests, latch completion.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    close_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

/// Create a linked handle/listener pair.
pub fn shutdown_pair() -> (ShutdownHandle, ShutdownListener) {
    let (close_tx, close_rx) = watch::channel(false);
    let (done_tx, done_rx) = watch::channel(false);
    (
        ShutdownHandle { close_tx, done_rx },
        ShutdownListener { close_rx, done_tx },
    )
}

impl ShutdownHandle {
    /// Signal the component to stop producing new work. Idempotent.
    pub fn close_async(&self) {
        let _ = self.close_tx.send(true);
    }

    /// Wait until the component latches completion or the deadline passes.
    ///
    /// Returns immediately once the component is done, including when
    /// its task exited without latching (the listener was dropped).
    pub async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        let mut done = self.done_rx.clone();
        let result = match timeout(deadline, done.wait_for(|d| *d)).await {
            Ok(Ok(_)) => Ok(()),
            // Listener dropped: the task is gone either way.
            Ok(Err(_)) => Ok(()),
            Err(_) => Err(ShutdownError::Timeout(deadline)),
        };
        result
    }

    /// True once the component has latched completion.
    pub fn is_done(&self) -> bool {
        *self.done_rx.borrow()
    }
}

impl ShutdownListener {
    /// Resolve when `close_async` has been called on the handle.
    pub async fn closed(&mut self) {
        // An error means every handle was dropped; treat as close.
        let _ = self.close_rx.wait_for(|c| *c).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.close_rx.borrow()
    }

    /// Latch completion so `wait_for_close` resolves.
    pub fn mark_done(&self) {
        let _ = self.done_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_and_wait_resolves() {
        let (handle, mut listener) = shutdown_pair();
        handle.close_async();
        handle.close_async();

        listener.closed().await;
        listener.mark_done();

        handle
            .wait_for_close(Duration::from_millis(100))
            .await
            .expect("close within deadline");
        // A second wait after completion returns immediately.
        handle
            .wait_for_close(Duration::from_millis(1))
            .await
            .expect("wait after close is immediate");
    }

    #[tokio::test]
    async fn wait_times_out_when_component_never_finishes() {
        let (handle, _listener) = shutdown_pair();
        handle.close_async();
        let err = handle
            .wait_for_close(Duration::from_millis(20))
            .await
            .expect_err("must time out");
        assert_eq!(err, ShutdownError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn dropped_listener_counts_as_done() {
        let (handle, listener) = shutdown_pair();
        drop(listener);
        handle
            .wait_for_close(Duration::from_millis(20))
            .await
            .expect("dropped listener resolves wait");
    }
}
