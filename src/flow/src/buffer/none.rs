//! The absent buffer: a single transaction chain from input to output.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::buffer::Buffer;
use crate::component::ComponentError;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle};
use crate::transaction::Transaction;

pub struct NoneBuffer {
    handle: ShutdownHandle,
    started: bool,
}

impl NoneBuffer {
    pub fn new() -> Self {
        let (handle, listener) = shutdown_pair();
        // Nothing to drain: passthrough is done the moment it exists.
        listener.mark_done();
        Self {
            handle,
            started: false,
        }
    }
}

impl Default for NoneBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Buffer for NoneBuffer {
    fn start(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<mpsc::Receiver<Transaction>, ComponentError> {
        if self.started {
            return Err(ComponentError::AlreadyConsumed("buffer"));
        }
        self.started = true;
        Ok(transactions)
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
