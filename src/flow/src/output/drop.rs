//! Swallows every message and acks. A development aid.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::component::ComponentError;
use crate::output::Output;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::Transaction;

pub struct DropOutput {
    consumed: bool,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl DropOutput {
    pub fn new() -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            consumed: false,
            handle,
            listener: Some(listener),
        }
    }
}

impl Default for DropOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Output for DropOutput {
    fn consume(
        &mut self,
        mut transactions: mpsc::Receiver<Transaction>,
    ) -> Result<(), ComponentError> {
        if self.consumed {
            return Err(ComponentError::AlreadyConsumed("output"));
        }
        self.consumed = true;
        let mut listener = self.listener.take().expect("listener present before consume");
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = listener.closed() => break,
                    next = transactions.recv() => match next {
                        Some(transaction) => {
                            telemetry::MESSAGES_SENT_COUNTER
                                .with_label_values(&["drop"])
                                .inc();
                            transaction.ack();
                        }
                        None => break,
                    },
                }
            }
            listener.mark_done();
        });
        Ok(())
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
