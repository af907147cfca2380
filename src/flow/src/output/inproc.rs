//! In-process output: forwards transactions to a named pipe on the
//! shared resource registry. The ack chain passes through untouched, so
//! the consuming stream's commit is this stream's commit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::component::{ComponentConfig, ComponentError};
use crate::output::Output;
use crate::resources::Resources;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

#[derive(Debug, Clone, Deserialize)]
pub struct InprocOutputConfig {
    pub name: String,
}

pub struct InprocOutput {
    pipe: mpsc::Sender<Transaction>,
    consumed: bool,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl InprocOutput {
    pub fn new(config: InprocOutputConfig, resources: &Arc<dyn Resources>) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            pipe: resources.inproc_pipes().sender(&config.name),
            consumed: false,
            handle,
            listener: Some(listener),
        }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        Ok(Self::new(conf.parse_options("output")?, resources))
    }
}

async fn run(
    pipe: mpsc::Sender<Transaction>,
    mut transactions: mpsc::Receiver<Transaction>,
    mut listener: ShutdownListener,
) {
    loop {
        let transaction = tokio::select! {
            _ = listener.closed() => break,
            next = transactions.recv() => match next {
                Some(t) => t,
                None => break,
            },
        };
        match pipe.send(transaction).await {
            Ok(()) => {
                telemetry::MESSAGES_SENT_COUNTER
                    .with_label_values(&["inproc"])
                    .inc();
            }
            // No consumer on the pipe; the origin should redeliver.
            Err(mpsc::error::SendError(transaction)) => {
                transaction.respond(Response::NoAck);
            }
        }
    }
    listener.mark_done();
}

#[async_trait]
impl Output for InprocOutput {
    fn consume(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<(), ComponentError> {
        if self.consumed {
            return Err(ComponentError::AlreadyConsumed("output"));
        }
        self.consumed = true;
        let listener = self.listener.take().expect("listener present before consume");
        tokio::spawn(run(self.pipe.clone(), transactions, listener));
        Ok(())
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
