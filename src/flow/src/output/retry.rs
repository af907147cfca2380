//! Wraps a child output, resubmitting on transient failure with capped
//! exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, Semaphore};

use crate::component::{ComponentConfig, ComponentError};
use crate::output::Output;
use crate::registry;
use crate::resources::Resources;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RetryOptions {
    output: ComponentConfig,
    /// Zero means retry until acked.
    #[serde(default)]
    max_retries: u32,
    #[serde(default = "default_max_in_flight")]
    max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    16
}

pub struct RetryOutput {
    child: Box<dyn Output>,
    consumed: bool,
    max_retries: u32,
    max_in_flight: usize,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl RetryOutput {
    pub fn new(child: Box<dyn Output>, max_retries: u32, max_in_flight: usize) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            child,
            consumed: false,
            max_retries,
            max_in_flight: max_in_flight.max(1),
            handle,
            listener: Some(listener),
        }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: RetryOptions = conf.parse_options("output")?;
        let child = registry::new_output(&opts.output, resources)?;
        Ok(Self::new(child, opts.max_retries, opts.max_in_flight))
    }
}

async fn run(
    child_tx: mpsc::Sender<Transaction>,
    mut transactions: mpsc::Receiver<Transaction>,
    max_retries: u32,
    max_in_flight: usize,
    mut listener: ShutdownListener,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight));
    loop {
        let transaction = tokio::select! {
            _ = listener.closed() => break,
            next = transactions.recv() => match next {
                Some(t) => t,
                None => break,
            },
        };
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .expect("retry semaphore never closed");
        let child_tx = child_tx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let (message, reply) = transaction.into_parts();
            let mut backoff = INITIAL_BACKOFF;
            let mut attempts = 0u32;
            loop {
                let (attempt, response) = Transaction::new(message.clone());
                if child_tx.send(attempt).await.is_err() {
                    reply.send(Response::NoAck);
                    return;
                }
                match response.wait().await {
                    Response::Ack => {
                        reply.ack();
                        return;
                    }
                    Response::Error(kind, detail) => {
                        reply.send(Response::Error(kind, detail));
                        return;
                    }
                    Response::NoAck => {
                        attempts += 1;
                        if max_retries > 0 && attempts > max_retries {
                            reply.send(Response::NoAck);
                            return;
                        }
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        });
    }
    listener.mark_done();
}

#[async_trait]
impl Output for RetryOutput {
    fn consume(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<(), ComponentError> {
        if self.consumed {
            return Err(ComponentError::AlreadyConsumed("output"));
        }
        self.consumed = true;
        let (child_tx, child_rx) = mpsc::channel(self.max_in_flight);
        self.child.consume(child_rx)?;
        let listener = self.listener.take().expect("listener present before consume");
        tokio::spawn(run(
            child_tx,
            transactions,
            self.max_retries,
            self.max_in_flight,
            listener,
        ));
        Ok(())
    }

    fn close_async(&self) {
        self.handle.close_async();
        self.child.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await?;
        self.child.wait_for_close(deadline).await
    }
}
