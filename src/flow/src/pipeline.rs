//! The pipeline engine: multiplexes transactions over worker slots,
//! runs the processor chain, and preserves ack semantics under fan-out.
//!
//! A worker that produces exactly one downstream message forwards the
//! upstream reply sink untouched, so the common case costs nothing.
//! Fan-out (N > 1) goes through a coordinator that aggregates the N
//! downstream responses into the single upstream reply; a drop (N = 0)
//! acks immediately.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{execute_all, Processor};
use crate::registry;
use crate::resources::Resources;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

/// Capacity of the transaction channel between a pipeline and its consumer.
const PIPELINE_CHANNEL_CAPACITY: usize = 64;

/// The `pipeline` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub processors: Vec<ComponentConfig>,
}

fn default_threads() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            processors: Vec::new(),
        }
    }
}

pub struct Pipeline {
    processors: Vec<Arc<dyn Processor>>,
    threads: usize,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
    started: bool,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let processors = config
            .processors
            .iter()
            .map(|p| registry::new_processor(p, resources))
            .collect::<Result<Vec<_>, _>>()?;
        let (handle, listener) = shutdown_pair();
        Ok(Self {
            processors,
            threads: config.threads.max(1),
            handle,
            listener: Some(listener),
            started: false,
        })
    }

    pub fn from_processors(processors: Vec<Arc<dyn Processor>>, threads: usize) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            processors,
            threads: threads.max(1),
            handle,
            listener: Some(listener),
            started: false,
        }
    }

    /// Start the worker slots, returning the downstream transaction
    /// stream. The pipeline drains when the upstream stream closes.
    pub fn start(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<mpsc::Receiver<Transaction>, ComponentError> {
        if self.started {
            return Err(ComponentError::AlreadyConsumed("pipeline"));
        }
        self.started = true;

        let (downstream_tx, downstream_rx) = mpsc::channel(PIPELINE_CHANNEL_CAPACITY);
        let shared_rx = Arc::new(Mutex::new(transactions));
        let listener = self.listener.take().expect("listener present before start");

        let mut workers = Vec::with_capacity(self.threads);
        for _ in 0..self.threads {
            workers.push(tokio::spawn(worker_loop(
                self.processors.clone(),
                shared_rx.clone(),
                downstream_tx.clone(),
                listener.clone(),
            )));
        }
        drop(downstream_tx);

        // Latch completion once every worker has exited so the
        // downstream channel closes exactly when the pipeline is drained.
        tokio::spawn(async move {
            for worker in workers {
                if let Err(err) = worker.await {
                    tracing::error!(error = %err, "pipeline worker panicked");
                }
            }
            listener.mark_done();
        });

        Ok(downstream_rx)
    }

    /// True while any worker slot is still running.
    pub fn is_running(&self) -> bool {
        self.started && !self.handle.is_done()
    }

    pub fn close_async(&self) {
        self.handle.close_async();
    }

    pub async fn wait_for_close(
        &self,
        deadline: std::time::Duration,
    ) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}

async fn worker_loop(
    processors: Vec<Arc<dyn Processor>>,
    shared_rx: Arc<Mutex<mpsc::Receiver<Transaction>>>,
    downstream: mpsc::Sender<Transaction>,
    mut listener: ShutdownListener,
) {
    loop {
        // Hold the receiver lock only while waiting for the next
        // transaction; processing happens outside it so slots overlap.
        let transaction = {
            let mut rx = shared_rx.lock().await;
            tokio::select! {
                _ = listener.closed() => return,
                next = rx.recv() => match next {
                    Some(t) => t,
                    None => return,
                },
            }
        };

        let (message, reply) = transaction.into_parts();
        let (mut messages, short_circuit) = execute_all(&processors, message);

        match messages.len() {
            0 => reply.send(short_circuit.unwrap_or(Response::Ack)),
            1 => {
                let forwarded =
                    Transaction::from_sink(messages.pop().expect("one message present"), reply);
                if downstream.send(forwarded).await.is_err() {
                    return;
                }
            }
            _ => {
                let mut futures = Vec::with_capacity(messages.len());
                let mut delivery_failed = false;
                for message in messages {
                    let (child, response) = Transaction::new(message);
                    if downstream.send(child).await.is_err() {
                        delivery_failed = true;
                        break;
                    }
                    futures.push(response);
                }
                if delivery_failed {
                    reply.send(Response::NoAck);
                    return;
                }
                // Aggregate off-slot so the worker keeps its FIFO order
                // without waiting on downstream commits.
                tokio::spawn(async move {
                    let mut aggregated = Response::Ack;
                    for future in futures {
                        let response = future.wait().await;
                        if !response.is_ack() {
                            tracing::debug!(?response, "fan-out branch returned non-ack");
                        }
                        aggregated = aggregated.combine(response);
                    }
                    reply.send(aggregated);
                });
            }
        }
    }
}
