//! Bounded in-memory buffer.
//!
//! The writer acks each upstream transaction the moment its message is
//! enqueued; capacity is a byte budget enforced with a semaphore, so a
//! full buffer exerts backpressure by not accepting further writes.
//! The reader emits a fresh transaction per record and redelivers, with
//! backoff, until the record is acked downstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datatypes::Message;
use serde::Deserialize;
use tokio::sync::{mpsc, Semaphore};

use crate::buffer::Buffer;
use crate::component::{ComponentConfig, ComponentError};
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryBufferConfig {
    /// Byte budget across queued messages.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    // 512 MiB, matching a generous single-process deployment.
    512 * 1024 * 1024
}

impl Default for MemoryBufferConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

pub struct MemoryBuffer {
    config: MemoryBufferConfig,
    started: bool,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl MemoryBuffer {
    pub fn new(config: MemoryBufferConfig) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            config,
            started: false,
            handle,
            listener: Some(listener),
        }
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        Ok(Self::new(conf.parse_options("buffer")?))
    }
}

fn message_size(message: &Message) -> usize {
    message
        .iter()
        .map(|part| part.as_bytes().len())
        .sum::<usize>()
        .max(1)
}

async fn writer_loop(
    mut transactions: mpsc::Receiver<Transaction>,
    queue: mpsc::UnboundedSender<(Message, u32)>,
    budget: Arc<Semaphore>,
    limit: usize,
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
        let (message, reply) = transaction.into_parts();
        let size = message_size(&message)
            .min(limit)
            .min(u32::MAX as usize)
            .max(1) as u32;

        // Backpressure point: no permits, no recv of further writes.
        let Ok(permit) = budget.clone().acquire_many_owned(size).await else {
            reply.send(Response::NoAck);
            break;
        };
        permit.forget();
        telemetry::BUFFER_BACKLOG_GAUGE.add(size as i64);

        if queue.send((message, size)).is_err() {
            telemetry::BUFFER_BACKLOG_GAUGE.sub(size as i64);
            reply.send(Response::NoAck);
            break;
        }
        // The record is owned by the buffer now: commit to upstream.
        reply.ack();
    }
}

async fn reader_loop(
    mut queue: mpsc::UnboundedReceiver<(Message, u32)>,
    downstream: mpsc::Sender<Transaction>,
    budget: Arc<Semaphore>,
    listener: ShutdownListener,
) {
    while let Some((message, size)) = queue.recv().await {
        let mut backoff = RETRY_BACKOFF;
        loop {
            let (transaction, response) = Transaction::new(message.clone());
            if downstream.send(transaction).await.is_err() {
                // Consumer gone mid-shutdown; the record is dropped with
                // the buffer, which is the memory buffer's contract.
                tracing::warn!("memory buffer consumer closed with records in flight");
                break;
            }
            match response.wait().await {
                Response::Ack => break,
                response => {
                    tracing::debug!(?response, "buffered record not acked; redelivering");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
            }
        }
        telemetry::BUFFER_BACKLOG_GAUGE.sub(size as i64);
        budget.add_permits(size as usize);
    }
    listener.mark_done();
}

#[async_trait]
impl Buffer for MemoryBuffer {
    fn start(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<mpsc::Receiver<Transaction>, ComponentError> {
        if self.started {
            return Err(ComponentError::AlreadyConsumed("buffer"));
        }
        self.started = true;

        let limit = self.config.limit.max(1);
        let budget = Arc::new(Semaphore::new(limit));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (downstream_tx, downstream_rx) = mpsc::channel(1);
        let listener = self.listener.take().expect("listener present before start");

        tokio::spawn(writer_loop(
            transactions,
            queue_tx,
            budget.clone(),
            limit,
            listener.clone(),
        ));
        tokio::spawn(reader_loop(queue_rx, downstream_tx, budget, listener));

        Ok(downstream_rx)
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
