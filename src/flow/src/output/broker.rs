//! Fans transactions out across child outputs.
//!
//! `fan_out` duplicates each message to every child and aggregates the
//! responses with the all-must-ack monoid; `round_robin` forwards each
//! transaction, ack chain intact, to one child in turn.

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

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrokerPattern {
    #[default]
    FanOut,
    RoundRobin,
}

#[derive(Debug, Deserialize)]
struct BrokerOptions {
    #[serde(default)]
    pattern: BrokerPattern,
    outputs: Vec<ComponentConfig>,
    #[serde(default = "default_max_in_flight")]
    max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    16
}

pub struct BrokerOutput {
    pattern: BrokerPattern,
    children: Vec<Box<dyn Output>>,
    max_in_flight: usize,
    consumed: bool,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl BrokerOutput {
    pub fn new(pattern: BrokerPattern, children: Vec<Box<dyn Output>>, max_in_flight: usize) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            pattern,
            children,
            max_in_flight: max_in_flight.max(1),
            consumed: false,
            handle,
            listener: Some(listener),
        }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: BrokerOptions = conf.parse_options("output")?;
        if opts.outputs.is_empty() {
            return Err(ComponentError::BadConfig(
                "output",
                "broker requires at least one child output".to_string(),
            ));
        }
        let children = opts
            .outputs
            .iter()
            .map(|c| registry::new_output(c, resources))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(opts.pattern, children, opts.max_in_flight))
    }
}

async fn run_fan_out(
    child_txs: Vec<mpsc::Sender<Transaction>>,
    mut transactions: mpsc::Receiver<Transaction>,
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
            .expect("broker semaphore never closed");
        let child_txs = child_txs.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let (message, reply) = transaction.into_parts();

            let mut futures = Vec::with_capacity(child_txs.len());
            for child in &child_txs {
                let (child_transaction, response) = Transaction::new(message.clone());
                if child.send(child_transaction).await.is_err() {
                    reply.send(Response::NoAck);
                    return;
                }
                futures.push(response);
            }

            let mut aggregated = Response::Ack;
            for future in futures {
                let response = future.wait().await;
                if !response.is_ack() {
                    tracing::debug!(?response, "broker child returned non-ack");
                }
                aggregated = aggregated.combine(response);
            }
            reply.send(aggregated);
        });
    }
    listener.mark_done();
}

async fn run_round_robin(
    child_txs: Vec<mpsc::Sender<Transaction>>,
    mut transactions: mpsc::Receiver<Transaction>,
    mut listener: ShutdownListener,
) {
    let mut next_child = 0usize;
    loop {
        let transaction = tokio::select! {
            _ = listener.closed() => break,
            next = transactions.recv() => match next {
                Some(t) => t,
                None => break,
            },
        };
        let child = &child_txs[next_child % child_txs.len()];
        next_child = next_child.wrapping_add(1);
        if let Err(mpsc::error::SendError(transaction)) = child.send(transaction).await {
            transaction.respond(Response::NoAck);
        }
    }
    listener.mark_done();
}

#[async_trait]
impl Output for BrokerOutput {
    fn consume(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<(), ComponentError> {
        if self.consumed {
            return Err(ComponentError::AlreadyConsumed("output"));
        }
        self.consumed = true;

        let mut child_txs = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            let (tx, rx) = mpsc::channel(self.max_in_flight);
            child.consume(rx)?;
            child_txs.push(tx);
        }
        let listener = self.listener.take().expect("listener present before consume");
        match self.pattern {
            BrokerPattern::FanOut => {
                tokio::spawn(run_fan_out(
                    child_txs,
                    transactions,
                    self.max_in_flight,
                    listener,
                ));
            }
            BrokerPattern::RoundRobin => {
                tokio::spawn(run_round_robin(child_txs, transactions, listener));
            }
        }
        Ok(())
    }

    fn close_async(&self) {
        self.handle.close_async();
        for child in &self.children {
            child.close_async();
        }
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await?;
        for child in &self.children {
            child.wait_for_close(deadline).await?;
        }
        Ok(())
    }
}
