//! Generates a fixed payload on an interval. Intended for smoke
//! streams and development pipelines.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use datatypes::Message;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::component::{ComponentConfig, ComponentError};
use crate::duration::parse_duration;
use crate::input::{Input, INPUT_CHANNEL_CAPACITY};
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
    #[serde(default)]
    pub payload: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Stop after this many messages; zero means unbounded.
    #[serde(default)]
    pub count: u64,
}

fn default_interval() -> String {
    "1s".to_string()
}

pub struct GenerateInput {
    receiver: Option<mpsc::Receiver<Transaction>>,
    handle: ShutdownHandle,
}

impl GenerateInput {
    pub fn new(config: GenerateConfig) -> Result<Self, ComponentError> {
        let interval =
            parse_duration(&config.interval).map_err(|e| ComponentError::BadConfig("input", e))?;
        let (sender, receiver) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (handle, listener) = shutdown_pair();
        tokio::spawn(run(config, interval, sender, listener));
        Ok(Self {
            receiver: Some(receiver),
            handle,
        })
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        Self::new(conf.parse_options("input")?)
    }
}

async fn run(
    config: GenerateConfig,
    interval: Duration,
    sender: mpsc::Sender<Transaction>,
    mut listener: ShutdownListener,
) {
    let payload = Bytes::from(config.payload.into_bytes());
    let mut ticker = tokio::time::interval(interval);
    let mut emitted = 0u64;

    loop {
        tokio::select! {
            _ = listener.closed() => break,
            _ = ticker.tick() => {}
        }
        if config.count > 0 && emitted >= config.count {
            break;
        }

        let message = Message::from_bytes([payload.clone()]);
        let (transaction, response) = Transaction::new(message);
        if sender.send(transaction).await.is_err() {
            break;
        }
        telemetry::MESSAGES_RECEIVED_COUNTER
            .with_label_values(&["generate"])
            .inc();
        emitted += 1;

        // A generated payload has no source to redeliver from; a
        // non-ack is only worth a log line.
        if !matches!(response.wait().await, Response::Ack) {
            tracing::warn!("generated message was not acknowledged");
        }
    }
    listener.mark_done();
}

#[async_trait]
impl Input for GenerateInput {
    fn take_transactions(&mut self) -> Option<mpsc::Receiver<Transaction>> {
        self.receiver.take()
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
