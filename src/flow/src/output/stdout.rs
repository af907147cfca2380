//! Writes part payloads to stdout, newline-delimited, acking after the
//! write flushes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::component::{ComponentConfig, ComponentError};
use crate::output::Output;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{ErrorKind, Response, Transaction};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StdoutConfig {
    /// Printed between parts of a multi-part message; messages always
    /// end with a newline.
    #[serde(default)]
    pub delimiter: String,
}

pub struct StdoutOutput {
    config: StdoutConfig,
    consumed: bool,
    handle: ShutdownHandle,
    listener: Option<ShutdownListener>,
}

impl StdoutOutput {
    pub fn new(config: StdoutConfig) -> Self {
        let (handle, listener) = shutdown_pair();
        Self {
            config,
            consumed: false,
            handle,
            listener: Some(listener),
        }
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        Ok(Self::new(conf.parse_options("output")?))
    }
}

async fn run(
    config: StdoutConfig,
    mut transactions: mpsc::Receiver<Transaction>,
    mut listener: ShutdownListener,
) {
    let mut stdout = tokio::io::stdout();
    loop {
        let transaction = tokio::select! {
            _ = listener.closed() => break,
            next = transactions.recv() => match next {
                Some(t) => t,
                None => break,
            },
        };
        let (message, reply) = transaction.into_parts();

        let mut buf = Vec::new();
        for (i, part) in message.iter().enumerate() {
            if i > 0 {
                buf.extend_from_slice(config.delimiter.as_bytes());
            }
            buf.extend_from_slice(part.as_bytes());
        }
        buf.push(b'\n');

        let write_result = async {
            stdout.write_all(&buf).await?;
            stdout.flush().await
        }
        .await;
        match write_result {
            Ok(()) => {
                telemetry::MESSAGES_SENT_COUNTER
                    .with_label_values(&["stdout"])
                    .inc();
                reply.ack();
            }
            Err(err) => reply.send(Response::Error(ErrorKind::Connection, err.to_string())),
        }
    }
    listener.mark_done();
}

#[async_trait]
impl Output for StdoutOutput {
    fn consume(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<(), ComponentError> {
        if self.consumed {
            return Err(ComponentError::AlreadyConsumed("output"));
        }
        self.consumed = true;
        let listener = self.listener.take().expect("listener present before consume");
        tokio::spawn(run(self.config.clone(), transactions, listener));
        Ok(())
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
