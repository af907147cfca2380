//! In-process input: consumes transactions from a named pipe on the
//! shared resource registry, chaining streams inside one process.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::component::{ComponentConfig, ComponentError};
use crate::input::Input;
use crate::resources::Resources;
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Deserialize)]
pub struct InprocConfig {
    pub name: String,
}

pub struct InprocInput {
    name: String,
    resources: Weak<dyn Resources>,
    receiver: Option<mpsc::Receiver<Transaction>>,
    handle: ShutdownHandle,
}

impl InprocInput {
    pub fn new(
        config: InprocConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let receiver = resources
            .inproc_pipes()
            .take_receiver(&config.name)
            .ok_or_else(|| {
                ComponentError::BadConfig(
                    "input",
                    format!("inproc pipe '{}' already consumed", config.name),
                )
            })?;
        let (handle, listener) = shutdown_pair();
        // The pipe lives on the registry; there is nothing to drain
        // beyond the channel itself.
        listener.mark_done();
        Ok(Self {
            name: config.name,
            resources: Arc::downgrade(resources),
            receiver: Some(receiver),
            handle,
        })
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        Self::new(conf.parse_options("input")?, resources)
    }
}

#[async_trait]
impl Input for InprocInput {
    fn take_transactions(&mut self) -> Option<mpsc::Receiver<Transaction>> {
        self.receiver.take()
    }

    fn close_async(&self) {
        // Tear the pipe out of the registry so producers observe the
        // closure and the consumer side drains to completion.
        if let Some(resources) = self.resources.upgrade() {
            resources.inproc_pipes().remove(&self.name);
        }
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
