//! Output adapters: consume transactions and commit them to external
//! sinks, answering `Ack` on durable commit.

pub mod broker;
pub mod drop;
pub mod inproc;
pub mod retry;
pub mod stdout;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::component::ComponentError;
use crate::shutdown::ShutdownError;
use crate::transaction::Transaction;

pub use broker::{BrokerOutput, BrokerPattern};
pub use drop::DropOutput;
pub use inproc::InprocOutput;
pub use retry::RetryOutput;
pub use stdout::StdoutOutput;

/// A constructed output adapter.
///
/// `consume` claims the upstream transaction stream exactly once and
/// starts the adapter's delivery tasks. The adapter drains naturally
/// when the stream closes; `close_async` requests an early stop.
#[async_trait]
pub trait Output: Send + Sync {
    fn consume(&mut self, transactions: mpsc::Receiver<Transaction>)
        -> Result<(), ComponentError>;

    fn close_async(&self);

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError>;
}
