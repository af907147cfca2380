//! Input adapters: bind an external source to the transaction protocol.

pub mod generate;
pub mod http_server;
pub mod inproc;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::shutdown::ShutdownError;
use crate::transaction::Transaction;

pub use generate::GenerateInput;
pub use http_server::HttpServerInput;
pub use inproc::InprocInput;

/// Capacity of the transaction channel between an input and its consumer.
pub(crate) const INPUT_CHANNEL_CAPACITY: usize = 64;

/// A running input adapter.
///
/// The transaction stream is claimable exactly once. After
/// `close_async` the adapter stops producing new transactions but keeps
/// accepting responses for outstanding ones until `wait_for_close`
/// resolves.
#[async_trait]
pub trait Input: Send {
    /// Claim the transaction stream. `None` when already claimed.
    fn take_transactions(&mut self) -> Option<mpsc::Receiver<Transaction>>;

    /// Stop producing new transactions. Idempotent.
    fn close_async(&self);

    /// Wait for outstanding transactions to resolve, bounded by `deadline`.
    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError>;
}
