//! The buffer boundary: decouples producer and consumer rates and moves
//! the ack model from synchronous to persisted-at-buffer.

pub mod memory;
pub mod none;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::component::ComponentError;
use crate::shutdown::ShutdownError;
use crate::transaction::Transaction;

pub use memory::MemoryBuffer;
pub use none::NoneBuffer;

/// A buffer is a writer/reader endpoint pair behind one `start` call:
/// the upstream stream feeds the writer, the returned stream is the
/// reader. On write commit the upstream transaction is acked; the
/// reader emits new transactions whose acks govern record deletion.
#[async_trait]
pub trait Buffer: Send {
    fn start(
        &mut self,
        transactions: mpsc::Receiver<Transaction>,
    ) -> Result<mpsc::Receiver<Transaction>, ComponentError>;

    fn close_async(&self);

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError>;
}
