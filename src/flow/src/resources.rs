//! Shared resource contracts and the in-process transaction pipes.
//!
//! Concrete caches and rate limiters live in the manager crate; the
//! flow crate only sees these trait objects so adapters and processors
//! stay decoupled from their construction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::condition::Condition;
use crate::transaction::Transaction;

/// Concurrency-safe key/value cache.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Bytes>;
    async fn set(&self, key: &str, value: Bytes);
    /// Returns true when the key was present.
    async fn delete(&self, key: &str) -> bool;
}

/// Concurrency-safe rate limiter.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Zero means proceed now; a positive duration is the wait the
    /// caller must honour before proceeding.
    async fn access(&self) -> Duration;
}

/// Process-wide registry of shared named resources.
pub trait Resources: Send + Sync {
    fn cache(&self, name: &str) -> Option<Arc<dyn Cache>>;
    fn rate_limit(&self, name: &str) -> Option<Arc<dyn RateLimit>>;
    fn condition(&self, name: &str) -> Option<Arc<dyn Condition>>;
    fn inproc_pipes(&self) -> &InprocPipes;
}

const INPROC_PIPE_CAPACITY: usize = 64;

struct PipeEntry {
    sender: mpsc::Sender<Transaction>,
    receiver: Option<mpsc::Receiver<Transaction>>,
}

/// Named in-process transaction pipes connecting an `inproc` output of
/// one stream to the `inproc` input of another.
///
/// Either side may arrive first; the pipe is created on first touch.
/// The receiving half is claimable exactly once.
#[derive(Default)]
pub struct InprocPipes {
    pipes: RwLock<HashMap<String, PipeEntry>>,
}

impl InprocPipes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender half for the named pipe, creating the pipe if needed.
    pub fn sender(&self, name: &str) -> mpsc::Sender<Transaction> {
        let mut pipes = self.pipes.write().expect("inproc pipes poisoned");
        pipes
            .entry(name.to_string())
            .or_insert_with(new_pipe_entry)
            .sender
            .clone()
    }

    /// Claim the receiver half for the named pipe. `None` when already
    /// claimed by another input.
    pub fn take_receiver(&self, name: &str) -> Option<mpsc::Receiver<Transaction>> {
        let mut pipes = self.pipes.write().expect("inproc pipes poisoned");
        pipes
            .entry(name.to_string())
            .or_insert_with(new_pipe_entry)
            .receiver
            .take()
    }

    /// Drop a pipe entirely, releasing both halves.
    pub fn remove(&self, name: &str) {
        self.pipes
            .write()
            .expect("inproc pipes poisoned")
            .remove(name);
    }
}

fn new_pipe_entry() -> PipeEntry {
    let (sender, receiver) = mpsc::channel(INPROC_PIPE_CAPACITY);
    PipeEntry {
        sender,
        receiver: Some(receiver),
    }
}

/// Empty resource registry for tests and standalone pipelines.
#[derive(Default)]
pub struct NoopResources {
    pipes: InprocPipes,
}

impl NoopResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn Resources> {
        Arc::new(Self::new())
    }
}

impl Resources for NoopResources {
    fn cache(&self, _name: &str) -> Option<Arc<dyn Cache>> {
        None
    }

    fn rate_limit(&self, _name: &str) -> Option<Arc<dyn RateLimit>> {
        None
    }

    fn condition(&self, _name: &str) -> Option<Arc<dyn Condition>> {
        None
    }

    fn inproc_pipes(&self) -> &InprocPipes {
        &self.pipes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inproc_receiver_is_claimable_once() {
        let pipes = InprocPipes::new();
        let _sender = pipes.sender("pipe_a");
        assert!(pipes.take_receiver("pipe_a").is_some());
        assert!(
            pipes.take_receiver("pipe_a").is_none(),
            "second claim must fail"
        );
    }
}
