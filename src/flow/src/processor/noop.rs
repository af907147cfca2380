//! Passes messages through untouched.

use datatypes::Message;

use crate::processor::{Processor, ProcessorOutput};

#[derive(Debug, Default)]
pub struct NoopProcessor;

impl NoopProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Processor for NoopProcessor {
    fn kind(&self) -> &'static str {
        "noop"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        ProcessorOutput::one(message)
    }
}
