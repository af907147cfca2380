//! Fans a multi-part message out into one message per part.

use datatypes::Message;

use crate::processor::{Processor, ProcessorOutput};

#[derive(Debug, Default)]
pub struct SplitProcessor;

impl SplitProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Processor for SplitProcessor {
    fn kind(&self) -> &'static str {
        "split"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        let store = message.result_store().cloned();
        let messages = message
            .into_parts()
            .into_iter()
            .map(|part| {
                let msg = Message::from_part(part);
                match &store {
                    Some(store) => msg.with_result_store(store.clone()),
                    None => msg,
                }
            })
            .collect();
        ProcessorOutput::messages(messages)
    }
}
