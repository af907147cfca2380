//! Error-scoped chain wrappers.
//!
//! `try` runs its chain and, when a resulting message comes back
//! flagged with the error key, emits the original message unchanged
//! instead. `catch` is the complement: its chain runs only over
//! messages already flagged, and clears the flag on success.

use std::sync::Arc;

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{clear_error, execute_all, has_error, Processor, ProcessorOutput};
use crate::registry;
use crate::resources::Resources;

#[derive(Debug, Deserialize)]
struct ChainOptions {
    #[serde(default)]
    processors: Vec<ComponentConfig>,
}

fn build_chain(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Vec<Arc<dyn Processor>>, ComponentError> {
    let opts: ChainOptions = conf.parse_options("processor")?;
    opts.processors
        .iter()
        .map(|p| registry::new_processor(p, resources))
        .collect()
}

pub struct TryProcessor {
    processors: Vec<Arc<dyn Processor>>,
}

impl TryProcessor {
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        Ok(Self::new(build_chain(conf, resources)?))
    }
}

impl Processor for TryProcessor {
    fn kind(&self) -> &'static str {
        "try"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        let original = message.clone();
        let (messages, response) = execute_all(&self.processors, message);
        if messages.is_empty() {
            return ProcessorOutput {
                messages,
                response,
            };
        }
        if messages.iter().any(has_error) {
            return ProcessorOutput::one(original);
        }
        ProcessorOutput::messages(messages)
    }
}

pub struct CatchProcessor {
    processors: Vec<Arc<dyn Processor>>,
}

impl CatchProcessor {
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        Ok(Self::new(build_chain(conf, resources)?))
    }
}

impl Processor for CatchProcessor {
    fn kind(&self) -> &'static str {
        "catch"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        if !has_error(&message) {
            return ProcessorOutput::one(message);
        }
        let (mut messages, response) = execute_all(&self.processors, message);
        for msg in &mut messages {
            if !has_error(msg) {
                continue;
            }
            // The chain handled the failure; clear the flag so
            // downstream treats the message as healthy again.
            clear_error(msg);
        }
        ProcessorOutput { messages, response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::json::{JsonOperator, JsonProcessor};
    use crate::processor::text::{TextProcessor, TextProcessorOperator};
    use crate::processor::NoopProcessor;

    #[test]
    fn try_restores_original_on_error() {
        // json select over a non-JSON payload flags the message.
        let proc = TryProcessor::new(vec![Arc::new(JsonProcessor::new(
            JsonOperator::Select,
            "missing",
            vec![],
        ))]);
        let out = proc.process(Message::from_bytes(["not json".as_bytes().to_vec()]));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"not json");
        assert!(!has_error(&out.messages[0]), "original is emitted unflagged");
    }

    #[test]
    fn try_forwards_success_untouched() {
        let proc = TryProcessor::new(vec![Arc::new(TextProcessor::new(
            TextProcessorOperator::ToUpper,
            vec![],
        ))]);
        let out = proc.process(Message::from_bytes(["ok".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"OK");
    }

    #[test]
    fn catch_skips_healthy_messages() {
        let proc = CatchProcessor::new(vec![Arc::new(TextProcessor::new(
            TextProcessorOperator::ToUpper,
            vec![],
        ))]);
        let out = proc.process(Message::from_bytes(["healthy".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"healthy");
    }

    #[test]
    fn catch_runs_chain_and_clears_flag() {
        let mut flagged = Message::from_bytes(["broken".as_bytes().to_vec()]);
        crate::processor::flag_error(&mut flagged, "noop", "synthetic");

        let proc = CatchProcessor::new(vec![Arc::new(NoopProcessor::new())]);
        let out = proc.process(flagged);
        assert!(!has_error(&out.messages[0]), "flag cleared after catch");
    }
}
