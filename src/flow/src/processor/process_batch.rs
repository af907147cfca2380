//! Runs an inner chain over the whole message as a single unit.

use std::sync::Arc;

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{execute_all, Processor, ProcessorOutput};
use crate::registry;
use crate::resources::Resources;

#[derive(Debug, Deserialize)]
struct ProcessBatchOptions {
    #[serde(default)]
    processors: Vec<ComponentConfig>,
}

pub struct ProcessBatchProcessor {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessBatchProcessor {
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: ProcessBatchOptions = conf.parse_options("processor")?;
        let processors = opts
            .processors
            .iter()
            .map(|p| registry::new_processor(p, resources))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(processors))
    }
}

impl Processor for ProcessBatchProcessor {
    fn kind(&self) -> &'static str {
        "process_batch"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        let (messages, response) = execute_all(&self.processors, message);
        ProcessorOutput { messages, response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::SplitProcessor;

    #[test]
    fn emits_every_inner_result() {
        let proc = ProcessBatchProcessor::new(vec![Arc::new(SplitProcessor::new())]);
        let out = proc.process(Message::from_bytes([
            "a".as_bytes().to_vec(),
            "b".into(),
        ]));
        assert_eq!(out.messages.len(), 2, "batch results are emitted individually");
    }
}
