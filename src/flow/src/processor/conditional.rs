//! Runs an inner chain only when a condition holds.

use std::sync::Arc;

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::condition::{new_condition, Condition};
use crate::processor::{execute_all, Processor, ProcessorOutput};
use crate::registry;
use crate::resources::Resources;

#[derive(Debug, Deserialize)]
struct ConditionalOptions {
    condition: ComponentConfig,
    #[serde(default)]
    processors: Vec<ComponentConfig>,
}

pub struct ConditionalProcessor {
    condition: Arc<dyn Condition>,
    processors: Vec<Arc<dyn Processor>>,
}

impl ConditionalProcessor {
    pub fn new(condition: Arc<dyn Condition>, processors: Vec<Arc<dyn Processor>>) -> Self {
        Self {
            condition,
            processors,
        }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: ConditionalOptions = conf.parse_options("processor")?;
        let processors = opts
            .processors
            .iter()
            .map(|p| registry::new_processor(p, resources))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(new_condition(&opts.condition, resources)?, processors))
    }
}

impl Processor for ConditionalProcessor {
    fn kind(&self) -> &'static str {
        "conditional"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        if !self.condition.check(&message) {
            return ProcessorOutput::one(message);
        }
        let (messages, response) = execute_all(&self.processors, message);
        ProcessorOutput { messages, response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::StaticCondition;
    use crate::processor::text::{TextProcessor, TextProcessorOperator};

    fn upper_chain() -> Vec<Arc<dyn Processor>> {
        vec![Arc::new(TextProcessor::new(
            TextProcessorOperator::ToUpper,
            vec![],
        ))]
    }

    #[test]
    fn false_condition_passes_through() {
        let proc = ConditionalProcessor::new(Arc::new(StaticCondition::new(false)), upper_chain());
        let out = proc.process(Message::from_bytes(["hello".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"hello");
    }

    #[test]
    fn true_condition_runs_inner_chain() {
        let proc = ConditionalProcessor::new(Arc::new(StaticCondition::new(true)), upper_chain());
        let out = proc.process(Message::from_bytes(["hello".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"HELLO");
    }
}
