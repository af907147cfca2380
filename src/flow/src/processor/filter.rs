//! Drops messages failing a condition.
//!
//! A dropped message is handled, not failed: the pipeline answers the
//! upstream sink with `Ack`.

use std::sync::Arc;

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::condition::{new_condition, Condition};
use crate::processor::{Processor, ProcessorOutput};
use crate::resources::Resources;

pub struct FilterProcessor {
    condition: Arc<dyn Condition>,
}

#[derive(Debug, Deserialize)]
struct FilterOptions {
    condition: ComponentConfig,
}

impl FilterProcessor {
    pub fn from_condition(condition: Arc<dyn Condition>) -> Self {
        Self { condition }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: FilterOptions = conf.parse_options("processor")?;
        Ok(Self {
            condition: new_condition(&opts.condition, resources)?,
        })
    }
}

impl Processor for FilterProcessor {
    fn kind(&self) -> &'static str {
        "filter"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        if self.condition.check(&message) {
            ProcessorOutput::one(message)
        } else {
            telemetry::MESSAGES_FILTERED_COUNTER
                .with_label_values(&["filter"])
                .inc();
            ProcessorOutput::drop_acked()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::StaticCondition;
    use crate::transaction::Response;

    #[test]
    fn failing_condition_drops_with_ack() {
        let filter = FilterProcessor::from_condition(Arc::new(StaticCondition::new(false)));
        let out = filter.process(Message::from_bytes(["x".as_bytes().to_vec()]));
        assert!(out.messages.is_empty());
        assert_eq!(out.response, Some(Response::Ack));
    }

    #[test]
    fn passing_condition_forwards() {
        let filter = FilterProcessor::from_condition(Arc::new(StaticCondition::new(true)));
        let out = filter.process(Message::from_bytes(["x".as_bytes().to_vec()]));
        assert_eq!(out.messages.len(), 1);
        assert!(out.response.is_none());
    }
}
