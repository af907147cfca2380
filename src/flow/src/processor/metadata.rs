//! Mutates part metadata.

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{Processor, ProcessorOutput};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetadataOperator {
    Set,
    Delete,
}

#[derive(Debug, Deserialize)]
struct MetadataOptions {
    operator: MetadataOperator,
    key: String,
    #[serde(default)]
    value: String,
}

pub struct MetadataProcessor {
    operator: MetadataOperator,
    key: String,
    value: String,
}

impl MetadataProcessor {
    pub fn new(operator: MetadataOperator, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operator,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        let opts: MetadataOptions = conf.parse_options("processor")?;
        Ok(Self::new(opts.operator, opts.key, opts.value))
    }
}

impl Processor for MetadataProcessor {
    fn kind(&self) -> &'static str {
        "metadata"
    }

    fn process(&self, mut message: Message) -> ProcessorOutput {
        match self.operator {
            MetadataOperator::Set => message.set_metadata_all(&self.key, &self.value),
            MetadataOperator::Delete => message.remove_metadata_all(&self.key),
        }
        ProcessorOutput::one(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_delete_round_trip() {
        let msg = Message::from_bytes(["x".as_bytes().to_vec()]);
        let set = MetadataProcessor::new(MetadataOperator::Set, "k", "v");
        let msg = set.process(msg).messages.remove(0);
        assert_eq!(msg.get(0).expect("part").metadata("k"), Some("v"));

        let del = MetadataProcessor::new(MetadataOperator::Delete, "k", "");
        let msg = del.process(msg).messages.remove(0);
        assert_eq!(msg.get(0).expect("part").metadata("k"), None);
    }
}
