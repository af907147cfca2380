//! Plain-text transforms of part payloads.

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{Processor, ProcessorOutput};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextProcessorOperator {
    ToUpper,
    ToLower,
    Trim,
}

#[derive(Debug, Deserialize)]
struct TextOptions {
    operator: TextProcessorOperator,
    #[serde(default)]
    parts: Vec<i64>,
}

pub struct TextProcessor {
    operator: TextProcessorOperator,
    parts: Vec<i64>,
}

impl TextProcessor {
    pub fn new(operator: TextProcessorOperator, parts: Vec<i64>) -> Self {
        Self { operator, parts }
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        let opts: TextOptions = conf.parse_options("processor")?;
        Ok(Self::new(opts.operator, opts.parts))
    }

    fn transform(&self, payload: &str) -> String {
        match self.operator {
            TextProcessorOperator::ToUpper => payload.to_uppercase(),
            TextProcessorOperator::ToLower => payload.to_lowercase(),
            TextProcessorOperator::Trim => payload.trim().to_string(),
        }
    }
}

impl Processor for TextProcessor {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn process(&self, mut message: Message) -> ProcessorOutput {
        let indices: Vec<usize> = if self.parts.is_empty() {
            (0..message.len()).collect()
        } else {
            self.parts
                .iter()
                .filter_map(|&i| message.resolve_index(i))
                .collect()
        };
        for index in indices {
            let part = message
                .get_mut(index as i64)
                .expect("resolved index in range");
            let transformed = self.transform(&String::from_utf8_lossy(part.as_bytes()));
            part.set_bytes(transformed.into_bytes());
        }
        ProcessorOutput::one(message)
    }
}
