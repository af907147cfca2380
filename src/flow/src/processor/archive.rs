//! Collapses every part of a message into a single part.

use bytes::{BufMut, BytesMut};
use datatypes::{Message, Part};
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{Processor, ProcessorOutput};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Parts joined by newlines.
    #[default]
    Lines,
    /// Parts concatenated with no separator.
    Concatenate,
}

#[derive(Debug, Deserialize)]
struct ArchiveOptions {
    #[serde(default)]
    format: ArchiveFormat,
}

pub struct ArchiveProcessor {
    format: ArchiveFormat,
}

impl ArchiveProcessor {
    pub fn new(format: ArchiveFormat) -> Self {
        Self { format }
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        let opts: ArchiveOptions = conf.parse_options("processor")?;
        Ok(Self::new(opts.format))
    }
}

impl Processor for ArchiveProcessor {
    fn kind(&self) -> &'static str {
        "archive"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        let mut combined = BytesMut::new();
        for (i, part) in message.iter().enumerate() {
            if i > 0 && self.format == ArchiveFormat::Lines {
                combined.put_u8(b'\n');
            }
            combined.extend_from_slice(part.as_bytes());
        }
        ProcessorOutput::one(Message::from_part(Part::new(combined.freeze())))
    }
}
