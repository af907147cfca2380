//! Processors: pure transformations from one message to zero or more
//! messages plus an optional short-circuit response.
//!
//! A processor never answers a transaction itself; the pipeline engine
//! owns response propagation. Failures on a specific message are
//! recorded on the message (the error metadata key) so partial-batch
//! failures never discard siblings.

pub mod archive;
pub mod conditional;
pub mod filter;
pub mod json;
pub mod metadata;
pub mod noop;
pub mod process_batch;
pub mod process_field;
pub mod split;
pub mod switch;
pub mod text;
pub mod try_catch;

use std::sync::Arc;

use datatypes::{Message, ERROR_METADATA_KEY};

use crate::transaction::Response;

pub use archive::ArchiveProcessor;
pub use conditional::ConditionalProcessor;
pub use filter::FilterProcessor;
pub use json::JsonProcessor;
pub use metadata::MetadataProcessor;
pub use noop::NoopProcessor;
pub use process_batch::ProcessBatchProcessor;
pub use process_field::ProcessFieldProcessor;
pub use split::SplitProcessor;
pub use switch::SwitchProcessor;
pub use text::TextProcessor;
pub use try_catch::{CatchProcessor, TryProcessor};

/// Result of applying one processor to one message.
pub struct ProcessorOutput {
    pub messages: Vec<Message>,
    /// Response to short-circuit propagation with, e.g. a filter that
    /// drops returns no messages plus `Ack`.
    pub response: Option<Response>,
}

impl ProcessorOutput {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            response: None,
        }
    }

    pub fn one(message: Message) -> Self {
        Self::messages(vec![message])
    }

    /// Drop the message, answering upstream with `Ack` (handled).
    pub fn drop_acked() -> Self {
        Self {
            messages: Vec::new(),
            response: Some(Response::Ack),
        }
    }
}

pub trait Processor: Send + Sync {
    /// Registry name of this processor type.
    fn kind(&self) -> &'static str;

    /// Apply the transformation. The caller owns every returned message;
    /// the input must not be retained.
    fn process(&self, message: Message) -> ProcessorOutput;
}

/// Run a chain of processors over a working set of messages.
///
/// Each processor is applied to every message produced by its
/// predecessor. When the set empties (all dropped), the first
/// short-circuit response is returned; absent one, `Ack`.
pub fn execute_all(
    processors: &[Arc<dyn Processor>],
    message: Message,
) -> (Vec<Message>, Option<Response>) {
    let mut working = vec![message];
    for processor in processors {
        let mut next = Vec::new();
        let mut short_circuit = None;
        for msg in working {
            let output = processor.process(msg);
            next.extend(output.messages);
            if short_circuit.is_none() {
                short_circuit = output.response;
            }
        }
        if next.is_empty() {
            return (Vec::new(), Some(short_circuit.unwrap_or(Response::Ack)));
        }
        working = next;
    }
    (working, None)
}

/// Tag every part of a message with a processing error, bumping the
/// processor error counter.
pub fn flag_error(message: &mut Message, processor: &'static str, detail: &str) {
    telemetry::PROCESSOR_ERROR_COUNTER
        .with_label_values(&[processor])
        .inc();
    tracing::debug!(processor, detail, "message flagged with processing error");
    message.set_metadata_all(ERROR_METADATA_KEY, detail);
}

/// True when any part of the message carries the error flag.
pub fn has_error(message: &Message) -> bool {
    message.has_metadata(ERROR_METADATA_KEY)
}

/// Clear the error flag from every part.
pub fn clear_error(message: &mut Message) {
    message.remove_metadata_all(ERROR_METADATA_KEY);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_all_short_circuits_on_empty_set() {
        let processors: Vec<Arc<dyn Processor>> = vec![
            Arc::new(NoopProcessor::new()),
            Arc::new(FilterProcessor::from_condition(Arc::new(
                crate::condition::StaticCondition::new(false),
            ))),
            // Never reached: the filter empties the set first.
            Arc::new(SplitProcessor::new()),
        ];
        let (messages, response) = execute_all(
            &processors,
            Message::from_bytes(["payload".as_bytes().to_vec()]),
        );
        assert!(messages.is_empty());
        assert_eq!(
            response,
            Some(Response::Ack),
            "filter drop is handled, not failed"
        );
    }

    #[test]
    fn execute_all_identity_chain_preserves_message() {
        let processors: Vec<Arc<dyn Processor>> = vec![
            Arc::new(NoopProcessor::new()),
            Arc::new(NoopProcessor::new()),
        ];
        let (messages, response) = execute_all(
            &processors,
            Message::from_bytes(["a".as_bytes().to_vec(), "b".into()]),
        );
        assert!(response.is_none());
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].get_all_bytes(),
            vec![&b"a"[..], &b"b"[..]],
            "identity chain must be byte-for-byte"
        );
    }
}
