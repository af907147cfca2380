//! Runs an inner chain over a sub-document extracted from each selected
//! part, merging the result back at the same path.
//!
//! The merge is conservative: when the inner chain drops the synthetic
//! message, fails, or returns a different part count than the
//! selection, every selected part is left unchanged and the processor
//! answers normally.

use std::sync::Arc;

use bytes::Bytes;
use datatypes::{json_path, Message, Part};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{execute_all, Processor, ProcessorOutput};
use crate::registry;
use crate::resources::Resources;

/// Discipline governing how the inner chain's payload is merged back.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Object,
    Array,
    /// Run the chain for its side effects only; the part is untouched.
    Discard,
}

#[derive(Debug, Deserialize)]
struct ProcessFieldOptions {
    #[serde(default)]
    path: String,
    #[serde(default)]
    parts: Vec<i64>,
    #[serde(default)]
    result_type: ResultType,
    #[serde(default)]
    processors: Vec<ComponentConfig>,
}

pub struct ProcessFieldProcessor {
    path: String,
    parts: Vec<i64>,
    result_type: ResultType,
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessFieldProcessor {
    pub fn new(
        path: impl Into<String>,
        parts: Vec<i64>,
        result_type: ResultType,
        processors: Vec<Arc<dyn Processor>>,
    ) -> Self {
        Self {
            path: path.into(),
            parts,
            result_type,
            processors,
        }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: ProcessFieldOptions = conf.parse_options("processor")?;
        let processors = opts
            .processors
            .iter()
            .map(|p| registry::new_processor(p, resources))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(opts.path, opts.parts, opts.result_type, processors))
    }

    fn selection(&self, message: &Message) -> Vec<usize> {
        if self.parts.is_empty() {
            (0..message.len()).collect()
        } else {
            let mut resolved: Vec<usize> = self
                .parts
                .iter()
                .filter_map(|&i| message.resolve_index(i))
                .collect();
            resolved.sort_unstable();
            resolved.dedup();
            resolved
        }
    }

    /// Extract the field payload handed to the inner chain: raw bytes
    /// for JSON strings, serialised JSON otherwise (absent fields
    /// serialise as `null`).
    fn extract_payload(doc: &JsonValue, path: &str) -> Bytes {
        match json_path::get_path(doc, path) {
            Some(JsonValue::String(s)) => Bytes::copy_from_slice(s.as_bytes()),
            Some(other) => Bytes::from(serde_json::to_vec(other).expect("serialise json value")),
            None => Bytes::from_static(b"null"),
        }
    }

    /// Interpret an inner-chain payload per the configured result type.
    /// `None` means the part must be left unchanged.
    fn decode_result(&self, payload: &[u8]) -> Option<JsonValue> {
        let text = String::from_utf8_lossy(payload);
        match self.result_type {
            ResultType::String => Some(JsonValue::String(text.into_owned())),
            ResultType::Int => text
                .trim()
                .parse::<i64>()
                .ok()
                .map(|n| JsonValue::Number(n.into())),
            ResultType::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number),
            ResultType::Bool => text.trim().parse::<bool>().ok().map(JsonValue::Bool),
            ResultType::Object => match serde_json::from_slice::<JsonValue>(payload) {
                Ok(value) if value.is_object() || value.is_null() => Some(value),
                _ => None,
            },
            ResultType::Array => match serde_json::from_slice::<JsonValue>(payload) {
                Ok(value @ JsonValue::Array(_)) => Some(value),
                _ => None,
            },
            ResultType::Discard => None,
        }
    }
}

impl Processor for ProcessFieldProcessor {
    fn kind(&self) -> &'static str {
        "process_field"
    }

    fn process(&self, mut message: Message) -> ProcessorOutput {
        let selection = self.selection(&message);
        if selection.is_empty() {
            return ProcessorOutput::one(message);
        }

        // Decode each selected part up front; a part that is not valid
        // JSON exempts itself from the merge but still feeds the chain.
        let mut docs: Vec<Option<JsonValue>> = Vec::with_capacity(selection.len());
        let mut synthetic = Vec::with_capacity(selection.len());
        for &index in &selection {
            let part = message
                .get_mut(index as i64)
                .expect("selected index in range");
            let doc = part.json().ok().cloned();
            let payload = match &doc {
                Some(doc) => Self::extract_payload(doc, &self.path),
                None => part.to_bytes(),
            };
            docs.push(doc);
            synthetic.push(Part::new(payload));
        }

        let (result_messages, _) = execute_all(&self.processors, Message::from(synthetic));

        // Conservative guard: a dropped message or a changed part count
        // leaves the original untouched.
        let result_parts: Vec<Bytes> = result_messages
            .iter()
            .flat_map(|m| m.get_all_bytes())
            .collect();
        if result_parts.len() != selection.len() {
            tracing::debug!(
                expected = selection.len(),
                actual = result_parts.len(),
                "inner chain changed part count; leaving parts unchanged"
            );
            return ProcessorOutput::one(message);
        }

        for ((&index, doc), payload) in selection.iter().zip(docs).zip(result_parts) {
            let Some(mut doc) = doc else {
                continue;
            };
            let Some(value) = self.decode_result(&payload) else {
                continue;
            };
            json_path::set_path(&mut doc, &self.path, value);
            let part = message
                .get_mut(index as i64)
                .expect("selected index in range");
            if part.set_json(doc).is_err() {
                tracing::debug!("failed to reserialise merged part; leaving unchanged");
            }
        }

        ProcessorOutput::one(message)
    }
}
