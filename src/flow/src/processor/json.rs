//! Structured mutations of JSON part payloads.
//!
//! Operators: `select` replaces a part with the sub-document at `path`
//! (a string leaf becomes the raw payload, everything else is
//! marshalled as JSON), `set` writes a configured value at `path`,
//! `delete` removes it. A part that fails to parse, or a `select` path
//! that is absent, flags the message with the error key and leaves the
//! part unchanged.

use datatypes::{json_path, Message};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::component::{ComponentConfig, ComponentError};
use crate::processor::{flag_error, Processor, ProcessorOutput};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JsonOperator {
    Select,
    Set,
    Delete,
}

#[derive(Debug, Deserialize)]
struct JsonOptions {
    operator: JsonOperator,
    #[serde(default)]
    path: String,
    /// Target part indices; empty means all parts.
    #[serde(default)]
    parts: Vec<i64>,
    /// Value written by the `set` operator.
    #[serde(default)]
    value: JsonValue,
}

pub struct JsonProcessor {
    operator: JsonOperator,
    path: String,
    parts: Vec<i64>,
    value: JsonValue,
}

impl JsonProcessor {
    pub fn new(operator: JsonOperator, path: impl Into<String>, parts: Vec<i64>) -> Self {
        Self {
            operator,
            path: path.into(),
            parts,
            value: JsonValue::Null,
        }
    }

    pub fn with_value(mut self, value: JsonValue) -> Self {
        self.value = value;
        self
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        let opts: JsonOptions = conf.parse_options("processor")?;
        Ok(Self {
            operator: opts.operator,
            path: opts.path,
            parts: opts.parts,
            value: opts.value,
        })
    }

    /// Resolve the target part indices against the current part count,
    /// in ascending order.
    fn target_indices(&self, message: &Message) -> Vec<usize> {
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

    fn apply_to_part(&self, doc: &mut JsonValue) -> Result<Option<JsonValue>, String> {
        match self.operator {
            JsonOperator::Select => match json_path::get_path(doc, &self.path) {
                Some(sub) => Ok(Some(sub.clone())),
                None => Err(format!("path not found: {}", self.path)),
            },
            JsonOperator::Set => {
                json_path::set_path(doc, &self.path, self.value.clone());
                Ok(None)
            }
            JsonOperator::Delete => {
                json_path::delete_path(doc, &self.path);
                Ok(None)
            }
        }
    }
}

impl Processor for JsonProcessor {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn process(&self, mut message: Message) -> ProcessorOutput {
        let mut failure: Option<String> = None;
        for index in self.target_indices(&message) {
            let part = message
                .get_mut(index as i64)
                .expect("resolved index in range");
            let mut doc = match part.json() {
                Ok(doc) => doc.clone(),
                Err(err) => {
                    failure = Some(err.to_string());
                    continue;
                }
            };
            match self.apply_to_part(&mut doc) {
                // A selected string leaf becomes the raw payload, not a
                // JSON-quoted document.
                Ok(Some(JsonValue::String(leaf))) => {
                    part.set_bytes(leaf.into_bytes());
                }
                Ok(Some(replacement)) => {
                    if part.set_json(replacement).is_err() {
                        failure = Some("reserialise failed".to_string());
                    }
                }
                Ok(None) => {
                    if part.set_json(doc).is_err() {
                        failure = Some("reserialise failed".to_string());
                    }
                }
                Err(detail) => failure = Some(detail),
            }
        }
        if let Some(detail) = failure {
            flag_error(&mut message, "json", &detail);
        }
        ProcessorOutput::one(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::has_error;
    use serde_json::json;

    fn single(payload: &str) -> Message {
        Message::from_bytes([payload.as_bytes().to_vec()])
    }

    #[test]
    fn select_replaces_part_with_sub_document() {
        let proc = JsonProcessor::new(JsonOperator::Select, "foo.bar", vec![]);
        let out = proc.process(single(r#"{"foo":{"bar":{"baz":1}}}"#));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), br#"{"baz":1}"#);
    }

    #[test]
    fn select_string_leaf_yields_raw_bytes() {
        let proc = JsonProcessor::new(JsonOperator::Select, "foo.bar", vec![]);
        let out = proc.process(single(r#"{"foo":{"bar":"put me at the root"}}"#));
        assert_eq!(
            out.messages[0].get(0).expect("part").as_bytes(),
            b"put me at the root",
            "string leaves must not be JSON-quoted"
        );
    }

    #[test]
    fn set_materialises_path() {
        let proc =
            JsonProcessor::new(JsonOperator::Set, "a.b", vec![]).with_value(json!("written"));
        let out = proc.process(single(r#"{}"#));
        assert_eq!(
            out.messages[0].get(0).expect("part").as_bytes(),
            br#"{"a":{"b":"written"}}"#
        );
    }

    #[test]
    fn invalid_json_flags_error_and_continues() {
        let proc = JsonProcessor::new(JsonOperator::Select, "foo", vec![]);
        let out = proc.process(single("not json"));
        assert_eq!(out.messages.len(), 1, "message continues despite failure");
        assert!(has_error(&out.messages[0]));
        assert_eq!(
            out.messages[0].get(0).expect("part").as_bytes(),
            b"not json",
            "failed part left unchanged"
        );
    }

    #[test]
    fn parts_selector_targets_only_listed_parts() {
        let proc = JsonProcessor::new(JsonOperator::Select, "v", vec![1]);
        let msg = Message::from_bytes([
            br#"{"v":"a"}"#.to_vec(),
            br#"{"v":"b"}"#.to_vec(),
        ]);
        let out = proc.process(msg);
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), br#"{"v":"a"}"#);
        assert_eq!(out.messages[0].get(1).expect("part").as_bytes(), b"b");
    }
}
