//! Conditions: side-effect-free predicates over messages.
//!
//! Conditions gate the `filter`, `conditional` and `switch` processors.
//! They may be declared inline or registered as shared resources and
//! referenced by name.

use std::sync::{Arc, Weak};

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::resources::Resources;

pub trait Condition: Send + Sync {
    fn check(&self, message: &Message) -> bool;
}

/// Always returns its configured value.
pub struct StaticCondition {
    value: bool,
}

impl StaticCondition {
    pub fn new(value: bool) -> Self {
        Self { value }
    }
}

impl Condition for StaticCondition {
    fn check(&self, _message: &Message) -> bool {
        self.value
    }
}

#[derive(Debug, Deserialize)]
struct StaticOptions {
    #[serde(default)]
    value: bool,
}

/// Text predicates against a single part's payload.
pub struct TextCondition {
    operator: TextOperator,
    part: i64,
    arg: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextOperator {
    Equals,
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Deserialize)]
struct TextOptions {
    operator: TextOperator,
    #[serde(default)]
    part: i64,
    #[serde(default)]
    arg: String,
}

impl TextCondition {
    pub fn new(operator: TextOperator, part: i64, arg: impl Into<String>) -> Self {
        Self {
            operator,
            part,
            arg: arg.into(),
        }
    }
}

impl Condition for TextCondition {
    fn check(&self, message: &Message) -> bool {
        let Some(part) = message.get(self.part) else {
            return false;
        };
        let payload = String::from_utf8_lossy(part.as_bytes());
        match self.operator {
            TextOperator::Equals => payload == self.arg,
            TextOperator::Contains => payload.contains(&self.arg),
            TextOperator::Prefix => payload.starts_with(&self.arg),
            TextOperator::Suffix => payload.ends_with(&self.arg),
        }
    }
}

/// Inverts an inner condition.
pub struct NotCondition {
    inner: Arc<dyn Condition>,
}

impl NotCondition {
    pub fn new(inner: Arc<dyn Condition>) -> Self {
        Self { inner }
    }
}

impl Condition for NotCondition {
    fn check(&self, message: &Message) -> bool {
        !self.inner.check(message)
    }
}

#[derive(Debug, Deserialize)]
struct NotOptions {
    condition: ComponentConfig,
}

/// References a condition registered on the manager by name.
///
/// Holds the registry weakly: a stream must not keep its manager alive.
pub struct ResourceCondition {
    name: String,
    resources: Weak<dyn Resources>,
}

impl ResourceCondition {
    pub fn new(name: impl Into<String>, resources: &Arc<dyn Resources>) -> Self {
        Self {
            name: name.into(),
            resources: Arc::downgrade(resources),
        }
    }
}

impl Condition for ResourceCondition {
    fn check(&self, message: &Message) -> bool {
        let Some(resources) = self.resources.upgrade() else {
            tracing::warn!(name = %self.name, "condition resource registry gone");
            return false;
        };
        match resources.condition(&self.name) {
            Some(condition) => condition.check(message),
            None => {
                tracing::warn!(name = %self.name, "unknown condition resource");
                false
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourceOptions {
    resource: String,
}

/// Build a condition from its tagged configuration.
pub fn new_condition(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Arc<dyn Condition>, ComponentError> {
    match conf.kind.as_str() {
        "static" => {
            let opts: StaticOptions = conf.parse_options("condition")?;
            Ok(Arc::new(StaticCondition::new(opts.value)))
        }
        "text" => {
            let opts: TextOptions = conf.parse_options("condition")?;
            Ok(Arc::new(TextCondition::new(
                opts.operator,
                opts.part,
                opts.arg,
            )))
        }
        "not" => {
            let opts: NotOptions = conf.parse_options("condition")?;
            Ok(Arc::new(NotCondition::new(new_condition(
                &opts.condition,
                resources,
            )?)))
        }
        "resource" => {
            let opts: ResourceOptions = conf.parse_options("condition")?;
            Ok(Arc::new(ResourceCondition::new(opts.resource, resources)))
        }
        other => Err(ComponentError::UnknownType {
            category: "condition",
            kind: other.to_string(),
        }),
    }
}

/// Names and descriptions of the built-in condition types.
pub fn condition_descriptions() -> Vec<(&'static str, &'static str)> {
    vec![
        ("static", "always resolves to a configured boolean"),
        ("text", "string predicate against a single part payload"),
        ("not", "inverts a child condition"),
        ("resource", "references a condition registered on the manager"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::NoopResources;
    use serde_json::json;

    fn msg(payload: &str) -> Message {
        Message::from_bytes([payload.as_bytes().to_vec()])
    }

    #[test]
    fn text_operators() {
        let m = msg("hello world");
        assert!(TextCondition::new(TextOperator::Contains, 0, "lo wo").check(&m));
        assert!(TextCondition::new(TextOperator::Prefix, 0, "hello").check(&m));
        assert!(TextCondition::new(TextOperator::Suffix, 0, "world").check(&m));
        assert!(!TextCondition::new(TextOperator::Equals, 0, "hello").check(&m));
    }

    #[test]
    fn text_missing_part_is_false() {
        let cond = TextCondition::new(TextOperator::Equals, 3, "x");
        assert!(!cond.check(&msg("only one part")));
    }

    #[test]
    fn builds_nested_not_from_config() {
        let conf: ComponentConfig = serde_json::from_value(json!({
            "type": "not",
            "condition": {"type": "static", "value": true},
        }))
        .expect("config");

        let resources = NoopResources::shared();
        let cond = new_condition(&conf, &resources).expect("build condition");
        assert!(!cond.check(&msg("anything")));
    }
}
