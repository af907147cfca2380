//! Component configuration: the `type`-tagged unions used across every
//! category (inputs, buffers, processors, outputs, conditions).

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Errors raised while resolving a component configuration.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("unknown {category} type: {kind}")]
    UnknownType {
        category: &'static str,
        kind: String,
    },
    #[error("invalid {0} configuration: {1}")]
    BadConfig(&'static str, String),
    #[error("resource not found: {0}")]
    MissingResource(String),
    #[error("{0} stream already claimed")]
    AlreadyConsumed(&'static str),
}

/// A single component's raw configuration: its `type` plus whatever
/// options that type defines. Typed option structs are deserialised
/// from `options` by each constructor.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ComponentConfig {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub options: JsonMap<String, JsonValue>,
}

impl ComponentConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: JsonMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Deserialise this component's options into its typed struct.
    pub fn parse_options<T: serde::de::DeserializeOwned>(
        &self,
        category: &'static str,
    ) -> Result<T, ComponentError> {
        serde_json::from_value(JsonValue::Object(self.options.clone()))
            .map_err(|e| ComponentError::BadConfig(category, e.to_string()))
    }

    /// Option keys not present in `fields`, reported as lint strings.
    pub fn lint_unknown_fields(&self, context: &str, fields: &[&str]) -> Vec<String> {
        self.options
            .keys()
            .filter(|key| !fields.contains(&key.as_str()))
            .map(|key| {
                format!(
                    "{context}: unknown field '{key}' for type '{kind}'",
                    kind = self.kind
                )
            })
            .collect()
    }
}

/// True when a config key looks credential-like and should be redacted
/// from sanitised output.
fn is_secret_field(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["password", "secret", "token", "credential", "api_key"]
        .iter()
        .any(|marker| key.contains(marker))
}

/// Redact credential-like values from a component's options, recursing
/// into nested component lists so sub-pipelines are covered too.
pub fn sanitise_options(options: &JsonMap<String, JsonValue>) -> JsonValue {
    let mut out = JsonMap::new();
    for (key, value) in options {
        if is_secret_field(key) {
            out.insert(
                key.clone(),
                JsonValue::String("!!!SECRET_SCRUBBED!!!".into()),
            );
            continue;
        }
        out.insert(key.clone(), sanitise_value(value));
    }
    JsonValue::Object(out)
}

fn sanitise_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => sanitise_options(map),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitise_value).collect()),
        other => other.clone(),
    }
}

/// Sanitised form of one component: `type` plus redacted options.
pub fn sanitise_component(conf: &ComponentConfig) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("type".into(), JsonValue::String(conf.kind.clone()));
    if let JsonValue::Object(options) = sanitise_options(&conf.options) {
        out.extend(options);
    }
    JsonValue::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialises_tagged_union_shape() {
        let conf: ComponentConfig = serde_json::from_value(json!({
            "type": "http_server",
            "address": "localhost:1243",
            "path": "/testpost",
        }))
        .expect("component config");
        assert_eq!(conf.kind, "http_server");
        assert_eq!(conf.options["address"], json!("localhost:1243"));
    }

    #[test]
    fn lint_reports_unknown_fields_only() {
        let conf = ComponentConfig::new("stdout").with_option("delimiter", json!("\n"));
        assert!(conf.lint_unknown_fields("output", &["delimiter"]).is_empty());
        let lints = conf.lint_unknown_fields("output", &["other"]);
        assert_eq!(lints.len(), 1);
        assert!(lints[0].contains("unknown field 'delimiter'"));
    }

    #[test]
    fn sanitise_redacts_credentials_recursively() {
        let conf: ComponentConfig = serde_json::from_value(json!({
            "type": "thing",
            "password": "hunter2",
            "nested": {"api_key": "abc", "plain": 1},
        }))
        .expect("component config");
        let sanitised = sanitise_component(&conf);
        assert_eq!(sanitised["password"], json!("!!!SECRET_SCRUBBED!!!"));
        assert_eq!(sanitised["nested"]["api_key"], json!("!!!SECRET_SCRUBBED!!!"));
        assert_eq!(sanitised["nested"]["plain"], json!(1));
        assert_eq!(sanitised["type"], json!("thing"));
    }
}
