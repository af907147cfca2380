//! The top-level configuration tree: stream sections plus the service
//! surround (admin API, resources, logger, metrics, shutdown budget).

use std::path::{Path, PathBuf};

use flow::component::ComponentConfig;
use flow::pipeline::PipelineConfig;
use flow::stream::StreamConfig;
use manager::ResourcesConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("config has no input/output sections and streams mode is off")]
    MissingStreamSections,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_address")]
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_http_address() -> String {
    "0.0.0.0:4195".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_address")]
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_metrics_address() -> String {
    "0.0.0.0:9898".to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
            enabled: true,
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoggingOutput {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingFileConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("weir.log")
}

fn default_max_size() -> u64 {
    64 * 1024 * 1024
}

fn default_max_files() -> usize {
    5
}

impl Default for RollingFileConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            max_size_bytes: default_max_size(),
            max_files: default_max_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub output: LoggingOutput,
    #[serde(default)]
    pub file: RollingFileConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub input: Option<ComponentConfig>,
    #[serde(default)]
    pub buffer: Option<ComponentConfig>,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    #[serde(default)]
    pub output: Option<ComponentConfig>,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub logger: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_close_timeout")]
    pub system_close_timeout: String,
}

fn default_close_timeout() -> String {
    "20s".to_string()
}

impl Config {
    /// The single-stream sections as one stream configuration.
    pub fn stream_config(&self) -> Result<StreamConfig, ConfigError> {
        let (Some(input), Some(output)) = (&self.input, &self.output) else {
            return Err(ConfigError::MissingStreamSections);
        };
        Ok(StreamConfig {
            input: input.clone(),
            buffer: self
                .buffer
                .clone()
                .unwrap_or_else(|| ComponentConfig::new("none")),
            pipeline: self.pipeline.clone().unwrap_or_default(),
            output: output.clone(),
        })
    }

    /// Lint warnings across the stream sections.
    pub fn lint(&self) -> Vec<String> {
        match self.stream_config() {
            Ok(stream) => stream.lint("config"),
            Err(_) => Vec::new(),
        }
    }

    /// Sanitised tree with defaults made explicit and credentials
    /// redacted, suitable for printing and the admin API.
    pub fn sanitised(&self) -> JsonValue {
        let mut out = JsonMap::new();
        out.insert(
            "http".into(),
            serde_json::to_value(&self.http).expect("serialise http config"),
        );
        if let Ok(stream) = self.stream_config() {
            if let JsonValue::Object(sections) = stream.sanitised() {
                out.extend(sections);
            }
        }
        out.insert(
            "resources".into(),
            serde_json::to_value(&self.resources).expect("serialise resources config"),
        );
        out.insert(
            "logger".into(),
            serde_json::to_value(&self.logger).expect("serialise logger config"),
        );
        out.insert(
            "metrics".into(),
            serde_json::to_value(&self.metrics).expect("serialise metrics config"),
        );
        out.insert(
            "system_close_timeout".into(),
            JsonValue::String(self.system_close_timeout.clone()),
        );
        JsonValue::Object(out)
    }
}

const TOP_LEVEL_SECTIONS: &[&str] = &[
    "http",
    "input",
    "buffer",
    "pipeline",
    "output",
    "resources",
    "logger",
    "metrics",
    "system_close_timeout",
];

/// Read a configuration file (YAML or JSON) and lint it.
pub fn read_config(path: &Path) -> Result<(Config, Vec<String>), ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut lints = Vec::new();
    if let Ok(serde_yaml::Value::Mapping(root)) = serde_yaml::from_str(&raw) {
        for key in root.keys() {
            if let serde_yaml::Value::String(key) = key {
                if !TOP_LEVEL_SECTIONS.contains(&key.as_str()) {
                    lints.push(format!("config: unknown top-level section '{key}'"));
                }
            }
        }
    }
    lints.extend(config.lint());
    Ok((config, lints))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = serde_yaml::from_str(
            "input:\n  type: generate\n  payload: hi\noutput:\n  type: stdout\n",
        )
        .expect("parse config");
        assert_eq!(config.http.address, "0.0.0.0:4195");
        assert_eq!(config.system_close_timeout, "20s");
        let stream = config.stream_config().expect("stream sections");
        assert_eq!(stream.buffer.kind, "none");
        assert_eq!(stream.pipeline.threads, 1);
    }

    #[test]
    fn missing_stream_sections_is_an_error() {
        let config: Config = serde_yaml::from_str("http:\n  address: 0.0.0.0:4000\n")
            .expect("parse config");
        assert!(matches!(
            config.stream_config(),
            Err(ConfigError::MissingStreamSections)
        ));
    }

    #[test]
    fn lint_surfaces_unknown_component_fields() {
        let config: Config = serde_yaml::from_str(
            "input:\n  type: generate\n  cadence: 1s\noutput:\n  type: stdout\n",
        )
        .expect("parse config");
        let lints = config.lint();
        assert_eq!(lints.len(), 1);
        assert!(lints[0].contains("cadence"));
    }

    #[test]
    fn sanitised_tree_includes_every_section() {
        let config: Config = serde_yaml::from_str(
            "input:\n  type: generate\n  payload: hi\noutput:\n  type: stdout\n",
        )
        .expect("parse config");
        let tree = config.sanitised();
        for key in ["http", "input", "pipeline", "output", "logger", "metrics"] {
            assert!(tree.get(key).is_some(), "missing section {key}");
        }
    }
}
