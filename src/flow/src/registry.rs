//! Per-category component registries.
//!
//! Each category maps a `type` name to a constructor, a description for
//! the CLI listings, and the option fields the linter accepts. Built-in
//! entries are installed lazily; plugins register before streams start
//! and the maps are effectively read-only afterwards.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::buffer::{Buffer, MemoryBuffer, NoneBuffer};
use crate::component::{ComponentConfig, ComponentError};
use crate::input::{GenerateInput, HttpServerInput, Input, InprocInput};
use crate::output::{BrokerOutput, DropOutput, InprocOutput, Output, RetryOutput, StdoutOutput};
use crate::processor::{
    ArchiveProcessor, CatchProcessor, ConditionalProcessor, FilterProcessor, JsonProcessor,
    MetadataProcessor, NoopProcessor, ProcessBatchProcessor, ProcessFieldProcessor, Processor,
    SplitProcessor, SwitchProcessor, TextProcessor, TryProcessor,
};
use crate::resources::Resources;

type Constructor<T> =
    Arc<dyn Fn(&ComponentConfig, &Arc<dyn Resources>) -> Result<T, ComponentError> + Send + Sync>;

pub struct ComponentSpec<T> {
    pub description: &'static str,
    /// Option fields accepted by this type, for lint.
    pub fields: &'static [&'static str],
    constructor: Constructor<T>,
}

impl<T> ComponentSpec<T> {
    pub fn new(
        description: &'static str,
        fields: &'static [&'static str],
        constructor: Constructor<T>,
    ) -> Self {
        Self {
            description,
            fields,
            constructor,
        }
    }
}

type Registry<T> = Lazy<RwLock<HashMap<String, ComponentSpec<T>>>>;

static INPUTS: Registry<Box<dyn Input>> = Lazy::new(|| RwLock::new(builtin_inputs()));
static PROCESSORS: Registry<Arc<dyn Processor>> = Lazy::new(|| RwLock::new(builtin_processors()));
static OUTPUTS: Registry<Box<dyn Output>> = Lazy::new(|| RwLock::new(builtin_outputs()));
static BUFFERS: Registry<Box<dyn Buffer>> = Lazy::new(|| RwLock::new(builtin_buffers()));

fn builtin_inputs() -> HashMap<String, ComponentSpec<Box<dyn Input>>> {
    let mut map: HashMap<String, ComponentSpec<Box<dyn Input>>> = HashMap::new();
    map.insert(
        "http_server".into(),
        ComponentSpec::new(
            "listens for POST requests, replying when the transaction resolves",
            &["address", "path", "timeout"],
            Arc::new(|conf, _| Ok(Box::new(HttpServerInput::from_config(conf)?) as Box<dyn Input>)),
        ),
    );
    map.insert(
        "inproc".into(),
        ComponentSpec::new(
            "consumes transactions from a named in-process pipe",
            &["name"],
            Arc::new(|conf, resources| {
                Ok(Box::new(InprocInput::from_config(conf, resources)?) as Box<dyn Input>)
            }),
        ),
    );
    map.insert(
        "generate".into(),
        ComponentSpec::new(
            "emits a fixed payload on an interval",
            &["payload", "interval", "count"],
            Arc::new(|conf, _| Ok(Box::new(GenerateInput::from_config(conf)?) as Box<dyn Input>)),
        ),
    );
    map
}

fn builtin_processors() -> HashMap<String, ComponentSpec<Arc<dyn Processor>>> {
    let mut map: HashMap<String, ComponentSpec<Arc<dyn Processor>>> = HashMap::new();
    map.insert(
        "noop".into(),
        ComponentSpec::new(
            "passes messages through untouched",
            &[],
            Arc::new(|_, _| Ok(Arc::new(NoopProcessor::new()) as Arc<dyn Processor>)),
        ),
    );
    map.insert(
        "filter".into(),
        ComponentSpec::new(
            "drops messages failing a condition",
            &["condition"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(FilterProcessor::from_config(conf, resources)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "json".into(),
        ComponentSpec::new(
            "select, set or delete a path within JSON part payloads",
            &["operator", "path", "parts", "value"],
            Arc::new(|conf, _| Ok(Arc::new(JsonProcessor::from_config(conf)?) as Arc<dyn Processor>)),
        ),
    );
    map.insert(
        "text".into(),
        ComponentSpec::new(
            "plain-text transforms of part payloads",
            &["operator", "parts"],
            Arc::new(|conf, _| Ok(Arc::new(TextProcessor::from_config(conf)?) as Arc<dyn Processor>)),
        ),
    );
    map.insert(
        "archive".into(),
        ComponentSpec::new(
            "collapses all parts into a single part",
            &["format"],
            Arc::new(|conf, _| {
                Ok(Arc::new(ArchiveProcessor::from_config(conf)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "split".into(),
        ComponentSpec::new(
            "fans a multi-part message out into one message per part",
            &[],
            Arc::new(|_, _| Ok(Arc::new(SplitProcessor::new()) as Arc<dyn Processor>)),
        ),
    );
    map.insert(
        "metadata".into(),
        ComponentSpec::new(
            "set or delete part metadata",
            &["operator", "key", "value"],
            Arc::new(|conf, _| {
                Ok(Arc::new(MetadataProcessor::from_config(conf)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "conditional".into(),
        ComponentSpec::new(
            "runs an inner chain only when a condition holds",
            &["condition", "processors"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(ConditionalProcessor::from_config(conf, resources)?)
                    as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "switch".into(),
        ComponentSpec::new(
            "ordered case evaluation with optional fallthrough",
            &["cases"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(SwitchProcessor::from_config(conf, resources)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "try".into(),
        ComponentSpec::new(
            "runs a chain, restoring the original message on error",
            &["processors"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(TryProcessor::from_config(conf, resources)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "catch".into(),
        ComponentSpec::new(
            "runs a chain only over messages flagged with an error",
            &["processors"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(CatchProcessor::from_config(conf, resources)?) as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "process_field".into(),
        ComponentSpec::new(
            "runs an inner chain over a field of each selected part",
            &["path", "parts", "result_type", "processors"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(ProcessFieldProcessor::from_config(conf, resources)?)
                    as Arc<dyn Processor>)
            }),
        ),
    );
    map.insert(
        "process_batch".into(),
        ComponentSpec::new(
            "runs an inner chain over the whole message as one unit",
            &["processors"],
            Arc::new(|conf, resources| {
                Ok(Arc::new(ProcessBatchProcessor::from_config(conf, resources)?)
                    as Arc<dyn Processor>)
            }),
        ),
    );
    map
}

fn builtin_outputs() -> HashMap<String, ComponentSpec<Box<dyn Output>>> {
    let mut map: HashMap<String, ComponentSpec<Box<dyn Output>>> = HashMap::new();
    map.insert(
        "stdout".into(),
        ComponentSpec::new(
            "writes part payloads to stdout, acking after the flush",
            &["delimiter"],
            Arc::new(|conf, _| Ok(Box::new(StdoutOutput::from_config(conf)?) as Box<dyn Output>)),
        ),
    );
    map.insert(
        "inproc".into(),
        ComponentSpec::new(
            "forwards transactions to a named in-process pipe",
            &["name"],
            Arc::new(|conf, resources| {
                Ok(Box::new(InprocOutput::from_config(conf, resources)?) as Box<dyn Output>)
            }),
        ),
    );
    map.insert(
        "drop".into(),
        ComponentSpec::new(
            "swallows every message and acks",
            &[],
            Arc::new(|_, _| Ok(Box::new(DropOutput::new()) as Box<dyn Output>)),
        ),
    );
    map.insert(
        "broker".into(),
        ComponentSpec::new(
            "fans transactions out across child outputs",
            &["pattern", "outputs", "max_in_flight"],
            Arc::new(|conf, resources| {
                Ok(Box::new(BrokerOutput::from_config(conf, resources)?) as Box<dyn Output>)
            }),
        ),
    );
    map.insert(
        "retry".into(),
        ComponentSpec::new(
            "wraps a child output, resubmitting on transient failure",
            &["output", "max_retries", "max_in_flight"],
            Arc::new(|conf, resources| {
                Ok(Box::new(RetryOutput::from_config(conf, resources)?) as Box<dyn Output>)
            }),
        ),
    );
    map
}

fn builtin_buffers() -> HashMap<String, ComponentSpec<Box<dyn Buffer>>> {
    let mut map: HashMap<String, ComponentSpec<Box<dyn Buffer>>> = HashMap::new();
    map.insert(
        "none".into(),
        ComponentSpec::new(
            "no buffering; a single transaction chain input to output",
            &[],
            Arc::new(|_, _| Ok(Box::new(NoneBuffer::new()) as Box<dyn Buffer>)),
        ),
    );
    map.insert(
        "memory".into(),
        ComponentSpec::new(
            "bounded in-memory queue; acks upstream on enqueue",
            &["limit"],
            Arc::new(|conf, _| Ok(Box::new(MemoryBuffer::from_config(conf)?) as Box<dyn Buffer>)),
        ),
    );
    map
}

fn construct<T>(
    registry: &Registry<T>,
    category: &'static str,
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<T, ComponentError> {
    // Clone the constructor out so the lock is released before it runs;
    // compositional components recurse back into this registry.
    let constructor = {
        let guard = registry.read().expect("component registry poisoned");
        let spec = guard.get(&conf.kind).ok_or_else(|| ComponentError::UnknownType {
            category,
            kind: conf.kind.clone(),
        })?;
        spec.constructor.clone()
    };
    constructor(conf, resources)
}

pub fn new_input(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Box<dyn Input>, ComponentError> {
    construct(&INPUTS, "input", conf, resources)
}

pub fn new_processor(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Arc<dyn Processor>, ComponentError> {
    construct(&PROCESSORS, "processor", conf, resources)
}

pub fn new_output(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Box<dyn Output>, ComponentError> {
    construct(&OUTPUTS, "output", conf, resources)
}

pub fn new_buffer(
    conf: &ComponentConfig,
    resources: &Arc<dyn Resources>,
) -> Result<Box<dyn Buffer>, ComponentError> {
    construct(&BUFFERS, "buffer", conf, resources)
}

/// Register an input plugin. Intended for process init, before any
/// stream is constructed.
pub fn register_input_plugin(name: impl Into<String>, spec: ComponentSpec<Box<dyn Input>>) {
    INPUTS
        .write()
        .expect("component registry poisoned")
        .insert(name.into(), spec);
}

pub fn register_processor_plugin(name: impl Into<String>, spec: ComponentSpec<Arc<dyn Processor>>) {
    PROCESSORS
        .write()
        .expect("component registry poisoned")
        .insert(name.into(), spec);
}

pub fn register_output_plugin(name: impl Into<String>, spec: ComponentSpec<Box<dyn Output>>) {
    OUTPUTS
        .write()
        .expect("component registry poisoned")
        .insert(name.into(), spec);
}

pub fn register_buffer_plugin(name: impl Into<String>, spec: ComponentSpec<Box<dyn Buffer>>) {
    BUFFERS
        .write()
        .expect("component registry poisoned")
        .insert(name.into(), spec);
}

fn descriptions<T>(registry: &Registry<T>) -> Vec<(String, &'static str)> {
    let guard = registry.read().expect("component registry poisoned");
    let mut out: Vec<(String, &'static str)> = guard
        .iter()
        .map(|(name, spec)| (name.clone(), spec.description))
        .collect();
    out.sort();
    out
}

pub fn input_descriptions() -> Vec<(String, &'static str)> {
    descriptions(&INPUTS)
}

pub fn processor_descriptions() -> Vec<(String, &'static str)> {
    descriptions(&PROCESSORS)
}

pub fn output_descriptions() -> Vec<(String, &'static str)> {
    descriptions(&OUTPUTS)
}

pub fn buffer_descriptions() -> Vec<(String, &'static str)> {
    descriptions(&BUFFERS)
}

fn lint_with<T>(
    registry: &Registry<T>,
    category: &'static str,
    context: &str,
    conf: &ComponentConfig,
) -> Vec<String> {
    let guard = registry.read().expect("component registry poisoned");
    match guard.get(&conf.kind) {
        Some(spec) => conf.lint_unknown_fields(context, spec.fields),
        None => vec![format!(
            "{context}: unknown {category} type '{}'",
            conf.kind
        )],
    }
}

pub fn lint_input(context: &str, conf: &ComponentConfig) -> Vec<String> {
    lint_with(&INPUTS, "input", context, conf)
}

pub fn lint_output(context: &str, conf: &ComponentConfig) -> Vec<String> {
    let mut lints = lint_with(&OUTPUTS, "output", context, conf);
    // Broker and retry nest further outputs.
    if let Some(children) = conf.options.get("outputs").and_then(|v| v.as_array()) {
        for (i, child) in children.iter().enumerate() {
            if let Ok(child_conf) = serde_json::from_value::<ComponentConfig>(child.clone()) {
                lints.extend(lint_output(&format!("{context}.outputs.{i}"), &child_conf));
            }
        }
    }
    if let Some(child) = conf.options.get("output") {
        if let Ok(child_conf) = serde_json::from_value::<ComponentConfig>(child.clone()) {
            lints.extend(lint_output(&format!("{context}.output"), &child_conf));
        }
    }
    lints
}

pub fn lint_buffer(context: &str, conf: &ComponentConfig) -> Vec<String> {
    lint_with(&BUFFERS, "buffer", context, conf)
}

pub fn lint_processor(context: &str, conf: &ComponentConfig) -> Vec<String> {
    let mut lints = lint_with(&PROCESSORS, "processor", context, conf);
    // Compositional processors nest further chains.
    if let Some(children) = conf.options.get("processors").and_then(|v| v.as_array()) {
        for (i, child) in children.iter().enumerate() {
            if let Ok(child_conf) = serde_json::from_value::<ComponentConfig>(child.clone()) {
                lints.extend(lint_processor(
                    &format!("{context}.processors.{i}"),
                    &child_conf,
                ));
            }
        }
    }
    if let Some(cases) = conf.options.get("cases").and_then(|v| v.as_array()) {
        for (i, case) in cases.iter().enumerate() {
            if let Some(children) = case.get("processors").and_then(|v| v.as_array()) {
                for (j, child) in children.iter().enumerate() {
                    if let Ok(child_conf) = serde_json::from_value::<ComponentConfig>(child.clone())
                    {
                        lints.extend(lint_processor(
                            &format!("{context}.cases.{i}.processors.{j}"),
                            &child_conf,
                        ));
                    }
                }
            }
        }
    }
    lints
}
