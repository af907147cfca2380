//! The stream supervisor: owns one input → buffer → pipeline → output
//! graph, sequencing startup leaves-first and shutdown in reverse.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::buffer::Buffer;
use crate::component::{sanitise_component, ComponentConfig, ComponentError};
use crate::input::Input;
use crate::output::Output;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::registry;
use crate::resources::Resources;
use crate::shutdown::ShutdownError;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error("stream failed to stop within {0:?}")]
    StopTimeout(Duration),
}

/// One stream's full configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    pub input: ComponentConfig,
    #[serde(default = "default_buffer")]
    pub buffer: ComponentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub output: ComponentConfig,
}

fn default_buffer() -> ComponentConfig {
    ComponentConfig::new("none")
}

impl StreamConfig {
    /// Sanitised tree suitable for introspection endpoints.
    pub fn sanitised(&self) -> JsonValue {
        let mut pipeline = JsonMap::new();
        pipeline.insert("threads".into(), JsonValue::from(self.pipeline.threads));
        pipeline.insert(
            "processors".into(),
            JsonValue::Array(
                self.pipeline
                    .processors
                    .iter()
                    .map(sanitise_component)
                    .collect(),
            ),
        );

        let mut out = JsonMap::new();
        out.insert("input".into(), sanitise_component(&self.input));
        out.insert("buffer".into(), sanitise_component(&self.buffer));
        out.insert("pipeline".into(), JsonValue::Object(pipeline));
        out.insert("output".into(), sanitise_component(&self.output));
        JsonValue::Object(out)
    }

    /// Lint warnings for unknown fields and unknown component types.
    pub fn lint(&self, context: &str) -> Vec<String> {
        let mut lints = Vec::new();
        lints.extend(registry::lint_input(&format!("{context}.input"), &self.input));
        lints.extend(registry::lint_buffer(
            &format!("{context}.buffer"),
            &self.buffer,
        ));
        for (i, processor) in self.pipeline.processors.iter().enumerate() {
            lints.extend(registry::lint_processor(
                &format!("{context}.pipeline.processors.{i}"),
                processor,
            ));
        }
        lints.extend(registry::lint_output(
            &format!("{context}.output"),
            &self.output,
        ));
        lints
    }
}

/// A running stream.
pub struct Stream {
    config: StreamConfig,
    input: Box<dyn Input>,
    buffer: Box<dyn Buffer>,
    pipeline: Pipeline,
    output: Box<dyn Output>,
}

impl Stream {
    /// Construct and start every stage, leaves first: the output claims
    /// its channel before the pipeline starts, the pipeline before the
    /// buffer, and the input is created last so nothing produces into a
    /// stage that is not ready.
    pub fn start(
        config: StreamConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, StreamError> {
        let mut output = registry::new_output(&config.output, resources)?;
        let mut pipeline = Pipeline::new(&config.pipeline, resources)?;
        let mut buffer = registry::new_buffer(&config.buffer, resources)?;
        let mut input = registry::new_input(&config.input, resources)?;

        let input_rx = input
            .take_transactions()
            .ok_or(ComponentError::AlreadyConsumed("input"))?;
        let buffered_rx = buffer.start(input_rx)?;
        let processed_rx = pipeline.start(buffered_rx)?;
        output.consume(processed_rx)?;

        telemetry::ACTIVE_STREAMS_GAUGE.inc();
        Ok(Self {
            config,
            input,
            buffer,
            pipeline,
            output,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// True while the stream's worker stages are running.
    pub fn is_healthy(&self) -> bool {
        self.pipeline.is_running()
    }

    /// Begin shutdown without waiting.
    pub fn close_async(&self) {
        self.input.close_async();
    }

    /// Drain and stop every stage in reverse dependency order within
    /// `timeout`: the input stops producing, its channel closure
    /// cascades downstream, and each stage is awaited only after its
    /// upstream has finished. On overrun every stage is force-closed
    /// and an error returned.
    pub async fn stop(self, timeout: Duration) -> Result<(), StreamError> {
        let deadline = Instant::now() + timeout;
        telemetry::ACTIVE_STREAMS_GAUGE.dec();

        // Input first: stop new work, let outstanding responses drain.
        self.input.close_async();
        if let Err(err) = self.input.wait_for_close(remaining(deadline)).await {
            return Err(self.force_close(err, timeout));
        }
        // Dropping the adapter closes its transaction channel; each
        // stage below exits naturally once its upstream is drained, so
        // the graceful path only waits. `close_async` is the hard stop.
        drop(self.input);

        if let Err(err) = self.buffer.wait_for_close(remaining(deadline)).await {
            self.buffer.close_async();
            self.pipeline.close_async();
            self.output.close_async();
            return Err(stop_timeout(err, timeout));
        }
        if let Err(err) = self.pipeline.wait_for_close(remaining(deadline)).await {
            self.pipeline.close_async();
            self.output.close_async();
            return Err(stop_timeout(err, timeout));
        }
        if let Err(err) = self.output.wait_for_close(remaining(deadline)).await {
            self.output.close_async();
            return Err(stop_timeout(err, timeout));
        }

        Ok(())
    }

    fn force_close(&self, err: ShutdownError, timeout: Duration) -> StreamError {
        self.buffer.close_async();
        self.pipeline.close_async();
        self.output.close_async();
        stop_timeout(err, timeout)
    }
}

fn stop_timeout(err: ShutdownError, timeout: Duration) -> StreamError {
    tracing::warn!(error = %err, "stream stage failed to drain in time");
    StreamError::StopTimeout(timeout)
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
