//! Dynamic stream lifecycle: create, read, update and delete running
//! streams, plus the directory loader backing streams mode.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flow::stream::{Stream, StreamConfig};
use flow::Resources;
use serde_json::Value as JsonValue;

#[derive(Debug, thiserror::Error)]
pub enum StreamManagerError {
    #[error("stream already exists: {0}")]
    AlreadyExists(String),
    #[error("stream not found: {0}")]
    NotFound(String),
    #[error("stream {id} failed to start: {detail}")]
    StartFailed { id: String, detail: String },
    #[error("stream {id} failed to stop cleanly: {detail}")]
    StopFailed { id: String, detail: String },
    #[error("failed to load stream configs: {0}")]
    Load(String),
}

struct StreamEntry {
    stream: Stream,
}

/// Registry of running streams keyed by id.
pub struct StreamManager {
    streams: Mutex<HashMap<String, StreamEntry>>,
    resources: Arc<dyn Resources>,
    stop_timeout: Duration,
}

impl StreamManager {
    pub fn new(resources: Arc<dyn Resources>, stop_timeout: Duration) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            resources,
            stop_timeout,
        }
    }

    /// Construct and start a stream. Returns only once startup has
    /// completed or failed.
    pub fn create(&self, id: &str, config: StreamConfig) -> Result<(), StreamManagerError> {
        {
            let streams = self.streams.lock().expect("stream map poisoned");
            if streams.contains_key(id) {
                return Err(StreamManagerError::AlreadyExists(id.to_string()));
            }
        }
        let stream =
            Stream::start(config, &self.resources).map_err(|e| StreamManagerError::StartFailed {
                id: id.to_string(),
                detail: e.to_string(),
            })?;

        let mut streams = self.streams.lock().expect("stream map poisoned");
        if streams.contains_key(id) {
            // Lost a create race; roll the new stream back.
            let stale = stream;
            tokio::spawn(async move {
                let _ = stale.stop(Duration::from_secs(1)).await;
            });
            return Err(StreamManagerError::AlreadyExists(id.to_string()));
        }
        streams.insert(id.to_string(), StreamEntry { stream });
        tracing::info!(stream = id, "stream created");
        Ok(())
    }

    /// Sanitised configuration of one stream.
    pub fn read(&self, id: &str) -> Result<JsonValue, StreamManagerError> {
        let streams = self.streams.lock().expect("stream map poisoned");
        streams
            .get(id)
            .map(|entry| entry.stream.config().sanitised())
            .ok_or_else(|| StreamManagerError::NotFound(id.to_string()))
    }

    /// Ids and sanitised configurations of every stream.
    pub fn list(&self) -> HashMap<String, JsonValue> {
        let streams = self.streams.lock().expect("stream map poisoned");
        streams
            .iter()
            .map(|(id, entry)| (id.clone(), entry.stream.config().sanitised()))
            .collect()
    }

    /// Atomic swap: the new stream starts first, then the old one is
    /// stopped. On start failure the old stream keeps running.
    pub async fn update(&self, id: &str, config: StreamConfig) -> Result<(), StreamManagerError> {
        {
            let streams = self.streams.lock().expect("stream map poisoned");
            if !streams.contains_key(id) {
                return Err(StreamManagerError::NotFound(id.to_string()));
            }
        }
        let replacement =
            Stream::start(config, &self.resources).map_err(|e| StreamManagerError::StartFailed {
                id: id.to_string(),
                detail: e.to_string(),
            })?;

        let old = {
            let mut streams = self.streams.lock().expect("stream map poisoned");
            match streams.insert(id.to_string(), StreamEntry { stream: replacement }) {
                Some(old) => old,
                None => {
                    // Deleted between the check and the swap; the
                    // replacement simply becomes the stream.
                    return Ok(());
                }
            }
        };

        if let Err(err) = old.stream.stop(self.stop_timeout).await {
            tracing::warn!(stream = id, error = %err, "old stream failed to stop after update");
        }
        tracing::info!(stream = id, "stream updated");
        Ok(())
    }

    /// Stop and remove a stream. The id stays claimed unless the stop
    /// is clean.
    pub async fn delete(&self, id: &str) -> Result<(), StreamManagerError> {
        let entry = {
            let mut streams = self.streams.lock().expect("stream map poisoned");
            streams
                .remove(id)
                .ok_or_else(|| StreamManagerError::NotFound(id.to_string()))?
        };
        match entry.stream.stop(self.stop_timeout).await {
            Ok(()) => {
                tracing::info!(stream = id, "stream deleted");
                Ok(())
            }
            Err(err) => Err(StreamManagerError::StopFailed {
                id: id.to_string(),
                detail: err.to_string(),
            }),
        }
    }

    /// True when every stream reports healthy.
    pub fn all_healthy(&self) -> bool {
        let streams = self.streams.lock().expect("stream map poisoned");
        streams.values().all(|entry| entry.stream.is_healthy())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().expect("stream map poisoned").len()
    }

    /// Stop every stream, dividing the deadline across the set.
    pub async fn stop_all(&self, timeout: Duration) -> Result<(), StreamManagerError> {
        let entries: Vec<(String, StreamEntry)> = {
            let mut streams = self.streams.lock().expect("stream map poisoned");
            streams.drain().collect()
        };
        let mut failed = Vec::new();
        let stops = entries.into_iter().map(|(id, entry)| async move {
            entry.stream.stop(timeout).await.map_err(|e| (id, e))
        });
        for result in futures::future::join_all(stops).await {
            if let Err((id, err)) = result {
                tracing::error!(stream = %id, error = %err, "stream failed to stop");
                failed.push(id);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StreamManagerError::StopFailed {
                id: failed.join(", "),
                detail: "shutdown deadline exceeded".to_string(),
            })
        }
    }
}

/// Scan a directory for stream configuration files. Each `.yaml`,
/// `.yml` or `.json` filename (less extension) becomes a stream id.
pub fn load_stream_configs_from_directory(
    dir: &Path,
) -> Result<HashMap<String, StreamConfig>, StreamManagerError> {
    let mut configs = HashMap::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StreamManagerError::Load(format!("{}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| StreamManagerError::Load(e.to_string()))?;
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !matches!(ext, "yaml" | "yml" | "json") {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                StreamManagerError::Load(format!("invalid file name: {}", path.display()))
            })?
            .to_string();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| StreamManagerError::Load(format!("{}: {e}", path.display())))?;
        let config: StreamConfig = serde_yaml::from_str(&raw)
            .map_err(|e| StreamManagerError::Load(format!("{}: {e}", path.display())))?;
        configs.insert(id, config);
    }
    Ok(configs)
}
