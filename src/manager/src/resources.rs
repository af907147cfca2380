//! The process-wide registry of shared named resources.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use flow::component::ComponentConfig;
use flow::condition::new_condition;
use flow::{Cache, Condition, InprocPipes, RateLimit, Resources};
use serde::{Deserialize, Serialize};

use crate::cache::{MemoryCache, MemoryCacheConfig};
use crate::ratelimit::{LocalRateLimit, LocalRateLimitConfig};

/// The `resources` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub caches: HashMap<String, ComponentConfig>,
    #[serde(default)]
    pub rate_limits: HashMap<String, ComponentConfig>,
    #[serde(default)]
    pub conditions: HashMap<String, ComponentConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {name}: unknown type {kind}")]
    UnknownType { name: String, kind: String },
    #[error("resource {name}: {detail}")]
    BadConfig { name: String, detail: String },
}

/// Concrete [`Resources`] implementation backing every stream.
///
/// Populated once at startup; the maps are read-only afterwards, so the
/// locks are uncontended on the hot path.
#[derive(Default)]
pub struct ManagerResources {
    caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
    rate_limits: RwLock<HashMap<String, Arc<dyn RateLimit>>>,
    conditions: RwLock<HashMap<String, Arc<dyn Condition>>>,
    pipes: InprocPipes,
}

impl ManagerResources {
    /// Build the registry from configuration. Conditions may reference
    /// other named resources, so they are constructed against the
    /// shared handle in a second phase.
    pub fn from_config(config: &ResourcesConfig) -> Result<Arc<Self>, ResourceError> {
        let resources = Arc::new(Self::default());

        for (name, conf) in &config.caches {
            let cache = build_cache(name, conf)?;
            resources
                .caches
                .write()
                .expect("resource registry poisoned")
                .insert(name.clone(), cache);
        }
        for (name, conf) in &config.rate_limits {
            let limiter = build_rate_limit(name, conf)?;
            resources
                .rate_limits
                .write()
                .expect("resource registry poisoned")
                .insert(name.clone(), limiter);
        }

        let shared: Arc<dyn Resources> = resources.clone();
        for (name, conf) in &config.conditions {
            let condition =
                new_condition(conf, &shared).map_err(|e| ResourceError::BadConfig {
                    name: name.clone(),
                    detail: e.to_string(),
                })?;
            resources
                .conditions
                .write()
                .expect("resource registry poisoned")
                .insert(name.clone(), condition);
        }

        Ok(resources)
    }

    pub fn shared(self: &Arc<Self>) -> Arc<dyn Resources> {
        self.clone()
    }
}

fn build_cache(name: &str, conf: &ComponentConfig) -> Result<Arc<dyn Cache>, ResourceError> {
    match conf.kind.as_str() {
        "memory" => {
            let options: MemoryCacheConfig =
                conf.parse_options("cache").map_err(|e| ResourceError::BadConfig {
                    name: name.to_string(),
                    detail: e.to_string(),
                })?;
            let cache = MemoryCache::from_config(&options).map_err(|detail| {
                ResourceError::BadConfig {
                    name: name.to_string(),
                    detail,
                }
            })?;
            Ok(Arc::new(cache))
        }
        other => Err(ResourceError::UnknownType {
            name: name.to_string(),
            kind: other.to_string(),
        }),
    }
}

fn build_rate_limit(
    name: &str,
    conf: &ComponentConfig,
) -> Result<Arc<dyn RateLimit>, ResourceError> {
    match conf.kind.as_str() {
        "local" => {
            let options: LocalRateLimitConfig =
                conf.parse_options("rate_limit")
                    .map_err(|e| ResourceError::BadConfig {
                        name: name.to_string(),
                        detail: e.to_string(),
                    })?;
            let limiter = LocalRateLimit::from_config(&options).map_err(|detail| {
                ResourceError::BadConfig {
                    name: name.to_string(),
                    detail,
                }
            })?;
            Ok(Arc::new(limiter))
        }
        other => Err(ResourceError::UnknownType {
            name: name.to_string(),
            kind: other.to_string(),
        }),
    }
}

impl Resources for ManagerResources {
    fn cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        self.caches
            .read()
            .expect("resource registry poisoned")
            .get(name)
            .cloned()
    }

    fn rate_limit(&self, name: &str) -> Option<Arc<dyn RateLimit>> {
        self.rate_limits
            .read()
            .expect("resource registry poisoned")
            .get(name)
            .cloned()
    }

    fn condition(&self, name: &str) -> Option<Arc<dyn Condition>> {
        self.conditions
            .read()
            .expect("resource registry poisoned")
            .get(name)
            .cloned()
    }

    fn inproc_pipes(&self) -> &InprocPipes {
        &self.pipes
    }
}

/// Cache types available from configuration, for the CLI listing.
pub fn cache_descriptions() -> Vec<(&'static str, &'static str)> {
    vec![("memory", "in-memory TTL cache with optional entry cap")]
}

/// Rate limit types available from configuration, for the CLI listing.
pub fn rate_limit_descriptions() -> Vec<(&'static str, &'static str)> {
    vec![("local", "fixed-window counter local to this process")]
}
