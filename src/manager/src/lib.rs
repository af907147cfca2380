pub mod api;
pub mod cache;
pub mod ratelimit;
pub mod resources;
pub mod streams;

pub use api::admin_router;
pub use cache::MemoryCache;
pub use ratelimit::LocalRateLimit;
pub use resources::{cache_descriptions, rate_limit_descriptions, ManagerResources, ResourcesConfig};
pub use streams::{load_stream_configs_from_directory, StreamManager, StreamManagerError};
