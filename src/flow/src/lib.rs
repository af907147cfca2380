pub mod buffer;
pub mod component;
pub mod condition;
pub mod duration;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod resources;
pub mod shutdown;
pub mod stream;
pub mod transaction;

pub use datatypes::{Message, Part, ResultStore};

pub use component::{ComponentConfig, ComponentError};
pub use condition::{condition_descriptions, new_condition, Condition};
pub use duration::parse_duration;
pub use pipeline::{Pipeline, PipelineConfig};
pub use processor::{execute_all, Processor, ProcessorOutput};
pub use resources::{Cache, InprocPipes, NoopResources, RateLimit, Resources};
pub use shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
pub use stream::{Stream, StreamConfig, StreamError};
pub use transaction::{ErrorKind, ReplySink, Response, ResponseFuture, Transaction};
