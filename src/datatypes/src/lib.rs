pub mod json_path;
pub mod message;
pub mod part;

pub use json_path::{get_path, set_path};
pub use message::{Message, ResultStore};
pub use part::{Part, PartError};

/// Metadata key marking a message part as carrying a processing error.
///
/// Processors that fail on a specific message set this key instead of
/// aborting the pipeline; downstream processors and outputs branch on it.
pub const ERROR_METADATA_KEY: &str = "weir_error";

/// Metadata key marking a message as the synchronous response body for
/// request/reply inputs such as `http_server`.
pub const SYNC_RESPONSE_METADATA_KEY: &str = "weir_sync_response";
