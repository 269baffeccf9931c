//! Event bridge error types.

use thiserror::Error;

/// Errors that can occur while publishing or consuming events.
#[derive(Debug, Error)]
pub enum BusError {
    /// Event payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying transport rejected the publish.
    #[error("publish failed: {0}")]
    Publish(String),
}
