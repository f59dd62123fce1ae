//! Instrumentation adapters for vendor clients.
//!
//! Each adapter wraps a vendor client behind the same capability surface and
//! redirects its calls through the active trace's recording functions. Call
//! sites use the wrapper exactly as they would the real client; when no trace
//! is active the call passes through unrecorded.

pub mod openai;
pub mod pinecone;

pub use openai::{instrument_openai, TracedOpenAi};
pub use pinecone::{instrument_pinecone, TracedIndex, TracedPinecone};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Serialize call arguments for the operation record, degrading to null if the
/// value cannot be represented. Recording must never break the call.
pub(crate) fn serialize_input<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(serialized) => serialized,
        Err(err) => {
            warn!(error = %err, "Failed to serialize call inputs, recording null");
            Value::Null
        }
    }
}
