//! obsy - in-process tracing SDK for AI service calls.
//!
//! The SDK wraps the calls an application makes to external AI services
//! (OpenAI-compatible chat APIs, Pinecone vector queries), records the timing,
//! inputs, outputs, and errors of each call as an [`trace::Operation`], groups
//! operations under one [`trace::ObsyTrace`] per inbound unit of work, and
//! ships each completed trace to the obsy collector.
//!
//! # Architecture
//!
//! - **[`context`]**: task-scoped store mapping the currently executing
//!   asynchronous work to its active trace; instrumented calls find the trace
//!   via [`context::current`] without it being passed explicitly.
//! - **[`instruments`]**: per-vendor wrappers implementing the same capability
//!   surface as the real clients, redirecting calls through the trace's
//!   recording functions.
//! - **[`trace`]**: operation recording (non-streaming calls and tee'd
//!   streaming responses), trace lifecycle, serialization.
//! - **[`redact`]**: masks sensitive keys in trace payloads before shipping.
//! - **[`client`]**: collector configuration and the best-effort shipping call.
//!
//! # Usage
//!
//! ```rust,ignore
//! use obsy::prelude::*;
//! use std::sync::Arc;
//!
//! let obsy = Arc::new(ObsyClient::new("obsy-api-key", "obsy-project-id"));
//! let openai = instrument_openai(Arc::new(OpenAiClient::new()));
//!
//! // one trace per inbound request, activated around the handler
//! let trace = ObsyTrace::new(Arc::clone(&obsy), None, None);
//! trace
//!     .run_in_context(async {
//!         let request = ChatCompletionRequest::new("llama3-8b-8192", vec![ChatMessage::user("Hello")]);
//!         openai.create(request).await
//!     })
//!     .await?;
//! trace.end(); // ships the trace, fire-and-forget
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod instruments;
pub mod redact;
pub mod trace;
pub mod vendors;

pub use client::{ObsyClient, ObsyConfig};
pub use error::{ObsyError, Result};
pub use trace::ObsyTrace;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::client::{ObsyClient, ObsyConfig};
    pub use crate::context::{activate, current};
    pub use crate::error::{ObsyError, Result};
    pub use crate::instruments::{instrument_openai, instrument_pinecone};
    pub use crate::trace::{HttpRequestInfo, HttpResponseInfo, ObsyTrace};
    pub use crate::vendors::openai::{
        ChatCompletionRequest, ChatCompletions, ChatMessage, OpenAiClient,
    };
    pub use crate::vendors::pinecone::{PineconeClient, QueryRequest, VectorIndex};
}
