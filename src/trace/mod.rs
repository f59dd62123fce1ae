//! Trace and operation recording.
//!
//! A [`ObsyTrace`] aggregates the [`Operation`]s recorded for one logical unit
//! of work (typically one inbound request). Instrumented vendor calls are
//! routed here by the adapters in [`crate::instruments`]: non-streaming calls
//! through [`ObsyTrace::record_call`], streaming calls through the stream
//! interceptor, which tees the response so the caller's copy is untouched
//! while a shadow copy is accumulated for the record.
//!
//! Ending a trace fixes its timestamps, serializes it through the redaction
//! engine, and ships it to the collector fire-and-forget.

pub mod operation;
pub mod stream;
#[allow(clippy::module_inception)]
pub mod trace;

pub use operation::{Operation, OperationError, OperationKind, OperationResult, OperationVendor};
pub use trace::{HttpRequestInfo, HttpResponseInfo, ObsyTrace};
