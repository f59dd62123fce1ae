//! Trace lifecycle: creation, operation recording, finalization, shipping.

use crate::client::ObsyClient;
use crate::context;
use crate::error::Result;
use crate::redact::redact_sensitive_keys;
use crate::trace::operation::{
    extract_model, extract_usage, Operation, OperationError, OperationKind, OperationResult,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Descriptor of the inbound request a trace was opened for.
#[derive(Debug, Clone, Serialize)]
pub struct HttpRequestInfo {
    pub url: String,
    pub method: String,
    pub query: Value,
    pub headers: Value,
    pub body: Value,
}

/// Descriptor of the response sent for the traced request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseInfo {
    pub status_code: u16,
    pub headers: Value,
}

#[derive(Debug, Default)]
struct TraceState {
    ended_at: Option<i64>,
    duration: Option<i64>,
    operations: Vec<Operation>,
    response: Option<HttpResponseInfo>,
    metadata: Option<Value>,
}

/// The record of one logical unit of work and every instrumented call made
/// during it.
///
/// A trace is created by the front door when a unit of work begins, activated
/// via [`run_in_context`](Self::run_in_context) so instrumented calls can find
/// it, and finalized with [`end`](Self::end) when the unit of work completes.
/// Operations are appended in the order their recording completes, which for
/// concurrent calls may differ from issuance order; each operation carries its
/// own timestamps.
pub struct ObsyTrace {
    id: String,
    client: Arc<ObsyClient>,
    started_at: i64,
    request: Option<HttpRequestInfo>,
    state: Mutex<TraceState>,
}

impl ObsyTrace {
    /// Open a new trace.
    pub fn new(
        client: Arc<ObsyClient>,
        request: Option<HttpRequestInfo>,
        metadata: Option<Value>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            client,
            started_at: Utc::now().timestamp_millis(),
            request,
            state: Mutex::new(TraceState {
                metadata,
                ..Default::default()
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// Run `body` with this trace active, so instrumented calls made anywhere
    /// inside it are recorded here. See [`context::activate`].
    pub async fn run_in_context<F>(self: &Arc<Self>, body: F) -> F::Output
    where
        F: Future,
    {
        context::activate(Arc::clone(self), body).await
    }

    /// Create a pending operation for an intercepted call.
    ///
    /// The operation is appended to the trace only when its recording
    /// completes, not here.
    pub fn begin_operation(
        &self,
        kind: OperationKind,
        label: impl Into<String>,
        inputs: Vec<Value>,
    ) -> Operation {
        Operation::new(&self.id, kind, label, inputs)
    }

    /// Append a settled operation. Called once per operation by the recording
    /// paths.
    pub(crate) fn push_operation(&self, operation: Operation) {
        debug!(
            trace_id = %self.id,
            label = %operation.label,
            kind = operation.kind.as_str(),
            "Recording operation"
        );
        self.state.lock().unwrap().operations.push(operation);
    }

    /// Record a non-streaming call.
    ///
    /// The real call is awaited; its outcome is recorded as a side effect and
    /// returned to the caller unchanged. Recording problems degrade (the
    /// affected field is nulled with a warning) rather than break the call.
    pub async fn record_call<T, F>(
        &self,
        kind: OperationKind,
        label: &str,
        inputs: Vec<Value>,
        call: F,
    ) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        let mut operation = self.begin_operation(kind, label, inputs);

        match call.await {
            Ok(value) => {
                let serialized = match serde_json::to_value(&value) {
                    Ok(serialized) => serialized,
                    Err(err) => {
                        warn!(error = %err, "Failed to serialize operation result, recording null");
                        Value::Null
                    }
                };
                let model = extract_model(&serialized)
                    .or_else(|| operation.inputs.first().and_then(extract_model));
                let usage = extract_usage(&serialized);
                operation.result = Some(OperationResult {
                    value: Some(serialized),
                    model,
                    usage,
                });
                operation.finish();
                self.push_operation(operation);
                Ok(value)
            }
            Err(err) => {
                operation.error = Some(OperationError::from_error(&err));
                operation.finish();
                self.push_operation(operation);
                Err(err)
            }
        }
    }

    /// Attach the outbound response descriptor.
    pub fn add_response(&self, response: HttpResponseInfo) {
        self.state.lock().unwrap().response = Some(response);
    }

    /// Attach free-form metadata.
    pub fn set_metadata(&self, metadata: Value) {
        self.state.lock().unwrap().metadata = Some(metadata);
    }

    /// Snapshot of the operations recorded so far.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// End the trace and ship it.
    ///
    /// The end timestamp and duration are fixed exactly once; a second call is
    /// ignored with a warning. Shipping is spawned fire-and-forget - the caller
    /// does not await delivery and never observes a delivery failure. When
    /// called outside a tokio runtime the trace still ends but delivery is
    /// skipped with a warning.
    pub fn end(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.ended_at.is_some() {
                warn!(trace_id = %self.id, "end() called more than once, ignoring");
                return;
            }
            let ended_at = Utc::now().timestamp_millis();
            state.ended_at = Some(ended_at);
            state.duration = Some(ended_at - self.started_at);
        }

        let payload = self.to_payload();
        let client = Arc::clone(&self.client);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    client.send_trace(payload).await;
                });
            }
            Err(_) => {
                warn!(trace_id = %self.id, "end() called outside an async runtime, dropping trace");
            }
        }
    }

    /// Serialize the trace for shipping, redacting sensitive fields.
    ///
    /// Operation errors were already normalized to message/trace pairs at
    /// recording time, so the output is uniform. Repeated calls on an ended
    /// trace produce identical output.
    pub fn to_payload(&self) -> Value {
        let state = self.state.lock().unwrap();
        let payload = json!({
            "id": &self.id,
            "projectId": self.client.project_id(),
            "startedAt": self.started_at,
            "endedAt": state.ended_at,
            "duration": state.duration,
            "operations": &state.operations,
            "request": &self.request,
            "response": &state.response,
            "metadata": &state.metadata,
        });

        redact_sensitive_keys(&payload, self.client.sensitive_keys())
    }
}
