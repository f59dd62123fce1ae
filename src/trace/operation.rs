//! Operation data model.
//!
//! One [`Operation`] is recorded per intercepted vendor call. Field names
//! serialize in camelCase to match the collector's ingestion schema.

use crate::error::ObsyError;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// Vendor that served an intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationVendor {
    OpenAi,
    Pinecone,
}

/// The specific call site an operation was recorded from.
///
/// The set of kinds is closed: adding an instrumented call site means adding a
/// variant here, so a call with no recorder cannot exist at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    #[serde(rename = "openai.chat.completions.create")]
    OpenAiChatCompletion,
    #[serde(rename = "pinecone.index.query")]
    PineconeQuery,
    #[serde(rename = "pinecone.index.namespace.query")]
    PineconeNamespaceQuery,
}

impl OperationKind {
    pub fn vendor(&self) -> OperationVendor {
        match self {
            OperationKind::OpenAiChatCompletion => OperationVendor::OpenAi,
            OperationKind::PineconeQuery | OperationKind::PineconeNamespaceQuery => {
                OperationVendor::Pinecone
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::OpenAiChatCompletion => "openai.chat.completions.create",
            OperationKind::PineconeQuery => "pinecone.index.query",
            OperationKind::PineconeNamespaceQuery => "pinecone.index.namespace.query",
        }
    }
}

/// Settled result of an operation.
///
/// `model` and `usage` are stored beside the raw value as convenience fields so
/// consumers need no vendor-specific knowledge to display them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// An error normalized to a plain message/trace pair for transport.
#[derive(Debug, Clone, Serialize)]
pub struct OperationError {
    pub message: String,
    pub stack: String,
}

impl OperationError {
    pub fn from_error(err: &ObsyError) -> Self {
        Self {
            message: err.to_string(),
            stack: format!("{:?}", err),
        }
    }
}

/// The record of one instrumented call within a trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub trace_id: String,
    pub label: String,
    pub vendor: OperationVendor,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub inputs: Vec<Value>,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    pub(crate) fn new(
        trace_id: impl Into<String>,
        kind: OperationKind,
        label: impl Into<String>,
        inputs: Vec<Value>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            label: label.into(),
            vendor: kind.vendor(),
            kind,
            inputs,
            started_at: Utc::now().timestamp_millis(),
            ended_at: None,
            duration: None,
            result: None,
            error: None,
        }
    }

    /// Fix the end timestamp and derived duration. Exactly one of
    /// `result`/`error` must already be set by the recorder.
    pub(crate) fn finish(&mut self) {
        let ended_at = Utc::now().timestamp_millis();
        self.ended_at = Some(ended_at);
        self.duration = Some(ended_at - self.started_at);
    }

    pub fn is_settled(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Pull a model identifier out of a serialized vendor payload.
pub(crate) fn extract_model(value: &Value) -> Option<String> {
    value.get("model").and_then(Value::as_str).map(String::from)
}

/// Pull usage counters out of a serialized vendor payload.
///
/// The Groq OpenAI-compatible API reports usage under `x_groq.usage` instead of
/// the top-level `usage` field.
pub(crate) fn extract_usage(value: &Value) -> Option<Value> {
    value
        .get("usage")
        .filter(|usage| !usage.is_null())
        .or_else(|| value.pointer("/x_groq/usage").filter(|usage| !usage.is_null()))
        .cloned()
}
