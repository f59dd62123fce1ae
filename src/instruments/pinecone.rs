//! Instrumented wrapper for Pinecone clients.

use crate::context;
use crate::error::Result;
use crate::instruments::serialize_input;
use crate::redact::REDACTION_MARKER;
use crate::trace::OperationKind;
use crate::vendors::pinecone::{
    PineconeClient, PineconeIndex, QueryRequest, QueryResponse, VectorIndex,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A Pinecone client whose index queries are recorded on the active trace.
pub struct TracedPinecone {
    inner: Arc<PineconeClient>,
}

/// Wrap a Pinecone client so its queries are traced.
pub fn instrument_pinecone(client: Arc<PineconeClient>) -> TracedPinecone {
    TracedPinecone { inner: client }
}

impl TracedPinecone {
    /// Target an index by name; queries on the returned handle are traced.
    pub fn index(&self, name: impl Into<String>) -> TracedIndex<PineconeIndex> {
        TracedIndex {
            inner: self.inner.index(name),
            kind: OperationKind::PineconeQuery,
        }
    }
}

/// Traced handle to one vector index.
pub struct TracedIndex<I> {
    inner: I,
    kind: OperationKind,
}

impl TracedIndex<PineconeIndex> {
    /// Scope subsequent queries to a namespace. Namespaced queries are
    /// recorded under their own operation kind.
    pub fn namespace(&self, namespace: impl Into<String>) -> TracedIndex<PineconeIndex> {
        TracedIndex {
            inner: self.inner.namespace(namespace),
            kind: OperationKind::PineconeNamespaceQuery,
        }
    }
}

#[async_trait]
impl<I> VectorIndex for TracedIndex<I>
where
    I: VectorIndex + 'static,
{
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let Some(trace) = context::current() else {
            return self.inner.query(request).await;
        };

        // the embedding vector would bloat the trace payload; mask it in the
        // recorded inputs while the real call still receives it
        let mut input = serialize_input(&request);
        if let Some(fields) = input.as_object_mut() {
            fields.insert(
                "vector".to_string(),
                Value::String(REDACTION_MARKER.to_string()),
            );
        }

        trace
            .record_call(self.kind, "pinecone-query", vec![input], self.inner.query(request))
            .await
    }
}
