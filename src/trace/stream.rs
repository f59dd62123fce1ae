//! Tee'd consumption of streamed vendor responses.
//!
//! A streaming call hands its caller a single-pass stream, but recording needs
//! to observe every chunk too. [`intercept`] splits one producer into a public
//! stream (returned to the caller, untouched) and a shadow copy consumed by a
//! background task that accumulates the chunks into the pending operation.
//!
//! A single pump task reads the producer once and fans chunks out to both
//! sides through unbounded channels, so neither consumer's pace can stall the
//! other. The operation is appended to the trace only when the shadow side
//! drains, errors, or times out idle.

use crate::error::Result;
use crate::trace::operation::{extract_model, extract_usage, Operation, OperationError, OperationResult};
use crate::trace::ObsyTrace;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long the shadow consumer waits without a chunk before it gives up and
/// finalizes the operation with whatever it has. Guards against producers that
/// stall forever holding the operation (and its buffered chunks) in memory.
pub const SHADOW_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

enum ShadowItem {
    Chunk(Value),
    Failed(OperationError),
}

/// Split `source` into a public stream and an internally consumed shadow copy
/// that records into `operation`.
///
/// The public stream yields exactly the items the producer yields, in order.
/// If the public side is dropped before the producer finishes, the pump stops
/// reading the producer and the shadow finalizes with the chunks seen so far.
pub(crate) fn intercept<C, S>(
    trace: Arc<ObsyTrace>,
    operation: Operation,
    source: S,
) -> Pin<Box<dyn Stream<Item = Result<C>> + Send>>
where
    C: Serialize + Send + 'static,
    S: Stream<Item = Result<C>> + Send + 'static,
{
    let (public_tx, mut public_rx) = mpsc::unbounded_channel::<Result<C>>();
    let (shadow_tx, shadow_rx) = mpsc::unbounded_channel::<ShadowItem>();

    tokio::spawn(pump(source, public_tx, shadow_tx));
    tokio::spawn(consume_shadow(trace, operation, shadow_rx));

    Box::pin(async_stream::stream! {
        while let Some(item) = public_rx.recv().await {
            yield item;
        }
    })
}

async fn pump<C, S>(
    source: S,
    public_tx: mpsc::UnboundedSender<Result<C>>,
    shadow_tx: mpsc::UnboundedSender<ShadowItem>,
) where
    C: Serialize + Send + 'static,
    S: Stream<Item = Result<C>> + Send + 'static,
{
    let mut source = Box::pin(source);

    while let Some(item) = source.next().await {
        match item {
            Ok(chunk) => {
                let serialized = match serde_json::to_value(&chunk) {
                    Ok(serialized) => serialized,
                    Err(err) => {
                        warn!(error = %err, "Failed to serialize stream chunk, recording null");
                        Value::Null
                    }
                };
                let _ = shadow_tx.send(ShadowItem::Chunk(serialized));

                if public_tx.send(Ok(chunk)).is_err() {
                    // caller dropped the public stream; stop pulling the
                    // producer and let the shadow finalize with what it has
                    debug!("Public stream dropped mid-stream, stopping pump");
                    break;
                }
            }
            Err(err) => {
                let _ = shadow_tx.send(ShadowItem::Failed(OperationError::from_error(&err)));
                let _ = public_tx.send(Err(err));
                break;
            }
        }
    }
}

async fn consume_shadow(
    trace: Arc<ObsyTrace>,
    mut operation: Operation,
    mut shadow_rx: mpsc::UnboundedReceiver<ShadowItem>,
) {
    let mut chunks: Vec<Value> = Vec::new();
    let mut model = operation.inputs.first().and_then(extract_model);
    let mut usage: Option<Value> = None;

    loop {
        match timeout(SHADOW_IDLE_TIMEOUT, shadow_rx.recv()).await {
            Ok(Some(ShadowItem::Chunk(chunk))) => {
                if model.is_none() {
                    model = extract_model(&chunk);
                }
                if usage.is_none() {
                    usage = extract_usage(&chunk);
                }
                chunks.push(chunk);
            }
            Ok(Some(ShadowItem::Failed(err))) => {
                operation.error = Some(err);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    trace_id = %operation.trace_id,
                    label = %operation.label,
                    "Shadow stream idle timeout, finalizing with partial result"
                );
                break;
            }
        }
    }

    // result and error are mutually exclusive once the operation settles
    if operation.error.is_none() {
        operation.result = Some(OperationResult {
            value: Some(Value::Array(chunks)),
            model,
            usage,
        });
    }
    operation.finish();
    trace.push_operation(operation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ObsyClient;
    use crate::error::ObsyError;
    use crate::trace::operation::OperationKind;
    use serde_json::json;

    fn test_trace() -> Arc<ObsyTrace> {
        let client = Arc::new(ObsyClient::new("test-key", "test-project"));
        ObsyTrace::new(client, None, None)
    }

    async fn wait_for_operation(trace: &Arc<ObsyTrace>) -> Vec<crate::trace::Operation> {
        for _ in 0..100 {
            let operations = trace.operations();
            if !operations.is_empty() {
                return operations;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("operation was never recorded");
    }

    fn chunk(index: usize) -> Value {
        json!({"model": "llama3-8b-8192", "choices": [{"delta": {"content": format!("c{index}")}}]})
    }

    #[tokio::test]
    async fn test_public_stream_is_unaltered() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        let source = futures::stream::iter((0..4).map(|i| Ok(chunk(i))));
        let mut public = intercept(Arc::clone(&trace), operation, source);

        let mut seen = Vec::new();
        while let Some(item) = public.next().await {
            seen.push(item.unwrap());
        }

        assert_eq!(seen, (0..4).map(chunk).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_shadow_records_all_chunks_in_order() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        let source = futures::stream::iter((0..3).map(|i| Ok(chunk(i))));
        let mut public = intercept(Arc::clone(&trace), operation, source);
        while public.next().await.is_some() {}

        let operations = wait_for_operation(&trace).await;
        assert_eq!(operations.len(), 1);
        let result = operations[0].result.as_ref().unwrap();
        assert_eq!(
            result.value,
            Some(Value::Array((0..3).map(chunk).collect()))
        );
        assert_eq!(result.model.as_deref(), Some("llama3-8b-8192"));
        assert!(operations[0].is_settled());
        assert!(operations[0].error.is_none());
    }

    #[tokio::test]
    async fn test_usage_captured_from_first_bearing_chunk() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        let chunks = vec![
            Ok(json!({"choices": []})),
            Ok(json!({"x_groq": {"usage": {"total_tokens": 11}}})),
            Ok(json!({"usage": {"total_tokens": 99}})),
        ];
        let mut public = intercept(Arc::clone(&trace), operation, futures::stream::iter(chunks));
        while public.next().await.is_some() {}

        let operations = wait_for_operation(&trace).await;
        let result = operations[0].result.as_ref().unwrap();
        // first appearance wins
        assert_eq!(result.usage, Some(json!({"total_tokens": 11})));
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_surfaced_and_recorded() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        let chunks: Vec<Result<Value>> = vec![
            Ok(chunk(0)),
            Err(ObsyError::ApiError("connection reset".to_string())),
        ];
        let mut public = intercept(Arc::clone(&trace), operation, futures::stream::iter(chunks));

        assert!(public.next().await.unwrap().is_ok());
        match public.next().await.unwrap() {
            Err(ObsyError::ApiError(msg)) => assert_eq!(msg, "connection reset"),
            other => panic!("expected ApiError, got {:?}", other),
        }
        assert!(public.next().await.is_none());

        let operations = wait_for_operation(&trace).await;
        let operation = &operations[0];
        assert!(operation.is_settled());
        assert!(operation.result.is_none());
        assert_eq!(
            operation.error.as_ref().unwrap().message,
            "API error: connection reset"
        );
    }

    #[tokio::test]
    async fn test_slow_public_consumer_does_not_stall_shadow() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        let source = futures::stream::iter((0..5).map(|i| Ok(chunk(i))));
        let mut public = intercept(Arc::clone(&trace), operation, source);

        // consume only the first chunk, then dawdle; the shadow must finalize
        // off the buffered copies regardless
        assert!(public.next().await.unwrap().is_ok());

        let operations = wait_for_operation(&trace).await;
        let result = operations[0].result.as_ref().unwrap();
        assert_eq!(result.value.as_ref().unwrap().as_array().unwrap().len(), 5);

        // the public side still sees every remaining chunk in order
        let mut remaining = Vec::new();
        while let Some(item) = public.next().await {
            remaining.push(item.unwrap());
        }
        assert_eq!(remaining, (1..5).map(chunk).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_producer_finalizes_on_idle_timeout() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        // one chunk, then the producer hangs forever
        let source = async_stream::stream! {
            yield Ok(chunk(0));
            std::future::pending::<()>().await;
        };

        let mut public = intercept(Arc::clone(&trace), operation, source);
        assert!(public.next().await.unwrap().is_ok());

        tokio::time::advance(SHADOW_IDLE_TIMEOUT + Duration::from_secs(1)).await;

        let operations = wait_for_operation(&trace).await;
        assert!(operations[0].is_settled());
        assert!(operations[0].error.is_none());
        let result = operations[0].result.as_ref().unwrap();
        assert_eq!(result.value, Some(Value::Array(vec![chunk(0)])));
    }

    #[tokio::test]
    async fn test_abandoned_public_stream_still_finalizes() {
        let trace = test_trace();
        let operation =
            trace.begin_operation(OperationKind::OpenAiChatCompletion, "openai-chat-stream", vec![]);

        // a producer that never ends on its own
        let source = async_stream::stream! {
            let mut index = 0usize;
            loop {
                yield Ok(chunk(index));
                index += 1;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let mut public = intercept(Arc::clone(&trace), operation, source);
        assert!(public.next().await.unwrap().is_ok());
        drop(public);

        // pump notices the dropped receiver and the shadow finalizes
        let operations = wait_for_operation(&trace).await;
        assert!(operations[0].is_settled());
        assert!(operations[0].result.is_some());
    }
}
