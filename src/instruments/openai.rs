//! Instrumented wrapper for OpenAI-compatible chat clients.

use crate::context;
use crate::error::Result;
use crate::instruments::serialize_input;
use crate::trace::{stream, OperationKind};
use crate::vendors::openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStream, ChatCompletions,
};
use async_trait::async_trait;
use std::sync::Arc;

/// A chat client whose calls are recorded on the active trace.
///
/// Implements [`ChatCompletions`] itself, so it substitutes for the real
/// client at the call site.
pub struct TracedOpenAi<C> {
    inner: Arc<C>,
}

/// Wrap a chat client so its calls are traced.
pub fn instrument_openai<C>(client: Arc<C>) -> TracedOpenAi<C>
where
    C: ChatCompletions,
{
    TracedOpenAi { inner: client }
}

#[async_trait]
impl<C> ChatCompletions for TracedOpenAi<C>
where
    C: ChatCompletions + 'static,
{
    async fn create(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let Some(trace) = context::current() else {
            return self.inner.create(request).await;
        };

        let inputs = vec![serialize_input(&request)];
        trace
            .record_call(
                OperationKind::OpenAiChatCompletion,
                "openai-chat-completion",
                inputs,
                self.inner.create(request),
            )
            .await
    }

    fn create_stream(&self, request: ChatCompletionRequest) -> ChatCompletionStream {
        let Some(trace) = context::current() else {
            return self.inner.create_stream(request);
        };

        let inputs = vec![serialize_input(&request)];
        let operation = trace.begin_operation(
            OperationKind::OpenAiChatCompletion,
            "openai-chat-stream",
            inputs,
        );
        let source = self.inner.create_stream(request);
        stream::intercept(trace, operation, source)
    }
}
