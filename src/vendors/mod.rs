//! Vendor clients for the external AI services the SDK can instrument.

pub mod openai;
pub mod pinecone;

pub use openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStream,
    ChatCompletions, ChatMessage, MessageRole, OpenAiClient, OpenAiConfig,
};
pub use pinecone::{
    PineconeClient, PineconeConfig, PineconeIndex, QueryRequest, QueryResponse, VectorIndex,
};
