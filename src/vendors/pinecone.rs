//! Pinecone vector index client.
//!
//! Minimal client for the Pinecone query API. [`VectorIndex`] is the capability
//! surface the instrumentation adapters wrap; queries can be scoped to a
//! namespace via [`PineconeIndex::namespace`].

use crate::error::{ObsyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Configuration for connecting to a Pinecone index.
///
/// `base_url` is the index host (Pinecone serves queries per index).
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("PINECONE_API_KEY").unwrap_or_default(),
            base_url: std::env::var("PINECONE_INDEX_HOST").unwrap_or_default(),
        }
    }
}

/// Similarity query against a vector index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub include_metadata: bool,
    pub include_values: bool,
}

impl QueryRequest {
    pub fn new(vector: Vec<f32>, top_k: u32) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
            include_metadata: true,
            include_values: false,
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Result of a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// Capability surface for vector index queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;
}

/// Client for the Pinecone API.
pub struct PineconeClient {
    client: Client,
    config: PineconeConfig,
}

impl PineconeClient {
    /// Create a new client with default configuration.
    pub fn new() -> Self {
        Self::with_config(PineconeConfig::default())
    }

    /// Create a new client with custom configuration.
    pub fn with_config(config: PineconeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Create a client with a custom API key and index host.
    pub fn with_api_key_and_host(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::with_config(PineconeConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    /// Target an index by name.
    pub fn index(&self, name: impl Into<String>) -> PineconeIndex {
        PineconeIndex {
            client: self.client.clone(),
            config: self.config.clone(),
            name: name.into(),
            namespace: None,
        }
    }
}

impl Default for PineconeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one Pinecone index, optionally scoped to a namespace.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    config: PineconeConfig,
    name: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Scope subsequent queries to a namespace.
    pub fn namespace(&self, namespace: impl Into<String>) -> PineconeIndex {
        PineconeIndex {
            namespace: Some(namespace.into()),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespace.is_some()
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        info!(index = %self.name, "Querying vector index");
        debug!(top_k = request.top_k, dimensions = request.vector.len(), "Query request");

        let mut body = serde_json::to_value(&request)?;
        if let Some(namespace) = &self.namespace {
            body["namespace"] = Value::String(namespace.clone());
        }

        let response = self
            .client
            .post(format!("{}/query", self.config.base_url))
            .header("Api-Key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ObsyError::ApiError(format!(
                "pinecone query: {} - {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}
