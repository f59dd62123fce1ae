//! Obsy client configuration and trace shipping.
//!
//! [`ObsyClient`] is the process-wide handle holding credentials, the sink
//! location, and the sensitive-key set. It is immutable after construction and
//! shared by every trace via `Arc`. Shipping is best-effort: a failed delivery
//! is logged and the trace dropped, never surfaced to the host application.

use crate::error::{ObsyError, Result};
use crate::redact::default_sensitive_keys;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default collector endpoint.
pub const DEFAULT_SINK_URL: &str = "https://api.obsy.dev/v1";

/// Configuration for connecting to the obsy collector.
#[derive(Debug, Clone)]
pub struct ObsyConfig {
    pub api_key: String,
    pub project_id: String,
    pub sink_url: String,
    pub sensitive_keys: HashSet<String>,
}

impl Default for ObsyConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OBSY_API_KEY").unwrap_or_default(),
            project_id: std::env::var("OBSY_PROJECT_ID").unwrap_or_default(),
            sink_url: std::env::var("OBSY_SINK_URL")
                .unwrap_or_else(|_| DEFAULT_SINK_URL.to_string()),
            sensitive_keys: default_sensitive_keys(),
        }
    }
}

/// Process-wide client for the obsy collector.
pub struct ObsyClient {
    config: ObsyConfig,
    http: Client,
}

impl ObsyClient {
    /// Create a new client with the default sink URL and sensitive-key set.
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_config(ObsyConfig {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Default::default()
        })
    }

    /// Create a new client with custom configuration.
    pub fn with_config(config: ObsyConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Create a client from `OBSY_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(ObsyConfig::default())
    }

    /// Replace the sink URL.
    pub fn with_sink_url(mut self, sink_url: impl Into<String>) -> Self {
        self.config.sink_url = sink_url.into();
        self
    }

    /// Replace the sensitive-key set used by redaction.
    pub fn with_sensitive_keys(mut self, sensitive_keys: HashSet<String>) -> Self {
        self.config.sensitive_keys = sensitive_keys;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    pub fn sensitive_keys(&self) -> &HashSet<String> {
        &self.config.sensitive_keys
    }

    /// Ship one completed trace payload to the collector.
    ///
    /// Exactly one delivery attempt is made. A non-2xx response or transport
    /// failure is logged and the trace is dropped - delivery failures must
    /// never reach the host application's request path.
    pub async fn send_trace(&self, payload: Value) {
        if let Err(err) = self.try_send(&payload).await {
            warn!(error = %err, "Failed to deliver trace, dropping");
        }
    }

    async fn try_send(&self, payload: &Value) -> Result<()> {
        let url = format!(
            "{}/projects/{}/traces",
            self.config.sink_url, self.config.project_id
        );

        debug!(url = %url, "Shipping trace to collector");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ObsyError::SinkError(format!(
                "collector returned {}",
                response.status()
            )));
        }

        debug!(status = %response.status(), "Trace delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_uses_default_sink_and_keys() {
        let client = ObsyClient::new("key", "project-1");

        assert_eq!(client.project_id(), "project-1");
        assert_eq!(client.config.sink_url, DEFAULT_SINK_URL);
        assert!(client.sensitive_keys().contains("password"));
    }

    #[test]
    fn test_builder_overrides() {
        let keys: HashSet<String> = ["custom".to_string()].into_iter().collect();
        let client = ObsyClient::new("key", "project-1")
            .with_sink_url("http://localhost:4000")
            .with_sensitive_keys(keys);

        assert_eq!(client.config.sink_url, "http://localhost:4000");
        assert!(client.sensitive_keys().contains("custom"));
        assert!(!client.sensitive_keys().contains("password"));
    }

    #[tokio::test]
    async fn test_send_trace_posts_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/projects/project-1/traces")
            .match_header("authorization", "Bearer key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"id":"trace-1"}"#.to_string(),
            ))
            .with_status(201)
            .create_async()
            .await;

        let client = ObsyClient::new("key", "project-1").with_sink_url(server.url());
        client.send_trace(json!({"id": "trace-1"})).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_trace_drops_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/projects/project-1/traces")
            .with_status(500)
            .create_async()
            .await;

        let client = ObsyClient::new("key", "project-1").with_sink_url(server.url());

        // must not panic or surface the failure
        client.send_trace(json!({"id": "trace-1"})).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_maps_to_sink_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/projects/project-1/traces")
            .with_status(503)
            .create_async()
            .await;

        let client = ObsyClient::new("key", "project-1").with_sink_url(server.url());

        match client.try_send(&json!({"id": "trace-1"})).await {
            Err(ObsyError::SinkError(msg)) => assert!(msg.contains("503")),
            other => panic!("expected SinkError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_trace_drops_on_transport_failure() {
        // unroutable port - connection refused
        let client =
            ObsyClient::new("key", "project-1").with_sink_url("http://127.0.0.1:1/unreachable");

        client.send_trace(json!({"id": "trace-1"})).await;
    }
}
