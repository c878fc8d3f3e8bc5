/*!
 * Provider implementations for the LLM services used as translation oracle.
 *
 * This module contains client implementations for:
 * - Gemini: Google Generative Language API (default)
 * - OpenAI: OpenAI API and OpenAI-compatible servers such as LM Studio
 * - Anthropic: Anthropic Messages API
 * - Ollama: Local LLM server
 */

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;
use log::error;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// Each client owns its wire types; callers build a `Request`, send it with
/// `complete` and read the generated text back with `extract_text`.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Check that the service is reachable and the credentials are accepted
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// HTTP client shared by every provider, bounded by the configured timeout
pub(crate) fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// Map non-success statuses to `ProviderError` and return the raw body
pub(crate) async fn read_body(response: Response, provider: &str) -> Result<String, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        error!("{} API error ({}): {}", provider, status, error_text);
        return Err(ProviderError::from_status(status.as_u16(), error_text));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::ConnectionError(format!("Failed to read {} response: {}", provider, e)))
}

/// `read_body` followed by JSON decoding
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, provider: &str) -> Result<T, ProviderError> {
    let body = read_body(response, provider).await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        ProviderError::ParseError(format!("Failed to parse {} response: {} ({})", provider, e, preview))
    })
}

/// Join an endpoint and a path without doubling slashes
pub(crate) fn join_endpoint(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;
