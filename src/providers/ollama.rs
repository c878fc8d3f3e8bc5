use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{build_http_client, join_endpoint, read_body, read_json, Provider};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Additional model parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Context window size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Format to return a response in
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Whether to stream the response
    stream: bool,
}

impl ChatRequest {
    /// Create a non-streaming chat request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: None,
            format: None,
            stream: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    pub fn num_ctx(mut self, num_ctx: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_ctx = Some(num_ctx);
        self
    }

    /// Set the response format, e.g. `json`
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Chat response from the Ollama API
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl Ollama {
    /// Create a new Ollama client from a complete URL
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: url.into(),
            client: build_http_client(timeout),
        }
    }

    /// Join the chunks of a streamed (JSONL) chat reply into one response
    fn merge_stream(body: &str) -> Option<ChatResponse> {
        let chunks: Vec<ChatResponse> = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let last = chunks.last()?.clone();
        let content = chunks.iter().map(|c| c.message.content.as_str()).collect::<String>();
        Some(ChatResponse {
            message: ChatMessage::new("assistant", content),
            done: true,
            ..last
        })
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = join_endpoint(&self.base_url, "api/chat");
        let response = self.client.post(&url).json(&request).send().await?;

        let body = read_body(response, "Ollama").await?;

        // Some server versions stream even when asked not to
        serde_json::from_str::<ChatResponse>(&body).or_else(|e| {
            warn!("Ollama reply is not a single JSON object, trying stream format");
            Self::merge_stream(&body)
                .ok_or_else(|| ProviderError::ParseError(format!("Failed to parse Ollama chat response: {}", e)))
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = join_endpoint(&self.base_url, "api/tags");
        let response = self.client.get(&url).send().await?;
        read_json::<serde_json::Value>(response, "Ollama").await.map(|_| ())
    }

    fn extract_text(response: &ChatResponse) -> String {
        response.message.content.clone()
    }
}
