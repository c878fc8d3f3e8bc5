/*!
 * Translation oracle boundary.
 *
 * The batch translator only sees `TranslationOracle`: an ordered list of
 * strings goes in, an ordered list comes back. `LlmOracle` is the production
 * implementation that renders prompts and talks to one of the configured
 * LLM providers.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_config::{Config, TranslationProvider};
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::gemini::{Gemini, GeminiRequest};
use crate::providers::ollama::{ChatMessage, ChatRequest, Ollama};
use crate::providers::openai::{OpenAI, OpenAIRequest};
use crate::providers::Provider;

use super::prompts;

/// Ordered source strings plus any corrective notes from earlier attempts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest {
    pub items: Vec<String>,
    pub corrections: Vec<String>,
}

impl BatchRequest {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            corrections: Vec::new(),
        }
    }

    /// Append a corrective instruction for the next attempt
    pub fn add_correction(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.corrections.contains(&note) {
            self.corrections.push(note);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Ordered translations; position `i` answers request item `i`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchResponse {
    pub translations: Vec<String>,
}

impl BatchResponse {
    pub fn new(translations: Vec<String>) -> Self {
        Self { translations }
    }

    /// Parse model output: `{"translations": [...]}` or a bare array,
    /// optionally wrapped in a markdown code fence
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let body = strip_code_fence(raw.trim());

        let value: Value = serde_json::from_str(body)
            .or_else(|_| serde_json::from_str(extract_json_span(body)))
            .map_err(|e| ProviderError::ParseError(format!("response is not JSON: {}", e)))?;

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("translations") {
                Some(Value::Array(items)) => items,
                _ => return Err(ProviderError::ParseError("missing 'translations' array".to_string())),
            },
            other => return Err(ProviderError::ParseError(format!("unexpected JSON value: {}", other))),
        };

        let translations = items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();

        Ok(Self { translations })
    }

    /// Reject any response that does not line up one-to-one with the request
    pub fn validate_against(&self, request: &BatchRequest) -> Result<(), TranslationError> {
        if self.translations.len() != request.items.len() {
            return Err(TranslationError::ShapeMismatch {
                expected: request.items.len(),
                actual: self.translations.len(),
            });
        }
        Ok(())
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json) up to the first newline
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Outermost `{...}` or `[...]` span, for replies with chatter around the JSON
fn extract_json_span(text: &str) -> &str {
    let start = text.find(['{', '[']);
    let end = text.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => text,
    }
}

/// Remote translation capability
#[async_trait]
pub trait TranslationOracle: Send + Sync {
    /// Translate every item, preserving order
    async fn translate_batch(&self, request: &BatchRequest) -> Result<BatchResponse, ProviderError>;

    /// Ask for a single line with a plain prompt, used as last resort
    async fn translate_line(&self, text: &str) -> Result<String, ProviderError>;
}

/// Human-readable language names used inside prompts
#[derive(Debug, Clone, PartialEq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Resolve ISO codes from config to English names
    pub fn from_codes(source: &str, target: &str) -> Result<Self> {
        Ok(Self {
            source: language_utils::get_language_name(source)?,
            target: language_utils::get_language_name(target)?,
        })
    }
}

/// Concrete provider client behind the oracle
#[derive(Debug)]
pub enum ProviderClient {
    Gemini(Gemini),
    OpenAI(OpenAI),
    Anthropic(Anthropic),
    Ollama(Ollama),
}

/// Oracle backed by an LLM chat/completion API
#[derive(Debug)]
pub struct LlmOracle {
    client: ProviderClient,
    model: String,
    temperature: f32,
    languages: LanguagePair,
    style_hint: String,
}

impl LlmOracle {
    pub fn new(client: ProviderClient, model: impl Into<String>, temperature: f32, languages: LanguagePair, style_hint: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            languages,
            style_hint: style_hint.into(),
        }
    }

    /// Build the client selected in config
    pub fn from_config(config: &Config) -> Result<Self> {
        let translation = &config.translation;
        let api_key = translation.get_api_key();
        let endpoint = translation.get_endpoint();
        let timeout = translation.get_timeout();

        let client = match translation.provider {
            TranslationProvider::Gemini => ProviderClient::Gemini(Gemini::new(api_key, endpoint, timeout)),
            TranslationProvider::OpenAI => ProviderClient::OpenAI(OpenAI::new(api_key, endpoint, timeout, true)),
            // LM Studio serves the OpenAI API but rejects json_object mode
            TranslationProvider::LMStudio => ProviderClient::OpenAI(OpenAI::new(api_key, endpoint, timeout, false)),
            TranslationProvider::Anthropic => ProviderClient::Anthropic(Anthropic::new(api_key, endpoint, timeout)),
            TranslationProvider::Ollama => ProviderClient::Ollama(Ollama::from_url(endpoint, timeout)),
        };

        let languages = LanguagePair::from_codes(&config.source_language, &config.target_language)
            .map_err(|e| anyhow!("Invalid language configuration: {}", e))?;

        Ok(Self::new(
            client,
            translation.get_model(),
            translation.common.temperature,
            languages,
            translation.common.style_hint.clone(),
        ))
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the provider answers and accepts the configured credentials
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        match &self.client {
            ProviderClient::Gemini(client) => client.test_connection().await,
            ProviderClient::OpenAI(client) => client.test_connection().await,
            ProviderClient::Anthropic(client) => client.test_connection().await,
            ProviderClient::Ollama(client) => client.test_connection().await,
        }
    }

    /// Send one system + user exchange and return the raw text
    async fn complete(&self, system: &str, user: &str, json: bool) -> Result<String, ProviderError> {
        match &self.client {
            ProviderClient::Gemini(client) => {
                let mut request = GeminiRequest::new(&self.model, user)
                    .system(system)
                    .temperature(self.temperature);
                if json {
                    request = request.json_output();
                }
                let response = client.complete(request).await?;
                Ok(Gemini::extract_text(&response))
            }
            ProviderClient::OpenAI(client) => {
                let mut request = OpenAIRequest::new(&self.model)
                    .add_message("system", system)
                    .add_message("user", user)
                    .temperature(self.temperature);
                if json && client.supports_json_mode() {
                    request = request.json_output();
                }
                let response = client.complete(request).await?;
                Ok(OpenAI::extract_text(&response))
            }
            ProviderClient::Anthropic(client) => {
                let request = AnthropicRequest::new(&self.model, 4096)
                    .system(system)
                    .temperature(self.temperature)
                    .add_message("user", user);
                let response = client.complete(request).await?;
                Ok(Anthropic::extract_text(&response))
            }
            ProviderClient::Ollama(client) => {
                let mut request = ChatRequest::new(&self.model, vec![
                    ChatMessage::new("system", system),
                    ChatMessage::new("user", user),
                ])
                .temperature(self.temperature);
                if json {
                    request = request.format("json");
                }
                let response = client.complete(request).await?;
                Ok(Ollama::extract_text(&response))
            }
        }
    }
}

#[async_trait]
impl TranslationOracle for LlmOracle {
    async fn translate_batch(&self, request: &BatchRequest) -> Result<BatchResponse, ProviderError> {
        let system = prompts::batch_system_prompt(&self.languages, &self.style_hint);
        let user = prompts::batch_user_prompt(request)?;
        debug!("Sending batch of {} lines to {}", request.len(), self.model);
        let raw = self.complete(&system, &user, true).await?;
        BatchResponse::parse(&raw)
    }

    async fn translate_line(&self, text: &str) -> Result<String, ProviderError> {
        let prompt = prompts::emergency_prompt(text, &self.languages);
        let raw = self.complete(&prompts::emergency_system_prompt(&self.languages), &prompt, false).await?;
        Ok(raw.trim().trim_matches('"').trim().to_string())
    }
}
