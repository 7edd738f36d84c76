//! OpenAI-compatible chat-completion gateway client.

use std::time::Duration;

use reqwest::header;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{fetch, parse_json};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};

/// Chat completion request (OpenAI-compatible subset).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Structured-output switch, e.g. `{"type": "json_object"}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// The part of a chat completion response we read.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for `POST {url}/chat/completions` with bearer-token auth.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    provider: ProviderConfig,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(http: Client, provider: ProviderConfig, timeout: Duration) -> Self {
        Self {
            http,
            provider,
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Send one completion request and return `choices[0].message.content`.
    pub async fn complete(&self, body: &ChatCompletionRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.provider.url.trim_end_matches('/')
        );

        tracing::debug!(url = %url, model = %body.model, "Calling chat completion gateway");

        let mut request = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);

        if let Some(api_key) = &self.provider.api_key {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let text = fetch(ProviderKind::Chat, request, self.timeout).await?;
        let response: ChatCompletionResponse = parse_json(ProviderKind::Chat, &text)?;

        extract_content(response).ok_or_else(|| {
            tracing::error!(body = %text, "Chat completion response has no message content");
            Error::ResponseFormat("chat completion response has no message content".to_string())
        })
    }
}

fn extract_content(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}
