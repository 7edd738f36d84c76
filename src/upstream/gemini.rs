//! Google Gemini `generateContent` client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{fetch, parse_json};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};

/// Header carrying the AI Studio API key.
const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One conversation turn. Also used when reading candidates.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text part. Non-text parts in a response deserialize with empty text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// Structured output: MIME type plus an optional response schema.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    provider: ProviderConfig,
    timeout: Duration,
}

impl GeminiClient {
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

    /// Run one generation and return the text of the first candidate.
    pub async fn generate(&self, body: &GenerateContentRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.provider.url.trim_end_matches('/'),
            self.model()
        );

        tracing::debug!(url = %url, "Calling Gemini generateContent");

        let mut request = self.http.post(&url).json(body);
        if let Some(api_key) = &self.provider.api_key {
            request = request.header(GEMINI_API_KEY_HEADER, api_key.expose_secret());
        }

        let text = fetch(ProviderKind::Gemini, request, self.timeout).await?;
        let response: GenerateContentResponse = parse_json(ProviderKind::Gemini, &text)?;

        candidate_text(response).ok_or_else(|| {
            tracing::error!(body = %text, "Gemini response has no candidate text");
            Error::ResponseFormat("gemini response has no candidate text".to_string())
        })
    }
}

/// Concatenated text parts of the first candidate, if any text is present.
fn candidate_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().map(|part| part.text).collect();
    (!text.is_empty()).then_some(text)
}
