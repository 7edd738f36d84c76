//! Upstream invocation and response translation.
//!
//! Each client makes exactly one HTTP call per invocation, bounded by the
//! configured timeout, and never retries. Failure detail is logged here and
//! reduced to an [`Error`] whose caller-facing text is generic.

pub mod chat;
pub mod gemini;
pub mod prices;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::{Config, ProviderKind};
use crate::error::{Error, Result};
use crate::payload::{self, OutputFormat};

pub use chat::ChatClient;
pub use gemini::GeminiClient;
pub use prices::PriceClient;

/// Send a request and return the body of a 2xx response.
///
/// The whole exchange (connect, send, read body) runs under `timeout`;
/// expiry, transport errors and non-2xx statuses are all `UpstreamUnavailable`.
pub(crate) async fn fetch(
    kind: ProviderKind,
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<String> {
    let call = async {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, provider = %kind, "Failed to reach upstream");
            Error::UpstreamUnavailable(format!("failed to reach {}: {}", kind, e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, provider = %kind, "Failed to read upstream response");
            Error::UpstreamUnavailable(format!("failed to read {} response: {}", kind, e))
        })?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                provider = %kind,
                body = %body,
                "Upstream returned error"
            );
            return Err(Error::UpstreamUnavailable(format!(
                "{} returned {}",
                kind, status
            )));
        }

        Ok(body)
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                provider = %kind,
                timeout_ms = timeout.as_millis() as u64,
                "Upstream call timed out"
            );
            Err(Error::UpstreamUnavailable(format!(
                "{} did not respond within {:?}",
                kind, timeout
            )))
        }
    }
}

/// Parse upstream text as JSON. No lenient recovery is attempted.
pub fn parse_json<T: DeserializeOwned>(kind: ProviderKind, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, provider = %kind, body = %text, "Malformed upstream JSON");
        Error::ResponseFormat(format!("{} returned malformed JSON: {}", kind, e))
    })
}

/// A configured LLM provider, chosen per endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Llm<'a> {
    Chat(&'a ChatClient),
    Gemini(&'a GeminiClient),
}

impl Llm<'_> {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Llm::Chat(_) => ProviderKind::Chat,
            Llm::Gemini(_) => ProviderKind::Gemini,
        }
    }

    /// Build the provider's payload for `prompt` and return the answer text.
    pub async fn complete(&self, prompt: &str, output: OutputFormat) -> Result<String> {
        match self {
            Llm::Chat(client) => {
                let body = payload::chat_payload(client.model(), prompt, output);
                client.complete(&body).await
            }
            Llm::Gemini(client) => {
                let body = payload::gemini_payload(prompt, output);
                client.generate(&body).await
            }
        }
    }
}

/// The upstream clients built from configuration at startup.
#[derive(Debug, Clone)]
pub struct Upstreams {
    chat: Option<ChatClient>,
    gemini: Option<GeminiClient>,
    prices: Option<PriceClient>,
}

impl Upstreams {
    pub fn new(http: Client, config: &Config) -> Self {
        let timeout = config.upstream.timeout();
        let providers = &config.providers;

        Self {
            chat: providers
                .chat
                .clone()
                .map(|p| ChatClient::new(http.clone(), p, timeout)),
            gemini: providers
                .gemini
                .clone()
                .map(|p| GeminiClient::new(http.clone(), p, timeout)),
            prices: providers
                .prices
                .clone()
                .map(|p| PriceClient::new(http.clone(), p, timeout)),
        }
    }

    /// The `preferred` LLM if configured, otherwise the other one.
    pub fn llm(&self, preferred: ProviderKind) -> Result<Llm<'_>> {
        let chat = self.chat.as_ref().map(Llm::Chat);
        let gemini = self.gemini.as_ref().map(Llm::Gemini);

        let choice = match preferred {
            ProviderKind::Chat => chat.or(gemini),
            _ => gemini.or(chat),
        };

        choice.ok_or_else(|| Error::Internal("no LLM provider configured".to_string()))
    }

    pub fn prices(&self) -> Option<&PriceClient> {
        self.prices.as_ref()
    }

    /// Kinds of the configured providers, in a stable order.
    pub fn configured(&self) -> Vec<ProviderKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.chat.is_some() {
            kinds.push(ProviderKind::Chat);
        }
        if self.gemini.is_some() {
            kinds.push(ProviderKind::Gemini);
        }
        if self.prices.is_some() {
            kinds.push(ProviderKind::Prices);
        }
        kinds
    }
}
