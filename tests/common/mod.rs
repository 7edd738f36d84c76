//! Shared helpers for the relay integration tests.
//!
//! Every upstream is served by one `wiremock` server, mounted under the
//! path prefix its real API uses.

#![allow(dead_code)]

use axum::body::Body;
use http::{HeaderMap, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use coinscout::config::{
    ApiKey, Config, LoggingConfig, ProviderConfig, ProviderKind, ProvidersConfig, ServerConfig,
    UpstreamConfig,
};
use coinscout::relay::{create_router, AppState};

pub const CHAT_KEY: &str = "chat-test-key";
pub const GEMINI_KEY: &str = "gemini-test-key";
pub const CHAT_MODEL: &str = "test-chat-model";
pub const GEMINI_MODEL: &str = "gemini-test";
pub const GEMINI_PATH: &str = "/v1beta/models/gemini-test:generateContent";
pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const PRICE_PATH: &str = "/api/v3/simple/price";

pub fn chat_provider(base: &str) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Chat,
        url: format!("{}/v1", base),
        model: Some(CHAT_MODEL.to_string()),
        api_key: Some(ApiKey::from(CHAT_KEY)),
    }
}

pub fn gemini_provider(base: &str) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Gemini,
        url: format!("{}/v1beta", base),
        model: Some(GEMINI_MODEL.to_string()),
        api_key: Some(ApiKey::from(GEMINI_KEY)),
    }
}

pub fn price_provider(base: &str) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Prices,
        url: format!("{}/api/v3", base),
        model: None,
        api_key: None,
    }
}

/// Config with every provider pointed at `base`.
pub fn test_config(base: &str) -> Config {
    config_with(ProvidersConfig {
        chat: Some(chat_provider(base)),
        gemini: Some(gemini_provider(base)),
        prices: Some(price_provider(base)),
    })
}

pub fn config_with(providers: ProvidersConfig) -> Config {
    Config {
        server: ServerConfig {
            listen: "127.0.0.1:0".to_string(),
        },
        upstream: UpstreamConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
        },
        providers,
        logging: LoggingConfig::default(),
    }
}

pub fn app(config: Config) -> axum::Router {
    create_router(AppState::from_config(config).expect("build app state"))
}

/// Send a request and return (status, headers, body parsed as JSON or Null).
pub async fn send(
    app: axum::Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, headers, json)
}

pub async fn post_json(app: axum::Router, path: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
    let request = Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Gemini response carrying `text` as the first candidate.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP",
            "index": 0
        }]
    })
}

/// Chat completion response carrying `content`.
pub fn chat_reply(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

pub fn sample_analysis() -> Value {
    json!({
        "Analysis Breakdown": "Price is consolidating after a 2% drop on steady volume.",
        "Recommendation": "Hold",
        "Entry Price": "66500",
        "Take Profit": "70000",
        "Stop Loss": "65000"
    })
}
