//! Integration tests for POST /analyze-crypto.
//!
//! Verifies that:
//! - Invalid bodies get 400 and never reach an upstream
//! - A valid body makes exactly one Gemini call with a deterministic payload
//! - A valid five-field answer is returned as-is
//! - Malformed or incomplete answers, upstream errors and timeouts give a
//!   generic 500 after exactly one attempt
//! - The coin_id shape looks up market data first

mod common;

use std::time::Duration;

use http::StatusCode;
use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coinscout::config::ProvidersConfig;
use coinscout::error::UPSTREAM_ERROR_MESSAGE;
use coinscout::payload::{analysis_prompt, chat_payload, gemini_payload, OutputFormat};
use coinscout::relay::LiveData;
use common::*;

fn bitcoin_body() -> serde_json::Value {
    json!({
        "coin_name": "Bitcoin",
        "live_data": { "usd": 67012.5, "usd_24h_vol": 31000000000u64, "usd_24h_change": -2.1 }
    })
}

fn bitcoin_live_data() -> LiveData {
    LiveData {
        usd: json!(67012.5),
        usd_24h_vol: json!(31000000000u64),
        usd_24h_change: json!(-2.1),
    }
}

/// Mock that fails the test if any request reaches the upstream.
async fn forbid_upstream_calls(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_live_data_returns_analysis() {
    let server = MockServer::start().await;
    let expected_payload = gemini_payload(
        &analysis_prompt("Bitcoin", &bitcoin_live_data()),
        OutputFormat::Json,
    );

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", GEMINI_KEY))
        .and(body_json(&expected_payload))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_reply(&sample_analysis().to_string())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = app(test_config(&server.uri()));
    let (status, headers, body) = post_json(app, "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sample_analysis());
    assert_eq!(headers.get("x-coinscout-provider").unwrap(), "gemini");
    assert!(headers.get("x-coinscout-request-id").is_some());
}

#[tokio::test]
async fn test_same_input_same_payload() {
    let server = MockServer::start().await;
    let expected_payload = gemini_payload(
        &analysis_prompt("Bitcoin", &bitcoin_live_data()),
        OutputFormat::Json,
    );

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_json(&expected_payload))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_reply(&sample_analysis().to_string())),
        )
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    for _ in 0..2 {
        let (status, _, _) = post_json(app(config.clone()), "/analyze-crypto", bitcoin_body()).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_missing_fields_rejected_without_upstream_call() {
    let server = MockServer::start().await;
    forbid_upstream_calls(&server).await;
    let config = test_config(&server.uri());

    let cases = [
        (json!({}), "coin_name and live_data, or coin_id, are required"),
        (json!({ "coin_name": "Bitcoin" }), "live_data is required"),
        (
            json!({ "live_data": { "usd": 1, "usd_24h_vol": 2, "usd_24h_change": 3 } }),
            "coin_name is required",
        ),
        (
            json!({ "coin_name": "Bitcoin", "live_data": { "usd": 1, "usd_24h_vol": 2 } }),
            "live_data.usd_24h_change is required",
        ),
        (json!({ "coin_id": "" }), "coin_id must not be empty"),
    ];

    for (body, message) in cases {
        let (status, headers, json) = post_json(app(config.clone()), "/analyze-crypto", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], message);
        assert!(headers.get("x-coinscout-provider").is_none());
    }
}

#[tokio::test]
async fn test_non_json_body_rejected() {
    let server = MockServer::start().await;
    forbid_upstream_calls(&server).await;

    let request = http::Request::post("/analyze-crypto")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, _, json) = send(app(test_config(&server.uri())), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], 400);
}

#[tokio::test]
async fn test_malformed_analysis_json_is_generic_500() {
    let server = MockServer::start().await;
    let malformed = "```json\n{\"Recommendation\": \"Buy\"\n```";

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(malformed)))
        .expect(1)
        .mount(&server)
        .await;

    let (status, headers, json) =
        post_json(app(test_config(&server.uri())), "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], UPSTREAM_ERROR_MESSAGE);
    assert!(!json.to_string().contains("Recommendation"));
    assert_eq!(headers.get("x-coinscout-provider").unwrap(), "gemini");
}

#[tokio::test]
async fn test_incomplete_analysis_is_500() {
    let server = MockServer::start().await;
    let mut partial = sample_analysis();
    partial.as_object_mut().unwrap().remove("Stop Loss");

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(&partial.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let (status, _, json) =
        post_json(app(test_config(&server.uri())), "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], UPSTREAM_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_upstream_503_is_500_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": { "message": "overloaded" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, _, json) =
        post_json(app(test_config(&server.uri())), "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], UPSTREAM_ERROR_MESSAGE);
    assert!(!json.to_string().contains("overloaded"));
}

#[tokio::test]
async fn test_upstream_timeout_is_500_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply(&sample_analysis().to_string()))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.upstream.timeout_secs = 1;

    let started = std::time::Instant::now();
    let (status, _, json) = post_json(app(config), "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], UPSTREAM_ERROR_MESSAGE);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_coin_id_fetches_prices_then_analyzes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .and(query_param("ids", "bitcoin"))
        .and(query_param("vs_currencies", "usd"))
        .and(query_param("include_24hr_vol", "true"))
        .and(query_param("include_24hr_change", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": { "usd": 67012.5, "usd_24h_vol": 31000000000.0, "usd_24h_change": -2.1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let expected_prompt = analysis_prompt(
        "bitcoin",
        &LiveData {
            usd: json!(67012.5),
            usd_24h_vol: json!(31000000000.0),
            usd_24h_change: json!(-2.1),
        },
    );
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_json(gemini_payload(&expected_prompt, OutputFormat::Json)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_reply(&sample_analysis().to_string())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, _, body) = post_json(
        app(test_config(&server.uri())),
        "/analyze-crypto",
        json!({ "coin_id": "bitcoin" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sample_analysis());
}

#[tokio::test]
async fn test_unknown_coin_id_skips_llm() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (status, headers, json) = post_json(
        app(test_config(&server.uri())),
        "/analyze-crypto",
        json!({ "coin_id": "not-a-coin" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["message"], UPSTREAM_ERROR_MESSAGE);
    assert_eq!(headers.get("x-coinscout-provider").unwrap(), "prices");
}

#[tokio::test]
async fn test_coin_id_without_price_provider_is_400() {
    let server = MockServer::start().await;
    forbid_upstream_calls(&server).await;

    let config = config_with(ProvidersConfig {
        chat: None,
        gemini: Some(gemini_provider(&server.uri())),
        prices: None,
    });
    let (status, _, _) =
        post_json(app(config), "/analyze-crypto", json!({ "coin_id": "bitcoin" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_provider_used_when_gemini_absent() {
    let server = MockServer::start().await;
    let prompt = analysis_prompt("Bitcoin", &bitcoin_live_data());

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", format!("Bearer {}", CHAT_KEY).as_str()))
        .and(body_json(chat_payload(CHAT_MODEL, &prompt, OutputFormat::Json)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_reply(&sample_analysis().to_string())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_with(ProvidersConfig {
        chat: Some(chat_provider(&server.uri())),
        gemini: None,
        prices: None,
    });
    let (status, headers, body) = post_json(app(config), "/analyze-crypto", bitcoin_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, sample_analysis());
    assert_eq!(headers.get("x-coinscout-provider").unwrap(), "chat");
}
