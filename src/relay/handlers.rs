//! HTTP request handlers.
//!
//! Each relay endpoint runs the same linear pipeline: validate the body,
//! build the upstream payload, make the upstream call, translate the answer.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::server::{AppState, RequestId};
use super::types::{AnalysisResult, AnalyzeRequest, GenerateResponse, MessageRequest, ReplyResponse};
use crate::config::ProviderKind;
use crate::error::Error;
use crate::payload::{self, OutputFormat};
use crate::upstream;

/// Response header: correlation ID (UUID v4).
pub const COINSCOUT_REQUEST_ID_HEADER: &str = "x-coinscout-request-id";
/// Response header: wall-clock latency in milliseconds (integer).
pub const COINSCOUT_LATENCY_MS_HEADER: &str = "x-coinscout-latency-ms";
/// Response header: upstream that answered (or failed) the request.
pub const COINSCOUT_PROVIDER_HEADER: &str = "x-coinscout-provider";

/// Successful relay, with the provider that produced the answer.
struct RelayOutcome {
    response: Response,
    provider: ProviderKind,
}

/// Failed relay. `provider` is None when no upstream was contacted.
struct RelayError {
    error: Error,
    provider: Option<ProviderKind>,
}

impl RelayError {
    fn local(error: Error) -> Self {
        Self {
            error,
            provider: None,
        }
    }

    fn upstream(provider: ProviderKind) -> impl FnOnce(Error) -> Self {
        move |error| Self {
            error,
            provider: Some(provider),
        }
    }
}

type RelayResult = std::result::Result<RelayOutcome, RelayError>;

fn attach_coinscout_headers(
    response: &mut Response,
    request_id: &RequestId,
    latency_ms: u64,
    provider: Option<ProviderKind>,
) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        headers.insert(HeaderName::from_static(COINSCOUT_REQUEST_ID_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(COINSCOUT_LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms),
    );
    if let Some(kind) = provider {
        headers.insert(
            HeaderName::from_static(COINSCOUT_PROVIDER_HEADER),
            HeaderValue::from_static(kind.name()),
        );
    }
}

/// Log the outcome and turn it into the HTTP response.
fn finish(endpoint: &str, request_id: RequestId, start: Instant, result: RelayResult) -> Response {
    let latency_ms = start.elapsed().as_millis() as u64;

    let (mut response, provider) = match result {
        Ok(outcome) => {
            tracing::info!(
                request_id = %request_id.0,
                endpoint,
                provider = %outcome.provider,
                latency_ms,
                "Relay succeeded"
            );
            (outcome.response, Some(outcome.provider))
        }
        Err(failure) => {
            if let Error::BadRequest(message) = &failure.error {
                tracing::info!(
                    request_id = %request_id.0,
                    endpoint,
                    reason = %message,
                    "Rejected invalid request"
                );
            } else {
                tracing::error!(
                    request_id = %request_id.0,
                    endpoint,
                    provider = ?failure.provider,
                    error = %failure.error,
                    latency_ms,
                    "Relay failed"
                );
            }
            (failure.error.into_response(), failure.provider)
        }
    };

    attach_coinscout_headers(&mut response, &request_id, latency_ms, provider);
    response
}

/// Unwrap the JSON body, treating malformed JSON as a client error.
fn json_body(body: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value, RelayError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| RelayError::local(Error::BadRequest(rejection.body_text())))
}

/// Handle GET /
pub async fn root() -> &'static str {
    "coinscout relay is running"
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<&str> = state
        .upstreams
        .configured()
        .into_iter()
        .map(ProviderKind::name)
        .collect();

    Json(serde_json::json!({
        "status": "ok",
        "service": "coinscout",
        "providers": providers,
    }))
}

/// Handle POST /analyze-crypto
pub async fn analyze_crypto(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = execute_analysis(&state, request_id, body).await;
    finish("analyze-crypto", request_id, start, result)
}

async fn execute_analysis(
    state: &AppState,
    request_id: RequestId,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> RelayResult {
    let body = json_body(body)?;
    let request = AnalyzeRequest::from_json(&body).map_err(RelayError::local)?;

    tracing::info!(
        request_id = %request_id.0,
        coin = %request.coin(),
        "Received analysis request"
    );

    let (coin_name, live_data) = match request {
        AnalyzeRequest::LiveData {
            coin_name,
            live_data,
        } => (coin_name, live_data),
        AnalyzeRequest::CoinId { coin_id } => {
            let prices = state.upstreams.prices().ok_or_else(|| {
                RelayError::local(Error::BadRequest(
                    "coin_id lookups are not enabled; send coin_name and live_data".to_string(),
                ))
            })?;
            let live_data = prices
                .live_data(&coin_id)
                .await
                .map_err(RelayError::upstream(ProviderKind::Prices))?;
            (coin_id, live_data)
        }
    };

    let llm = state
        .upstreams
        .llm(ProviderKind::Gemini)
        .map_err(RelayError::local)?;
    let provider = llm.kind();

    let prompt = payload::analysis_prompt(&coin_name, &live_data);
    let text = llm
        .complete(&prompt, OutputFormat::Json)
        .await
        .map_err(RelayError::upstream(provider))?;
    let analysis: AnalysisResult =
        upstream::parse_json(provider, &text).map_err(RelayError::upstream(provider))?;

    Ok(RelayOutcome {
        response: Json(analysis).into_response(),
        provider,
    })
}

/// Handle POST /ask
pub async fn ask(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = execute_message(&state, request_id, body, ProviderKind::Chat)
        .await
        .map(|(reply, provider)| RelayOutcome {
            response: Json(ReplyResponse { reply }).into_response(),
            provider,
        });
    finish("ask", request_id, start, result)
}

/// Handle POST /generate
pub async fn generate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = execute_message(&state, request_id, body, ProviderKind::Gemini)
        .await
        .map(|(response, provider)| RelayOutcome {
            response: Json(GenerateResponse { response }).into_response(),
            provider,
        });
    finish("generate", request_id, start, result)
}

/// Relay a `{ message }` body to an LLM and return its raw text.
async fn execute_message(
    state: &AppState,
    request_id: RequestId,
    body: std::result::Result<Json<Value>, JsonRejection>,
    preferred: ProviderKind,
) -> std::result::Result<(String, ProviderKind), RelayError> {
    let body = json_body(body)?;
    let request = MessageRequest::from_json(&body).map_err(RelayError::local)?;

    let llm = state.upstreams.llm(preferred).map_err(RelayError::local)?;
    let provider = llm.kind();

    tracing::info!(
        request_id = %request_id.0,
        provider = %provider,
        message_chars = request.message.chars().count(),
        "Received message request"
    );

    let text = llm
        .complete(&request.message, OutputFormat::Text)
        .await
        .map_err(RelayError::upstream(provider))?;

    Ok((text, provider))
}
