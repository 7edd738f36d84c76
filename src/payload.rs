//! Payload builder: maps validated requests onto upstream request bodies.
//!
//! Everything here is pure. The same input always produces the same body,
//! which is what lets the integration tests match upstream calls exactly.

use serde_json::{json, Value};

use crate::relay::types::{LiveData, ANALYSIS_FIELDS};
use crate::upstream::chat::{ChatCompletionRequest, Message, ResponseFormat};
use crate::upstream::gemini::{Content, GenerateContentRequest, GenerationConfig, Part};

/// What the caller expects the model to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Free text, relayed unmodified.
    Text,
    /// A JSON object with the analysis keys, requested through the
    /// provider's structured-output option.
    Json,
}

/// Chat-completion body: `{ model, messages: [{ role: "user", content }] }`.
pub fn chat_payload(model: &str, content: &str, output: OutputFormat) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![Message {
            role: "user".to_string(),
            content: content.to_string(),
        }],
        response_format: match output {
            OutputFormat::Text => None,
            OutputFormat::Json => Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        },
    }
}

/// Gemini generateContent body with a single user turn.
pub fn gemini_payload(prompt: &str, output: OutputFormat) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        }],
        generation_config: match output {
            OutputFormat::Text => None,
            OutputFormat::Json => Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(analysis_schema()),
            }),
        },
    }
}

/// Gemini response schema forcing the five analysis keys.
fn analysis_schema() -> Value {
    let properties: serde_json::Map<String, Value> = ANALYSIS_FIELDS
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "STRING" })))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ANALYSIS_FIELDS,
        "propertyOrdering": ANALYSIS_FIELDS,
    })
}

/// Strings go in raw, anything else as its JSON text.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Trading-analysis prompt for one coin.
///
/// Caller values are substituted verbatim; nothing is escaped or validated.
pub fn analysis_prompt(coin_name: &str, live_data: &LiveData) -> String {
    format!(
        r#"You are an expert cryptocurrency trading analyst.
Analyze the following live market data for {coin}:

- Current Price (USD): {usd}
- 24h Trading Volume (USD): {volume}
- 24h Price Change (%): {change}

Based only on this data, produce a short-term trading plan with exactly these five fields:
1. "Analysis Breakdown": two or three sentences on momentum, volume and volatility.
2. "Recommendation": one of "Buy", "Sell" or "Hold".
3. "Entry Price": suggested entry price in USD.
4. "Take Profit": take-profit target in USD.
5. "Stop Loss": stop-loss level in USD.

Respond only with a single JSON object containing these five keys and no other text."#,
        coin = coin_name,
        usd = render_value(&live_data.usd),
        volume = render_value(&live_data.usd_24h_vol),
        change = render_value(&live_data.usd_24h_change),
    )
}
