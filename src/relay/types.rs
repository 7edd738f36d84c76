//! Caller-facing request and response types.
//!
//! Request bodies arrive as untyped JSON and are checked here, at the
//! boundary, into one of the supported shapes. Presence is all that is
//! checked: live-data values are kept exactly as the caller sent them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Keys of the trading recommendation, in response order.
pub const ANALYSIS_FIELDS: [&str; 5] = [
    "Analysis Breakdown",
    "Recommendation",
    "Entry Price",
    "Take Profit",
    "Stop Loss",
];

/// Body of `POST /analyze-crypto`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeRequest {
    /// The caller already has market data for the coin.
    LiveData { coin_name: String, live_data: LiveData },
    /// Market data is looked up from the price API first.
    CoinId { coin_id: String },
}

/// Current market snapshot for one coin, in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveData {
    pub usd: Value,
    pub usd_24h_vol: Value,
    pub usd_24h_change: Value,
}

/// Body of `POST /ask` and `POST /generate`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRequest {
    pub message: String,
}

/// Five-field trading recommendation returned by `POST /analyze-crypto`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "Analysis Breakdown")]
    pub analysis_breakdown: Value,
    #[serde(rename = "Recommendation")]
    pub recommendation: Value,
    #[serde(rename = "Entry Price")]
    pub entry_price: Value,
    #[serde(rename = "Take Profit")]
    pub take_profit: Value,
    #[serde(rename = "Stop Loss")]
    pub stop_loss: Value,
}

/// Response of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub reply: String,
}

/// Response of `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

fn as_object(body: &Value) -> Result<&Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| Error::BadRequest("Request body must be a JSON object".to_string()))
}

/// A string field that is present and not blank.
fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(Error::BadRequest(format!("{} is required", field))),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(Error::BadRequest(format!("{} must not be empty", field)))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::BadRequest(format!("{} must be a string", field))),
    }
}

/// Any non-null value, taken as given.
fn required_value(obj: &Map<String, Value>, field: &str, path: &str) -> Result<Value> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(Error::BadRequest(format!("{}.{} is required", path, field))),
        Some(Value::String(s)) if s.trim().is_empty() => Err(Error::BadRequest(format!(
            "{}.{} must not be empty",
            path, field
        ))),
        Some(value) => Ok(value.clone()),
    }
}

impl LiveData {
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            Error::BadRequest(
                "live_data must be an object with usd, usd_24h_vol and usd_24h_change".to_string(),
            )
        })?;

        Ok(Self {
            usd: required_value(obj, "usd", "live_data")?,
            usd_24h_vol: required_value(obj, "usd_24h_vol", "live_data")?,
            usd_24h_change: required_value(obj, "usd_24h_change", "live_data")?,
        })
    }
}

impl AnalyzeRequest {
    /// Validate an untyped body into one of the two analysis shapes.
    ///
    /// A body mentioning `coin_name` or `live_data` is held to the live-data
    /// shape even if it also carries `coin_id`.
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = as_object(body)?;

        if obj.contains_key("coin_name") || obj.contains_key("live_data") {
            let coin_name = required_string(obj, "coin_name")?;
            let live_data = match obj.get("live_data") {
                None | Some(Value::Null) => {
                    return Err(Error::BadRequest("live_data is required".to_string()))
                }
                Some(value) => LiveData::from_json(value)?,
            };
            return Ok(AnalyzeRequest::LiveData {
                coin_name,
                live_data,
            });
        }

        if obj.contains_key("coin_id") {
            let coin_id = required_string(obj, "coin_id")?;
            return Ok(AnalyzeRequest::CoinId { coin_id });
        }

        Err(Error::BadRequest(
            "coin_name and live_data, or coin_id, are required".to_string(),
        ))
    }

    /// Coin name or id, for logging.
    pub fn coin(&self) -> &str {
        match self {
            AnalyzeRequest::LiveData { coin_name, .. } => coin_name,
            AnalyzeRequest::CoinId { coin_id } => coin_id,
        }
    }
}

impl MessageRequest {
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = as_object(body)?;
        Ok(Self {
            message: required_string(obj, "message")?,
        })
    }
}
