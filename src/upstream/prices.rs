//! CoinGecko simple-price client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::{fetch, parse_json};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::relay::types::LiveData;

/// Header carrying a CoinGecko demo API key.
const COINGECKO_API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// One coin's entry in a `/simple/price` response.
#[derive(Debug, Deserialize)]
struct CoinQuote {
    usd: Option<f64>,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PriceClient {
    http: Client,
    provider: ProviderConfig,
    timeout: Duration,
}

impl PriceClient {
    pub fn new(http: Client, provider: ProviderConfig, timeout: Duration) -> Self {
        Self {
            http,
            provider,
            timeout,
        }
    }

    /// Current USD price, 24h volume and 24h change for `coin_id`.
    pub async fn live_data(&self, coin_id: &str) -> Result<LiveData> {
        let id = coin_id.trim().to_lowercase();
        let url = format!("{}/simple/price", self.provider.url.trim_end_matches('/'));

        tracing::debug!(url = %url, coin_id = %id, "Fetching live market data");

        let mut request = self.http.get(&url).query(&[
            ("ids", id.as_str()),
            ("vs_currencies", "usd"),
            ("include_24hr_vol", "true"),
            ("include_24hr_change", "true"),
        ]);
        if let Some(api_key) = &self.provider.api_key {
            request = request.header(COINGECKO_API_KEY_HEADER, api_key.expose_secret());
        }

        let text = fetch(ProviderKind::Prices, request, self.timeout).await?;
        let mut quotes: HashMap<String, CoinQuote> = parse_json(ProviderKind::Prices, &text)?;

        let quote = quotes.remove(&id).ok_or_else(|| {
            tracing::error!(coin_id = %id, body = %text, "Price API returned no data for coin");
            Error::ResponseFormat(format!("price API has no data for '{}'", id))
        })?;

        to_live_data(&id, quote)
    }
}

fn to_live_data(id: &str, quote: CoinQuote) -> Result<LiveData> {
    match (quote.usd, quote.usd_24h_vol, quote.usd_24h_change) {
        (Some(usd), Some(volume), Some(change)) => Ok(LiveData {
            usd: usd.into(),
            usd_24h_vol: volume.into(),
            usd_24h_change: change.into(),
        }),
        _ => {
            tracing::error!(coin_id = %id, "Price API response is missing a market field");
            Err(Error::ResponseFormat(format!(
                "price API response for '{}' is incomplete",
                id
            )))
        }
    }
}
