//! Binance 24h ticker adapter, the primary price source.
//!
//! Binance refuses some regions with HTTP 451 (or a "restricted location"
//! message on other status codes); those surface as `GeoRestricted` so the
//! resolver can fall through to the next source.

use crate::price_source::{
    is_geo_restriction, now_unix, parse_decimal, truncate_error, validate_price, PriceError,
    PriceSource,
};
use async_trait::async_trait;
use overseer_types::PriceQuote;

pub const BINANCE_API_URL: &str = "https://api.binance.com";
pub const SOURCE_NAME: &str = "binance";

pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn ticker_url(&self) -> String {
        format!("{}/api/v3/ticker/24hr", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let response = self
            .client
            .get(self.ticker_url())
            .query(&[("symbol", symbol.to_uppercase())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PriceError::from_status(status.as_u16(), &body));
        }

        parse_ticker(&body, now_unix())
    }
}

/// Map a `/api/v3/ticker/24hr` body to a quote
pub fn parse_ticker(body: &str, timestamp: f64) -> Result<PriceQuote, PriceError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PriceError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

    let price = match json.get("lastPrice").and_then(parse_decimal) {
        Some(p) => validate_price(p, "lastPrice")?,
        None => {
            let msg = json
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or("missing lastPrice");
            if is_geo_restriction(None, msg) {
                return Err(PriceError::GeoRestricted(msg.to_string()));
            }
            return Err(PriceError::InvalidResponse(truncate_error(msg).to_string()));
        }
    };

    let field = |name: &str| json.get(name).and_then(parse_decimal);

    Ok(PriceQuote {
        price,
        high_24h: field("highPrice"),
        low_24h: field("lowPrice"),
        volume_24h: field("volume"),
        change_24h: field("priceChangePercent"),
        timestamp,
        source: SOURCE_NAME.to_string(),
    })
}
