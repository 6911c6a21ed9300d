//! CoinGecko simple-price adapter, used when the exchange is unreachable or
//! geo-blocked.
//!
//! CoinGecko prices by coin id rather than trading pair, so every symbol
//! needs an id mapping. The simple-price endpoint has no 24h range, so
//! `high_24h` and `low_24h` are always `None`.

use crate::price_source::{now_unix, parse_decimal, validate_price, PriceError, PriceSource};
use async_trait::async_trait;
use overseer_types::PriceQuote;
use std::collections::HashMap;

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const SOURCE_NAME: &str = "coingecko";

/// Base asset → CoinGecko id
const DEFAULT_COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("LINK", "chainlink"),
    ("LTC", "litecoin"),
    ("MATIC", "matic-network"),
];

const QUOTE_SUFFIXES: &[&str] = &["USDT", "USDC", "BUSD", "USD"];

pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    coin_ids: HashMap<String, String>,
}

impl CoinGeckoSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let coin_ids = DEFAULT_COIN_IDS
            .iter()
            .map(|(asset, id)| (asset.to_string(), id.to_string()))
            .collect();
        Self {
            client,
            base_url: base_url.into(),
            coin_ids,
        }
    }

    /// Add or override mappings. Keys may be a base asset or a full pair.
    pub fn with_coin_ids(mut self, extra: impl IntoIterator<Item = (String, String)>) -> Self {
        for (symbol, id) in extra {
            self.coin_ids.insert(symbol.to_uppercase(), id);
        }
        self
    }

    /// Resolve a trading symbol (e.g. `SOLUSDT`) to a CoinGecko id
    pub fn coin_id(&self, symbol: &str) -> Option<&str> {
        let upper = symbol.to_uppercase();
        if let Some(id) = self.coin_ids.get(&upper) {
            return Some(id.as_str());
        }
        self.coin_ids.get(base_asset(&upper)).map(|s| s.as_str())
    }
}

/// Strip a known quote-currency suffix: `SOLUSDT` → `SOL`
fn base_asset(symbol: &str) -> &str {
    for suffix in QUOTE_SUFFIXES {
        if let Some(base) = symbol.strip_suffix(suffix) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    symbol
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let coin_id = self
            .coin_id(symbol)
            .ok_or_else(|| PriceError::UnsupportedSymbol(symbol.to_string()))?
            .to_string();

        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", coin_id.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PriceError::from_status(status.as_u16(), &body));
        }

        parse_simple_price(&body, &coin_id, now_unix())
    }
}

/// Map a `/simple/price` body for one coin id to a quote
pub fn parse_simple_price(
    body: &str,
    coin_id: &str,
    timestamp: f64,
) -> Result<PriceQuote, PriceError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PriceError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

    let entry = json
        .get(coin_id)
        .ok_or_else(|| PriceError::InvalidResponse(format!("No price returned for {}", coin_id)))?;

    let price = entry
        .get("usd")
        .and_then(parse_decimal)
        .ok_or_else(|| PriceError::InvalidResponse(format!("Missing usd price for {}", coin_id)))
        .and_then(|p| validate_price(p, coin_id))?;

    Ok(PriceQuote {
        price,
        high_24h: None,
        low_24h: None,
        volume_24h: entry.get("usd_24h_vol").and_then(parse_decimal),
        change_24h: entry.get("usd_24h_change").and_then(parse_decimal),
        timestamp,
        source: SOURCE_NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CoinGeckoSource {
        CoinGeckoSource::new(reqwest::Client::new(), COINGECKO_API_URL)
    }

    #[test]
    fn test_coin_id_mapping() {
        let cg = source();
        assert_eq!(cg.coin_id("SOLUSDT"), Some("solana"));
        assert_eq!(cg.coin_id("btcusdc"), Some("bitcoin"));
        assert_eq!(cg.coin_id("ETH"), Some("ethereum"));
        assert_eq!(cg.coin_id("CAPSUSDT"), None);
    }

    #[test]
    fn test_custom_mapping_overrides() {
        let cg = source().with_coin_ids([
            ("capsusdt".to_string(), "atomic-fizz-caps".to_string()),
            ("SOL".to_string(), "wrapped-solana".to_string()),
        ]);
        assert_eq!(cg.coin_id("CAPSUSDT"), Some("atomic-fizz-caps"));
        assert_eq!(cg.coin_id("SOLUSDT"), Some("wrapped-solana"));
    }

    #[test]
    fn test_base_asset() {
        assert_eq!(base_asset("SOLUSDT"), "SOL");
        assert_eq!(base_asset("BTCUSD"), "BTC");
        assert_eq!(base_asset("USDT"), "USDT");
        assert_eq!(base_asset("ETH"), "ETH");
    }

    #[test]
    fn test_parse_simple_price() {
        let body = r#"{"solana":{"usd":142.31,"usd_24h_vol":2503118823.5,"usd_24h_change":-1.82}}"#;
        let quote = parse_simple_price(body, "solana", 42.0).unwrap();
        assert_eq!(quote.price, 142.31);
        assert_eq!(quote.volume_24h, Some(2503118823.5));
        assert_eq!(quote.change_24h, Some(-1.82));
        assert!(quote.high_24h.is_none());
        assert!(quote.low_24h.is_none());
        assert_eq!(quote.source, "coingecko");
    }

    #[test]
    fn test_parse_simple_price_missing_coin() {
        assert!(matches!(
            parse_simple_price("{}", "solana", 0.0),
            Err(PriceError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_simple_price(r#"{"solana":{}}"#, "solana", 0.0),
            Err(PriceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_simple_price_rejects_unusable_prices() {
        for body in [
            r#"{"solana":{"usd":0}}"#,
            r#"{"solana":{"usd":-3.5}}"#,
            r#"{"solana":{"usd":"NaN"}}"#,
        ] {
            assert!(
                matches!(
                    parse_simple_price(body, "solana", 0.0),
                    Err(PriceError::InvalidResponse(_))
                ),
                "accepted {}",
                body
            );
        }
    }

    #[test]
    fn test_parse_simple_price_drops_non_finite_optional_fields() {
        let body = r#"{"solana":{"usd":142.31,"usd_24h_vol":"inf","usd_24h_change":"NaN"}}"#;
        let quote = parse_simple_price(body, "solana", 0.0).unwrap();
        assert_eq!(quote.price, 142.31);
        assert!(quote.volume_24h.is_none());
        assert!(quote.change_24h.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_symbol_fails_without_request() {
        let err = source().fetch_quote("CAPSUSDT").await.unwrap_err();
        assert_eq!(err, PriceError::UnsupportedSymbol("CAPSUSDT".to_string()));
    }
}
