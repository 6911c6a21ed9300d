//! Price source abstraction shared by the exchange adapter and its fallbacks.

use crate::log_gate::CONFIG_ERROR;
use async_trait::async_trait;
use overseer_types::PriceQuote;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Substrings providers use when refusing service by region
const GEO_RESTRICTION_MARKERS: &[&str] = &[
    "restricted location",
    "not available in your region",
    "geo",
];

/// Error kinds that clear once a source answers again
pub const TRANSIENT_KINDS: &[&str] = &[
    "geo_restricted",
    "rate_limited",
    "network",
    "http",
    "invalid_response",
];

#[derive(Debug, Clone, PartialEq)]
pub enum PriceError {
    /// Provider refused based on request origin (HTTP 451 or message pattern)
    GeoRestricted(String),
    RateLimited,
    /// Transport failure, including timeouts
    Network(String),
    Http { status: u16, message: String },
    InvalidResponse(String),
    /// No fallback id is known for this symbol
    UnsupportedSymbol(String),
    Configuration(String),
}

impl PriceError {
    /// Key used by the log gate
    pub fn kind(&self) -> &'static str {
        match self {
            PriceError::GeoRestricted(_) => "geo_restricted",
            PriceError::RateLimited => "rate_limited",
            PriceError::Network(_) => "network",
            PriceError::Http { .. } => "http",
            PriceError::InvalidResponse(_) => "invalid_response",
            PriceError::UnsupportedSymbol(_) | PriceError::Configuration(_) => CONFIG_ERROR,
        }
    }

    pub fn is_geo_restricted(&self) -> bool {
        matches!(self, PriceError::GeoRestricted(_))
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        if is_geo_restriction(Some(status), body) {
            PriceError::GeoRestricted(truncate_error(body).to_string())
        } else if status == 429 || status == 418 {
            PriceError::RateLimited
        } else {
            PriceError::Http {
                status,
                message: truncate_error(body).to_string(),
            }
        }
    }
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceError::GeoRestricted(msg) => write!(f, "Geo-restricted: {}", msg),
            PriceError::RateLimited => write!(f, "Rate limited"),
            PriceError::Network(msg) => write!(f, "Network error: {}", msg),
            PriceError::Http { status, message } => write!(f, "[HTTP {}] {}", status, message),
            PriceError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            PriceError::UnsupportedSymbol(symbol) => write!(f, "Unsupported Symbol: {}", symbol),
            PriceError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for PriceError {}

impl From<reqwest::Error> for PriceError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(451) {
            return PriceError::GeoRestricted(e.to_string());
        }
        if e.is_timeout() {
            PriceError::Network(format!("request timed out: {}", e))
        } else {
            PriceError::Network(e.to_string())
        }
    }
}

/// True when a status code or message carries a geo-restriction signature
pub fn is_geo_restriction(status: Option<u16>, message: &str) -> bool {
    if status == Some(451) {
        return true;
    }
    let lower = message.to_lowercase();
    GEO_RESTRICTION_MARKERS.iter().any(|m| lower.contains(m))
}

/// One upstream price API
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceError>;
}

pub fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Providers send decimals either as JSON numbers or as strings. Non-finite
/// values are rejected: they do not survive a JSON round-trip.
pub fn parse_decimal(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// A quote price must be finite and strictly positive
pub fn validate_price(price: f64, context: &str) -> Result<f64, PriceError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PriceError::InvalidResponse(format!(
            "Non-positive price {} for {}",
            price, context
        )))
    }
}

pub fn truncate_error(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_restriction_detection() {
        assert!(is_geo_restriction(Some(451), ""));
        assert!(is_geo_restriction(
            Some(403),
            r#"{"code":0,"msg":"Service unavailable from a restricted location"}"#
        ));
        assert!(is_geo_restriction(None, "This service is NOT AVAILABLE IN YOUR REGION"));
        assert!(is_geo_restriction(None, "geo block"));
        assert!(!is_geo_restriction(Some(500), "internal error"));
    }

    #[test]
    fn test_from_status_classification() {
        assert!(PriceError::from_status(451, "").is_geo_restricted());
        assert_eq!(PriceError::from_status(429, "slow down"), PriceError::RateLimited);
        assert_eq!(PriceError::from_status(418, "banned"), PriceError::RateLimited);
        match PriceError::from_status(502, "bad gateway") {
            PriceError::Http { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_config_class_kinds() {
        assert_eq!(PriceError::UnsupportedSymbol("FOO".into()).kind(), CONFIG_ERROR);
        assert_eq!(PriceError::Configuration("bad".into()).kind(), CONFIG_ERROR);
        assert_eq!(PriceError::RateLimited.kind(), "rate_limited");
        assert!(TRANSIENT_KINDS.contains(&PriceError::Network("x".into()).kind()));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(&serde_json::json!("142.50")), Some(142.5));
        assert_eq!(parse_decimal(&serde_json::json!(3)), Some(3.0));
        assert_eq!(parse_decimal(&serde_json::json!(null)), None);
        assert_eq!(parse_decimal(&serde_json::json!("n/a")), None);
        assert_eq!(parse_decimal(&serde_json::json!("NaN")), None);
        assert_eq!(parse_decimal(&serde_json::json!("inf")), None);
        assert_eq!(parse_decimal(&serde_json::json!("-infinity")), None);
    }

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price(0.5, "SOLUSDT"), Ok(0.5));
        assert!(matches!(
            validate_price(0.0, "SOLUSDT"),
            Err(PriceError::InvalidResponse(_))
        ));
        assert!(validate_price(-2.0, "SOLUSDT").is_err());
        assert!(validate_price(f64::NAN, "SOLUSDT").is_err());
    }

    #[test]
    fn test_truncate_error_is_char_safe() {
        let long = "é".repeat(300);
        assert_eq!(truncate_error(&long).chars().count(), 200);
        assert_eq!(truncate_error("short"), "short");
    }
}
