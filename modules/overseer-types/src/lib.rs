//! Shared types for the overseer service and its RPC clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =====================================================
// Price Types
// =====================================================

/// A normalized price/volume snapshot for one symbol from one provider.
///
/// `None` in any of the 24h fields means the provider did not report it.
/// It is never a stand-in for zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub change_24h: Option<f64>,
    /// Unix seconds
    pub timestamp: f64,
    pub source: String,
}

/// Static monitoring configuration for one symbol, loaded once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub symbol: String,
    pub provider: String,
    /// Percent, > 0
    pub alert_threshold_up: f64,
    /// Percent, > 0
    pub alert_threshold_down: f64,
    pub check_interval_secs: u64,
}

impl MonitorConfig {
    /// Key under which this monitor's last quote is cached
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.symbol, self.provider)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

// =====================================================
// Health / Activity / Alert Types
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    Disabled,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health of one external dependency
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_check: Option<String>,
    pub last_success: Option<String>,
    pub error: Option<String>,
}

/// One line of bot activity shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
}

/// An alert received from an external system or raised by the price monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub source: String,
    pub data: serde_json::Value,
    pub message: String,
}

// =====================================================
// Game Events (webhook payloads)
// =====================================================

/// Events relayed from the game wallet. Senders are inconsistent about
/// types: amounts stay raw JSON values, and text fields also accept numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Perk {
        #[serde(default, deserialize_with = "lenient_text")]
        perk: Option<String>,
    },
    Quest {
        #[serde(default, deserialize_with = "lenient_text")]
        code: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        message: Option<String>,
    },
    Swap {
        amount: Option<serde_json::Value>,
        #[serde(rename = "from", default, deserialize_with = "lenient_text")]
        from_token: Option<String>,
        #[serde(rename = "to", default, deserialize_with = "lenient_text")]
        to_token: Option<String>,
    },
    Moonpay {
        amount: Option<serde_json::Value>,
    },
    Nft {
        #[serde(default, deserialize_with = "lenient_text")]
        action: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        name: Option<String>,
    },
    Claim {
        #[serde(default, deserialize_with = "lenient_text")]
        location: Option<String>,
        caps: Option<serde_json::Value>,
    },
    LevelUp {
        level: Option<serde_json::Value>,
        #[serde(default, deserialize_with = "lenient_text")]
        player: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Accept a string, number or boolean where text is expected
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::Perk { .. } => "perk",
            GameEvent::Quest { .. } => "quest",
            GameEvent::Swap { .. } => "swap",
            GameEvent::Moonpay { .. } => "moonpay",
            GameEvent::Nft { .. } => "nft",
            GameEvent::Claim { .. } => "claim",
            GameEvent::LevelUp { .. } => "level_up",
            GameEvent::Unknown => "unknown",
        }
    }
}

// =====================================================
// RPC Request / Response Types
// =====================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventAck {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub monitors: Vec<MonitorConfig>,
    pub cached_prices: usize,
    pub last_cycle_at: Option<String>,
    pub publisher: String,
}
