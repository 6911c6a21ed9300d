//! Service configuration, read once at start-up from the environment
//! (after `.env` has been loaded).

use crate::binance::{self, BINANCE_API_URL};
use crate::coingecko::COINGECKO_API_URL;
use crate::twitter_api::TwitterCredentials;
use overseer_types::MonitorConfig;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 9110;
pub const DEFAULT_MONITORS: &str = "SOLUSDT,BTCUSDT,ETHUSDT";
pub const DEFAULT_DIAGNOSTIC_CRON: &str = "0 0 8 * * *";
pub const DEFAULT_GAME_LINK: &str = "https://www.atomicfizzcaps.xyz";
pub const DEFAULT_BROADCAST_MIN_MINUTES: u64 = 120;
pub const DEFAULT_BROADCAST_MAX_MINUTES: u64 = 240;

/// Fallback values for fields a `PRICE_MONITORS` entry leaves out
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorDefaults {
    pub provider: String,
    pub threshold_up: f64,
    pub threshold_down: f64,
    pub check_interval_secs: u64,
}

/// An external system polled for status and alerts
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEndpoint {
    /// Health registry key
    pub name: String,
    /// Source label on stored alerts
    pub source: String,
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Also poll `/api/alerts`
    pub poll_alerts: bool,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub cache_path: PathBuf,
    pub monitors: Vec<MonitorConfig>,
    pub request_timeout_secs: u64,
    pub binance_url: String,
    pub coingecko_url: String,
    /// Extra symbol → CoinGecko id mappings
    pub coingecko_ids: Vec<(String, String)>,
    pub bot_ai: ExternalEndpoint,
    pub token_scalper: ExternalEndpoint,
    pub poll_interval_secs: u64,
    pub twitter: Option<TwitterCredentials>,
    pub diagnostic_schedule: cron::Schedule,
    /// Broadcast period is drawn from this range once at start-up
    pub broadcast_minutes: (u64, u64),
    pub game_link: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = MonitorDefaults {
            provider: binance::SOURCE_NAME.to_string(),
            threshold_up: parse_or(&get, "PRICE_ALERT_THRESHOLD_UP", 5.0)?,
            threshold_down: parse_or(&get, "PRICE_ALERT_THRESHOLD_DOWN", 5.0)?,
            check_interval_secs: parse_or(&get, "PRICE_CHECK_INTERVAL", 300)?,
        };
        let monitors = parse_monitors(
            &get("PRICE_MONITORS").unwrap_or_else(|| DEFAULT_MONITORS.to_string()),
            &defaults,
        )?;

        let cron_expr =
            get("DIAGNOSTIC_CRON").unwrap_or_else(|| DEFAULT_DIAGNOSTIC_CRON.to_string());
        let diagnostic_schedule = cron::Schedule::from_str(&cron_expr)
            .map_err(|e| format!("Invalid DIAGNOSTIC_CRON '{}': {}", cron_expr, e))?;

        let request_timeout_secs = parse_or(&get, "REQUEST_TIMEOUT", 5)?;
        if request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT must be at least 1 second".to_string());
        }
        let poll_interval_secs = parse_or(&get, "POLL_INTERVAL", 15)?;
        if poll_interval_secs == 0 {
            return Err("POLL_INTERVAL must be at least 1 second".to_string());
        }

        let broadcast_min =
            parse_or(&get, "BROADCAST_MIN_INTERVAL", DEFAULT_BROADCAST_MIN_MINUTES)?;
        let broadcast_max =
            parse_or(&get, "BROADCAST_MAX_INTERVAL", DEFAULT_BROADCAST_MAX_MINUTES)?;
        if broadcast_min == 0 || broadcast_min > broadcast_max {
            return Err(format!(
                "Broadcast interval range {}..={} minutes is invalid",
                broadcast_min, broadcast_max
            ));
        }

        let coingecko_ids = match get("COINGECKO_IDS") {
            Some(raw) => parse_coin_ids(&raw)?,
            None => Vec::new(),
        };

        let twitter = match (
            get("TWITTER_CONSUMER_KEY"),
            get("TWITTER_CONSUMER_SECRET"),
            get("TWITTER_ACCESS_TOKEN"),
            get("TWITTER_ACCESS_TOKEN_SECRET"),
        ) {
            (
                Some(consumer_key),
                Some(consumer_secret),
                Some(access_token),
                Some(access_token_secret),
            ) => Some(TwitterCredentials {
                consumer_key,
                consumer_secret,
                access_token,
                access_token_secret,
            }),
            _ => None,
        };

        Ok(Self {
            bind: get("OVERSEER_BIND").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "OVERSEER_PORT", DEFAULT_PORT)?,
            cache_path: PathBuf::from(
                get("PRICE_CACHE_PATH").unwrap_or_else(|| "./price_cache.json".to_string()),
            ),
            monitors,
            request_timeout_secs,
            binance_url: get("BINANCE_API_URL").unwrap_or_else(|| BINANCE_API_URL.to_string()),
            coingecko_url: get("COINGECKO_API_URL")
                .unwrap_or_else(|| COINGECKO_API_URL.to_string()),
            coingecko_ids,
            bot_ai: ExternalEndpoint {
                name: "overseer_bot_ai".to_string(),
                source: "overseer-bot-ai".to_string(),
                url: get("OVERSEER_BOT_AI_URL"),
                api_key: get("OVERSEER_BOT_AI_API_KEY"),
                poll_alerts: true,
            },
            token_scalper: ExternalEndpoint {
                name: "token_scalper".to_string(),
                source: "token-scalper".to_string(),
                url: get("TOKEN_SCALPER_URL"),
                api_key: get("TOKEN_SCALPER_API_KEY"),
                poll_alerts: false,
            },
            poll_interval_secs,
            twitter,
            diagnostic_schedule,
            broadcast_minutes: (broadcast_min, broadcast_max),
            game_link: get("GAME_LINK").unwrap_or_else(|| DEFAULT_GAME_LINK.to_string()),
        })
    }

    pub fn external_endpoints(&self) -> Vec<ExternalEndpoint> {
        vec![self.bot_ai.clone(), self.token_scalper.clone()]
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| format!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Parse `SYMBOL=coin-id` pairs separated by commas, e.g.
/// `CAPSUSDT=atomic-fizz-caps,WIF=dogwifcoin`
pub fn parse_coin_ids(raw: &str) -> Result<Vec<(String, String)>, String> {
    let mut ids: Vec<(String, String)> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((symbol, id)) = entry.split_once('=') else {
            return Err(format!("Invalid COINGECKO_IDS entry '{}', expected SYMBOL=id", entry));
        };
        let (symbol, id) = (symbol.trim().to_uppercase(), id.trim());
        if symbol.is_empty() || id.is_empty() {
            return Err(format!("Invalid COINGECKO_IDS entry '{}', expected SYMBOL=id", entry));
        }
        ids.retain(|(s, _)| *s != symbol);
        ids.push((symbol, id.to_string()));
    }
    Ok(ids)
}

/// Parse `SYMBOL[:UP[:DOWN[:INTERVAL_SECS]]]` entries separated by commas.
/// Empty fields take the default, e.g. `SOLUSDT::3` keeps the default up
/// threshold and sets the down threshold to 3%.
pub fn parse_monitors(raw: &str, defaults: &MonitorDefaults) -> Result<Vec<MonitorConfig>, String> {
    let mut monitors: Vec<MonitorConfig> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        if parts.len() > 4 {
            return Err(format!("Too many fields in monitor '{}'", entry));
        }

        let symbol = parts[0].to_uppercase();
        if symbol.is_empty() {
            return Err(format!("Missing symbol in monitor '{}'", entry));
        }
        if monitors.iter().any(|m| m.symbol == symbol) {
            return Err(format!("Duplicate monitor for {}", symbol));
        }

        let field = |idx: usize| parts.get(idx).copied().filter(|p| !p.is_empty());

        let threshold = |idx: usize, default: f64, label: &str| -> Result<f64, String> {
            let value = match field(idx) {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid {} threshold '{}' for {}", label, raw, symbol))?,
                None => default,
            };
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} threshold for {} must be > 0", label, symbol));
            }
            Ok(value)
        };

        let alert_threshold_up = threshold(1, defaults.threshold_up, "Up")?;
        let alert_threshold_down = threshold(2, defaults.threshold_down, "Down")?;

        let check_interval_secs = match field(3) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("Invalid check interval '{}' for {}", raw, symbol))?,
            None => defaults.check_interval_secs,
        };
        if check_interval_secs == 0 {
            return Err(format!("Check interval for {} must be > 0", symbol));
        }

        monitors.push(MonitorConfig {
            symbol,
            provider: defaults.provider.clone(),
            alert_threshold_up,
            alert_threshold_down,
            check_interval_secs,
        });
    }

    if monitors.is_empty() {
        return Err("PRICE_MONITORS contains no symbols".to_string());
    }
    Ok(monitors)
}
