//! Percent-change alert policy.
//!
//! Each new quote is compared with the last cached one for the same monitor,
//! and the cache is then overwritten unconditionally. Moves are therefore
//! measured step to step: a slow drift that never crosses a threshold between
//! two consecutive checks does not alert, however large it grows overall.

use crate::price_cache::PriceMap;
use overseer_types::{MonitorConfig, PriceQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Signed percent change; 0 when there is no meaningful baseline
pub fn percent_change(old_price: f64, new_price: f64) -> f64 {
    if old_price == 0.0 {
        return 0.0;
    }
    (new_price - old_price) / old_price * 100.0
}

pub fn should_alert(
    old_price: f64,
    new_price: f64,
    threshold_up: f64,
    threshold_down: f64,
) -> bool {
    let change = percent_change(old_price, new_price);
    if change > 0.0 {
        change >= threshold_up
    } else if change < 0.0 {
        change.abs() >= threshold_down
    } else {
        false
    }
}

/// A threshold breach for one monitor
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub monitor: MonitorConfig,
    pub previous: PriceQuote,
    pub current: PriceQuote,
    pub percent_change: f64,
}

impl PriceAlert {
    pub fn direction(&self) -> Direction {
        if self.percent_change >= 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Post text for this alert
    pub fn message(&self) -> String {
        let (icon, verb) = match self.direction() {
            Direction::Up => ("📈", "UP"),
            Direction::Down => ("📉", "DOWN"),
        };
        let mut text = format!(
            "{} PRICE ALERT: {} {} {:.2}%\n\n${} → ${}",
            icon,
            self.monitor.symbol,
            verb,
            self.percent_change.abs(),
            format_price(self.previous.price),
            format_price(self.current.price),
        );
        if let (Some(low), Some(high)) = (self.current.low_24h, self.current.high_24h) {
            text.push_str(&format!(
                "\n24h range: ${} - ${}",
                format_price(low),
                format_price(high)
            ));
        }
        if let Some(change) = self.current.change_24h {
            text.push_str(&format!("\n24h change: {:+.2}%", change));
        }
        text.push_str(&format!("\nSource: {}", self.current.source));
        text
    }
}

/// Compare `quote` with the cached baseline, then store it as the new
/// baseline. A first observation never alerts.
pub fn evaluate(
    cache: &mut PriceMap,
    monitor: &MonitorConfig,
    quote: PriceQuote,
) -> Option<PriceAlert> {
    let key = monitor.cache_key();

    let alert = match cache.get(&key) {
        Some(previous)
            if should_alert(
                previous.price,
                quote.price,
                monitor.alert_threshold_up,
                monitor.alert_threshold_down,
            ) =>
        {
            Some(PriceAlert {
                monitor: monitor.clone(),
                previous: previous.clone(),
                current: quote.clone(),
                percent_change: percent_change(previous.price, quote.price),
            })
        }
        _ => None,
    };

    cache.insert(key, quote);
    alert
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.6}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(up: f64, down: f64) -> MonitorConfig {
        MonitorConfig {
            symbol: "SOLUSDT".to_string(),
            provider: "binance".to_string(),
            alert_threshold_up: up,
            alert_threshold_down: down,
            check_interval_secs: 300,
        }
    }

    fn quote(price: f64) -> PriceQuote {
        PriceQuote {
            price,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            change_24h: None,
            timestamp: 0.0,
            source: "binance".to_string(),
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        assert!(should_alert(100.0, 105.0, 5.0, 5.0));
        assert!(!should_alert(100.0, 104.9, 5.0, 5.0));
        assert!(should_alert(100.0, 95.0, 5.0, 5.0));
        assert!(!should_alert(100.0, 95.5, 5.0, 5.0));
    }

    #[test]
    fn test_directional_thresholds_are_independent() {
        assert!(should_alert(100.0, 103.0, 3.0, 10.0));
        assert!(!should_alert(100.0, 97.0, 3.0, 10.0));
        assert!(should_alert(100.0, 90.0, 3.0, 10.0));
    }

    #[test]
    fn test_zero_change_and_zero_baseline() {
        assert!(!should_alert(100.0, 100.0, 0.0001, 0.0001));
        assert!(!should_alert(0.0, 100.0, 5.0, 5.0));
        assert_eq!(percent_change(0.0, 50.0), 0.0);
        assert_eq!(percent_change(200.0, 150.0), -25.0);
    }

    #[test]
    fn test_first_observation_never_alerts() {
        let mut cache = PriceMap::new();
        let cfg = monitor(1.0, 1.0);
        assert!(evaluate(&mut cache, &cfg, quote(100.0)).is_none());
        assert_eq!(cache["SOLUSDT:binance"].price, 100.0);
    }

    #[test]
    fn test_breach_alerts_and_moves_baseline() {
        let mut cache = PriceMap::new();
        let cfg = monitor(5.0, 5.0);
        evaluate(&mut cache, &cfg, quote(100.0));

        let alert = evaluate(&mut cache, &cfg, quote(110.0)).unwrap();
        assert_eq!(alert.direction(), Direction::Up);
        assert_eq!(alert.previous.price, 100.0);
        assert_eq!(alert.current.price, 110.0);
        assert!((alert.percent_change - 10.0).abs() < 1e-9);
        assert_eq!(cache["SOLUSDT:binance"].price, 110.0);

        let down = evaluate(&mut cache, &cfg, quote(99.0)).unwrap();
        assert_eq!(down.direction(), Direction::Down);
    }

    #[test]
    fn test_slow_drift_does_not_alert() {
        let mut cache = PriceMap::new();
        let cfg = monitor(5.0, 5.0);
        let mut price = 100.0;
        evaluate(&mut cache, &cfg, quote(price));
        // +3% per step, +34% overall
        for _ in 0..10 {
            price *= 1.03;
            assert!(evaluate(&mut cache, &cfg, quote(price)).is_none());
        }
        assert!(cache["SOLUSDT:binance"].price > 130.0);
    }

    #[test]
    fn test_message_mentions_known_fields_only() {
        let cfg = monitor(5.0, 5.0);
        let mut current = quote(105.0);
        current.change_24h = Some(6.1);
        let alert = PriceAlert {
            monitor: cfg.clone(),
            previous: quote(100.0),
            current,
            percent_change: 5.0,
        };
        let text = alert.message();
        assert!(text.contains("SOLUSDT UP 5.00%"));
        assert!(text.contains("$100.00 → $105.00"));
        assert!(text.contains("24h change: +6.10%"));
        assert!(!text.contains("24h range"));

        let mut ranged = alert.clone();
        ranged.current.high_24h = Some(110.0);
        ranged.current.low_24h = Some(0.5);
        assert!(ranged.message().contains("24h range: $0.500000 - $110.00"));
    }
}
