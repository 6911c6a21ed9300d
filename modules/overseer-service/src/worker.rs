//! Price monitoring cycle.
//!
//! One cycle resolves every monitored symbol with no lock held, evaluates all
//! quotes against the cache inside a single cache critical section, then
//! records and publishes the resulting alerts.

use crate::alert_policy::{self, PriceAlert};
use crate::log_gate::ErrorLogGate;
use crate::price_cache::PriceCache;
use crate::registry::{ActivityLog, AlertLog, HealthRegistry};
use crate::resolver::PriceResolver;
use crate::twitter_api::{self, Publisher};
use futures_util::future::join_all;
use overseer_types::{MonitorConfig, PriceQuote};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "price_monitor";

/// Outcome of one cycle, for logging and tests
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub resolved: usize,
    pub failed: usize,
    pub alerts: usize,
    pub published: usize,
}

pub struct PriceMonitor {
    pub resolver: PriceResolver,
    pub cache: Arc<PriceCache>,
    pub health: Arc<HealthRegistry>,
    pub activities: Arc<ActivityLog>,
    pub alerts: Arc<AlertLog>,
    pub publisher: Arc<dyn Publisher>,
    pub log_gate: Arc<ErrorLogGate>,
    pub last_cycle_at: Arc<Mutex<Option<String>>>,
    pub game_link: String,
}

impl PriceMonitor {
    pub async fn run_price_cycle(&self, monitors: &[MonitorConfig]) -> CycleReport {
        let mut report = CycleReport::default();

        let results = join_all(
            monitors
                .iter()
                .map(|m| async move { (m, self.resolver.resolve(&m.symbol, &m.provider).await) }),
        )
        .await;

        let mut quotes: Vec<(&MonitorConfig, PriceQuote)> = Vec::with_capacity(results.len());
        for (monitor, result) in results {
            let gate_key = format!("{}:{}", SERVICE, monitor.symbol);
            match result {
                Ok(quote) => {
                    self.log_gate.reset_count(&gate_key, "unresolved");
                    quotes.push((monitor, quote));
                }
                Err(e) => {
                    report.failed += 1;
                    if self.log_gate.should_log(&gate_key, "unresolved") {
                        log::error!(
                            "[PRICE_MONITOR] No price for {} from any source, skipping: {}",
                            monitor.symbol,
                            e
                        );
                    }
                }
            }
        }
        report.resolved = quotes.len();

        let alerts: Vec<PriceAlert> = self.cache.update_with(|cache| {
            quotes
                .into_iter()
                .filter_map(|(monitor, quote)| alert_policy::evaluate(cache, monitor, quote))
                .collect()
        });
        report.alerts = alerts.len();

        for alert in &alerts {
            if self.handle_alert(alert).await {
                report.published += 1;
            }
        }

        *self.last_cycle_at.lock() = Some(chrono::Utc::now().to_rfc3339());

        log::info!(
            "[PRICE_MONITOR] Cycle done: {} resolved, {} failed, {} alerts, {} published",
            report.resolved,
            report.failed,
            report.alerts,
            report.published
        );
        report
    }

    /// Record one alert and publish it. Returns whether the post went out.
    async fn handle_alert(&self, alert: &PriceAlert) -> bool {
        let message = alert.message();
        log::info!(
            "[PRICE_MONITOR] {} moved {:+.2}% ({} -> {})",
            alert.monitor.symbol,
            alert.percent_change,
            alert.previous.price,
            alert.current.price
        );

        self.alerts.record(
            "price",
            &alert.current.source,
            serde_json::json!({
                "symbol": alert.monitor.symbol,
                "previous": alert.previous,
                "current": alert.current,
                "percent_change": alert.percent_change,
            }),
            Some(message.clone()),
        );
        self.activities.record(
            "price_alert",
            format!(
                "{} {:+.2}% to ${:.4}",
                alert.monitor.symbol, alert.percent_change, alert.current.price
            ),
        );

        let text = with_link(&message, &self.game_link);
        twitter_api::publish_tracked(
            self.publisher.as_ref(),
            &self.health,
            &self.log_gate,
            &text,
        )
        .await
        .is_some()
    }
}

/// Append the game link when it fits, otherwise post the bare message
fn with_link(message: &str, link: &str) -> String {
    let linked = format!("{}\n\n🎮 {}", message, link);
    if twitter_api::fits_in_post(&linked) {
        linked
    } else {
        twitter_api::truncate_for_post(message)
    }
}

/// Monitors sharing a check interval run as one scheduled job
pub fn group_by_interval(monitors: &[MonitorConfig]) -> BTreeMap<Duration, Vec<MonitorConfig>> {
    let mut groups: BTreeMap<Duration, Vec<MonitorConfig>> = BTreeMap::new();
    for monitor in monitors {
        groups
            .entry(monitor.check_interval())
            .or_default()
            .push(monitor.clone());
    }
    groups
}
