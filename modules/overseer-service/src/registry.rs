//! In-memory registries read by the dashboard: dependency health, bot
//! activity and alert history.
//!
//! Each table has its own lock. Readers always get an owned copy.

use overseer_types::{ActivityEntry, AlertEntry, HealthRecord, HealthStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// Activity entries kept for the dashboard
pub const ACTIVITY_LOG_CAPACITY: usize = 50;

/// Alert entries kept for the dashboard
pub const ALERT_LOG_CAPACITY: usize = 100;

// =====================================================
// Health
// =====================================================

pub struct HealthRegistry {
    records: Mutex<BTreeMap<String, HealthRecord>>,
}

impl HealthRegistry {
    /// Create a registry with every listed service in `unknown` state
    pub fn new<'a>(services: impl IntoIterator<Item = &'a str>) -> Self {
        let records = services
            .into_iter()
            .map(|s| (s.to_string(), HealthRecord::default()))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn update(&self, service: &str, status: HealthStatus, error: Option<&str>) {
        let now = chrono::Utc::now().to_rfc3339();
        let mut records = self.records.lock();
        let record = records.entry(service.to_string()).or_default();
        record.status = status;
        record.last_check = Some(now.clone());
        if status == HealthStatus::Healthy {
            record.last_success = Some(now);
            record.error = None;
        } else {
            record.error = error.map(|e| e.to_string());
        }
    }

    pub fn get(&self) -> BTreeMap<String, HealthRecord> {
        self.records.lock().clone()
    }

    pub fn get_service(&self, service: &str) -> Option<HealthRecord> {
        self.records.lock().get(service).cloned()
    }
}

// =====================================================
// Bounded logs
// =====================================================

/// Append-only ring buffer; the oldest entry is evicted once full.
pub struct BoundedLog<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(&self, entry: T) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// The `limit` most recent entries, newest first
    pub fn list(&self, limit: usize) -> Vec<T> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl BoundedLog<ActivityEntry> {
    pub fn record(&self, activity_type: &str, description: impl Into<String>) {
        self.append(ActivityEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            activity_type: activity_type.to_string(),
            description: description.into(),
        });
    }
}

impl BoundedLog<AlertEntry> {
    /// Store an alert. Without a message one is derived from type and source.
    pub fn record(
        &self,
        alert_type: &str,
        source: &str,
        data: serde_json::Value,
        message: Option<String>,
    ) {
        let message =
            message.unwrap_or_else(|| format!("{} from {}", alert_type.to_uppercase(), source));
        self.append(AlertEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            alert_type: alert_type.to_string(),
            source: source.to_string(),
            data,
            message,
        });
        log::info!("Alert added: {} from {}", alert_type, source);
    }
}

pub type ActivityLog = BoundedLog<ActivityEntry>;
pub type AlertLog = BoundedLog<AlertEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_health_update_healthy_then_unhealthy() {
        let health = HealthRegistry::new(["binance"]);
        assert_eq!(
            health.get_service("binance").unwrap().status,
            HealthStatus::Unknown
        );

        health.update("binance", HealthStatus::Healthy, None);
        let healthy = health.get_service("binance").unwrap();
        assert_eq!(healthy.status, HealthStatus::Healthy);
        assert!(healthy.last_check.is_some());
        assert!(healthy.last_success.is_some());
        assert!(healthy.error.is_none());

        health.update("binance", HealthStatus::Unhealthy, Some("boom"));
        let unhealthy = health.get_service("binance").unwrap();
        assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
        assert_eq!(unhealthy.error.as_deref(), Some("boom"));
        assert_eq!(unhealthy.last_success, healthy.last_success);
    }

    #[test]
    fn test_healthy_clears_previous_error() {
        let health = HealthRegistry::new(std::iter::empty());
        health.update("twitter", HealthStatus::Unhealthy, Some("401"));
        health.update("twitter", HealthStatus::Healthy, Some("ignored"));
        assert!(health.get_service("twitter").unwrap().error.is_none());
    }

    #[test]
    fn test_health_snapshot_is_detached() {
        let health = HealthRegistry::new(["coingecko"]);
        let mut snapshot = health.get();
        snapshot.get_mut("coingecko").unwrap().status = HealthStatus::Healthy;
        snapshot.insert("ghost".to_string(), HealthRecord::default());

        let fresh = health.get();
        assert_eq!(fresh["coingecko"].status, HealthStatus::Unknown);
        assert!(!fresh.contains_key("ghost"));
    }

    #[test]
    fn test_alert_log_evicts_oldest() {
        let alerts = AlertLog::with_capacity(ALERT_LOG_CAPACITY);
        for i in 1..=101 {
            alerts.record("trade", "token-scalper", serde_json::json!({ "n": i }), None);
        }
        assert_eq!(alerts.len(), 100);

        let all = alerts.list(usize::MAX);
        assert_eq!(all.first().unwrap().data["n"], 101);
        assert_eq!(all.last().unwrap().data["n"], 2);
        // Insertion order kept
        let ns: Vec<i64> = all.iter().rev().map(|a| a.data["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, (2..=101).collect::<Vec<_>>());

        let recent = alerts.list(5);
        let ns: Vec<i64> = recent.iter().map(|a| a.data["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![101, 100, 99, 98, 97]);
    }

    #[test]
    fn test_alert_default_message() {
        let alerts = AlertLog::with_capacity(10);
        alerts.record("rugpull", "overseer-bot-ai", serde_json::json!({}), None);
        alerts.record(
            "status",
            "token-scalper",
            serde_json::json!({}),
            Some("Status update: ok".into()),
        );
        let listed = alerts.list(2);
        assert_eq!(listed[0].message, "Status update: ok");
        assert_eq!(listed[1].message, "RUGPULL from overseer-bot-ai");
    }

    #[test]
    fn test_activity_log_cap() {
        let activities = ActivityLog::with_capacity(ACTIVITY_LOG_CAPACITY);
        assert!(activities.is_empty());
        for i in 0..60 {
            activities.record("broadcast", format!("post {}", i));
        }
        assert_eq!(activities.len(), 50);
        assert_eq!(activities.list(1)[0].description, "post 59");
        assert_eq!(activities.list(100).last().unwrap().description, "post 10");
    }

    #[test]
    fn test_concurrent_appends() {
        let activities = Arc::new(ActivityLog::with_capacity(ACTIVITY_LOG_CAPACITY));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = activities.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.record("test", format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(activities.len(), ACTIVITY_LOG_CAPACITY);
    }
}
