//! Axum route handlers: read-only JSON views over the registries, the
//! service status RPC and the game-event webhook.

use crate::events::EventBridge;
use crate::price_cache::{PriceCache, PriceMap};
use crate::registry::{ActivityLog, AlertLog, HealthRegistry};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use overseer_types::*;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_LIST_LIMIT: usize = 50;

pub struct AppState {
    pub health: Arc<HealthRegistry>,
    pub activities: Arc<ActivityLog>,
    pub alerts: Arc<AlertLog>,
    pub cache: Arc<PriceCache>,
    pub events: Arc<EventBridge>,
    pub monitors: Vec<MonitorConfig>,
    pub start_time: Instant,
    pub last_cycle_at: Arc<Mutex<Option<String>>>,
    pub publisher: String,
}

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, HealthRecord>> {
    Json(state.health.get())
}

// GET /api/health/:service
pub async fn health_service(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> (StatusCode, Json<RpcResponse<HealthRecord>>) {
    match state.health.get_service(&service) {
        Some(record) => (StatusCode::OK, Json(RpcResponse::ok(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(RpcResponse::err(format!("Unknown service: {}", service))),
        ),
    }
}

// GET /api/activities?limit=N
pub async fn activities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ActivityEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(state.activities.list(limit))
}

// GET /api/alerts?limit=N
pub async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<AlertEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(state.alerts.list(limit))
}

// GET /api/prices
pub async fn prices(State(state): State<Arc<AppState>>) -> Json<PriceMap> {
    Json(state.cache.snapshot())
}

// GET /rpc/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<ServiceStatus>>) {
    let status = ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        monitors: state.monitors.clone(),
        cached_prices: state.cache.len(),
        last_cycle_at: state.last_cycle_at.lock().clone(),
        publisher: state.publisher.clone(),
    };

    (StatusCode::OK, Json(RpcResponse::ok(status)))
}

// POST /overseer-event
pub async fn overseer_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Json<EventAck> {
    state.events.handle_raw(payload).await;
    Json(EventAck { ok: true })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::log_gate::ErrorLogGate;
    use crate::registry::{ACTIVITY_LOG_CAPACITY, ALERT_LOG_CAPACITY};
    use crate::twitter_api::tests::FakePublisher;

    pub(crate) fn app_state() -> Arc<AppState> {
        let health = Arc::new(HealthRegistry::new(["binance", "coingecko", "twitter"]));
        let activities = Arc::new(ActivityLog::with_capacity(ACTIVITY_LOG_CAPACITY));
        let events = Arc::new(EventBridge {
            publisher: Arc::new(FakePublisher::default()),
            health: health.clone(),
            activities: activities.clone(),
            log_gate: Arc::new(ErrorLogGate::new()),
            game_link: "https://www.atomicfizzcaps.xyz".to_string(),
        });
        Arc::new(AppState {
            health,
            activities,
            alerts: Arc::new(AlertLog::with_capacity(ALERT_LOG_CAPACITY)),
            cache: Arc::new(PriceCache::in_memory()),
            events,
            monitors: vec![MonitorConfig {
                symbol: "SOLUSDT".to_string(),
                provider: "binance".to_string(),
                alert_threshold_up: 5.0,
                alert_threshold_down: 5.0,
                check_interval_secs: 300,
            }],
            start_time: Instant::now(),
            last_cycle_at: Arc::new(Mutex::new(None)),
            publisher: "twitter".to_string(),
        })
    }

    #[tokio::test]
    async fn test_alerts_default_and_explicit_limit() {
        let state = app_state();
        for i in 0..60 {
            state
                .alerts
                .record("status", "token-scalper", serde_json::json!({ "n": i }), None);
        }

        let Json(all) = alerts(State(state.clone()), Query(ListQuery::default())).await;
        assert_eq!(all.len(), DEFAULT_LIST_LIMIT);
        assert_eq!(all[0].data["n"], 59);
        assert_eq!(all[0].message, "STATUS from token-scalper");

        let Json(five) = alerts(State(state), Query(ListQuery { limit: Some(5) })).await;
        assert_eq!(five.len(), 5);
        assert_eq!(five[4].data["n"], 55);
    }

    #[tokio::test]
    async fn test_health_snapshot() {
        let state = app_state();
        state.health.update("binance", HealthStatus::Unhealthy, Some("451"));
        let Json(snapshot) = health(State(state)).await;
        assert_eq!(snapshot["binance"].status, HealthStatus::Unhealthy);
        assert_eq!(snapshot["coingecko"].status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_health_single_service() {
        let state = app_state();
        state.health.update("coingecko", HealthStatus::Healthy, None);

        let (code, Json(resp)) =
            health_service(State(state.clone()), Path("coingecko".to_string())).await;
        assert_eq!(code, StatusCode::OK);
        assert!(resp.success);
        assert_eq!(resp.data.unwrap().status, HealthStatus::Healthy);

        let (code, Json(resp)) = health_service(State(state), Path("kraken".to_string())).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("Unknown service: kraken"));
    }

    #[tokio::test]
    async fn test_status_reports_monitors() {
        let state = app_state();
        *state.last_cycle_at.lock() = Some("2024-03-01T08:00:00+00:00".to_string());
        let (code, Json(resp)) = status(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert_eq!(data.monitors.len(), 1);
        assert_eq!(data.cached_prices, 0);
        assert_eq!(data.last_cycle_at.as_deref(), Some("2024-03-01T08:00:00+00:00"));
    }

    #[tokio::test]
    async fn test_event_webhook_always_acks() {
        let state = app_state();
        let Json(ack) = overseer_event(
            State(state.clone()),
            Json(serde_json::json!({ "type": "quest", "code": "V77" })),
        )
        .await;
        assert!(ack.ok);
        assert_eq!(state.activities.list(1)[0].activity_type, "event_quest");

        let Json(ack) = overseer_event(
            State(state.clone()),
            Json(serde_json::json!({ "type": "unheard_of" })),
        )
        .await;
        assert!(ack.ok);
        assert_eq!(state.activities.len(), 1);
    }
}
