//! Polls companion services for status and alerts and folds the results into
//! the health registry and alert history.

use crate::config::ExternalEndpoint;
use crate::log_gate::{ErrorLogGate, CONFIG_ERROR};
use crate::registry::{AlertLog, HealthRegistry};
use overseer_types::HealthStatus;
use std::sync::Arc;

const REQUEST_FAILED: &str = "request_failed";

/// True only for absolute http(s) URLs with a non-empty host
pub fn is_valid_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

pub fn invalid_url_message(url: &str) -> String {
    format!(
        "Invalid URL format: '{}'. Must start with http:// or https://",
        url
    )
}

pub struct ExternalPoller {
    client: reqwest::Client,
    endpoints: Vec<ExternalEndpoint>,
    health: Arc<HealthRegistry>,
    alerts: Arc<AlertLog>,
    log_gate: Arc<ErrorLogGate>,
}

impl ExternalPoller {
    pub fn new(
        client: reqwest::Client,
        endpoints: Vec<ExternalEndpoint>,
        health: Arc<HealthRegistry>,
        alerts: Arc<AlertLog>,
        log_gate: Arc<ErrorLogGate>,
    ) -> Self {
        Self {
            client,
            endpoints,
            health,
            alerts,
            log_gate,
        }
    }

    /// Mark endpoints without a URL as disabled. Call once at start-up.
    pub fn mark_unconfigured(&self) {
        for endpoint in self.endpoints.iter().filter(|e| e.url.is_none()) {
            self.health
                .update(&endpoint.name, HealthStatus::Disabled, Some("No URL configured"));
        }
    }

    pub fn has_configured(&self) -> bool {
        self.endpoints.iter().any(|e| e.url.is_some())
    }

    /// One pass over every configured endpoint
    pub async fn poll_once(&self) {
        for endpoint in &self.endpoints {
            if let Some(url) = &endpoint.url {
                self.poll_endpoint(endpoint, url).await;
            }
        }
    }

    async fn poll_endpoint(&self, endpoint: &ExternalEndpoint, base_url: &str) {
        if !is_valid_url(base_url) {
            let message = invalid_url_message(base_url);
            self.health
                .update(&endpoint.name, HealthStatus::Unhealthy, Some(&message));
            if self.log_gate.should_log(&endpoint.name, CONFIG_ERROR) {
                log::error!("[EXTERNAL_API] {}: {}", endpoint.name, message);
            }
            return;
        }

        let base = base_url.trim_end_matches('/');

        match self.get_json(&format!("{}/api/status", base), endpoint).await {
            Ok(data) => {
                self.record_success(endpoint);
                let status = data
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                self.alerts.record(
                    "status",
                    &endpoint.source,
                    data,
                    Some(format!("Status update: {}", status)),
                );
            }
            Err(e) => self.record_failure(endpoint, "status", &e),
        }

        if !endpoint.poll_alerts {
            return;
        }

        match self.get_json(&format!("{}/api/alerts", base), endpoint).await {
            Ok(data) => {
                self.record_success(endpoint);
                if let serde_json::Value::Array(items) = data {
                    for item in items {
                        let alert_type = item
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("unknown")
                            .to_string();
                        let message = item
                            .get("message")
                            .and_then(|m| m.as_str())
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} alert", alert_type));
                        self.alerts
                            .record(&alert_type, &endpoint.source, item, Some(message));
                    }
                }
            }
            Err(e) => self.record_failure(endpoint, "alerts", &e),
        }
    }

    async fn get_json(
        &self,
        url: &str,
        endpoint: &ExternalEndpoint,
    ) -> Result<serde_json::Value, String> {
        let mut request = self.client.get(url);
        if let Some(key) = &endpoint.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} returned HTTP {}", url, status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Invalid JSON from {}: {}", url, e))
    }

    /// Returns how many consecutive failures preceded this success
    fn record_success(&self, endpoint: &ExternalEndpoint) -> u64 {
        self.health.update(&endpoint.name, HealthStatus::Healthy, None);
        let streak = self.log_gate.count(&endpoint.name, REQUEST_FAILED);
        if streak > 0 {
            log::info!(
                "[EXTERNAL_API] {} recovered after {} failed requests",
                endpoint.source,
                streak
            );
        }
        self.log_gate.reset_count(&endpoint.name, REQUEST_FAILED);
        streak
    }

    fn record_failure(&self, endpoint: &ExternalEndpoint, what: &str, error: &str) {
        self.health
            .update(&endpoint.name, HealthStatus::Unhealthy, Some(error));
        if self.log_gate.should_log(&endpoint.name, REQUEST_FAILED) {
            log::error!(
                "[EXTERNAL_API] Failed to fetch {} {}: {}",
                endpoint.source,
                what,
                error
            );
        } else {
            log::debug!(
                "[EXTERNAL_API] Failed to fetch {} {} (suppressed): {}",
                endpoint.source,
                what,
                error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ALERT_LOG_CAPACITY;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Json;

    fn endpoint(url: Option<String>, poll_alerts: bool) -> ExternalEndpoint {
        ExternalEndpoint {
            name: "overseer_bot_ai".to_string(),
            source: "overseer-bot-ai".to_string(),
            url,
            api_key: Some("secret".to_string()),
            poll_alerts,
        }
    }

    fn poller(endpoints: Vec<ExternalEndpoint>) -> ExternalPoller {
        ExternalPoller::new(
            reqwest::Client::new(),
            endpoints,
            Arc::new(HealthRegistry::new(["overseer_bot_ai"])),
            Arc::new(AlertLog::with_capacity(ALERT_LOG_CAPACITY)),
            Arc::new(ErrorLogGate::new()),
        )
    }

    async fn status(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
        }
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "operational", "uptime": 42 })),
        )
    }

    async fn alerts() -> Json<serde_json::Value> {
        Json(serde_json::json!([
            { "type": "rugpull", "message": "LP pulled on $FAKE" },
            { "type": "airdrop" }
        ]))
    }

    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("http://localhost:8080"));
        assert!(is_valid_url("https://bot.example.com/base"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("http://"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_invalid_url_message() {
        assert_eq!(
            invalid_url_message("bot.local"),
            "Invalid URL format: 'bot.local'. Must start with http:// or https://"
        );
    }

    #[test]
    fn test_unconfigured_endpoint_is_disabled() {
        let p = poller(vec![endpoint(None, true)]);
        assert!(!p.has_configured());
        p.mark_unconfigured();
        let record = p.health.get_service("overseer_bot_ai").unwrap();
        assert_eq!(record.status, HealthStatus::Disabled);
        assert_eq!(record.error.as_deref(), Some("No URL configured"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let p = poller(vec![endpoint(Some("bot.local".to_string()), true)]);
        p.poll_once().await;
        p.poll_once().await;

        let record = p.health.get_service("overseer_bot_ai").unwrap();
        assert_eq!(record.status, HealthStatus::Unhealthy);
        assert_eq!(record.error, Some(invalid_url_message("bot.local")));
        assert_eq!(p.log_gate.count("overseer_bot_ai", CONFIG_ERROR), 2);
        assert!(p.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_poll_records_status_and_alerts() {
        let app = axum::Router::new()
            .route("/api/status", get(status))
            .route("/api/alerts", get(alerts));
        let base = serve(app).await;

        let p = poller(vec![endpoint(Some(format!("{}/", base)), true)]);
        p.poll_once().await;

        let record = p.health.get_service("overseer_bot_ai").unwrap();
        assert_eq!(record.status, HealthStatus::Healthy);
        assert!(record.last_success.is_some());

        let stored = p.alerts.list(10);
        assert_eq!(stored.len(), 3);
        // newest first
        assert_eq!(stored[0].alert_type, "airdrop");
        assert_eq!(stored[0].message, "airdrop alert");
        assert_eq!(stored[1].message, "LP pulled on $FAKE");
        assert_eq!(stored[2].alert_type, "status");
        assert_eq!(stored[2].message, "Status update: operational");
        assert_eq!(stored[2].source, "overseer-bot-ai");
        assert_eq!(stored[2].data["uptime"], 42);
    }

    #[test]
    fn test_success_reports_failure_streak() {
        let p = poller(vec![]);
        let ep = endpoint(Some("http://bot.local".to_string()), false);
        p.record_failure(&ep, "status", "HTTP 502");
        p.record_failure(&ep, "status", "HTTP 502");

        assert_eq!(p.record_success(&ep), 2);
        assert_eq!(p.log_gate.count("overseer_bot_ai", REQUEST_FAILED), 0);
        assert_eq!(p.record_success(&ep), 0);
        let record = p.health.get_service("overseer_bot_ai").unwrap();
        assert_eq!(record.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_http_error_marks_unhealthy() {
        let base = serve(axum::Router::new().route("/api/status", get(status))).await;
        let mut ep = endpoint(Some(base), false);
        ep.api_key = None;

        let p = poller(vec![ep]);
        p.poll_once().await;

        let record = p.health.get_service("overseer_bot_ai").unwrap();
        assert_eq!(record.status, HealthStatus::Unhealthy);
        assert!(record.error.unwrap().contains("HTTP 401"));
        assert!(p.alerts.is_empty());
    }
}
