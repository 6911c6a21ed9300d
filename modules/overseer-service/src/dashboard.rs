//! Dashboard HTML page handler.
//!
//! Serves a self-contained HTML page with inline CSS showing dependency
//! health, cached prices, recent activity and alerts.

use crate::routes::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use overseer_types::HealthStatus;
use std::sync::Arc;

const DASHBOARD_ROWS: usize = 20;

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], render(&state))
}

fn render(state: &AppState) -> String {
    let health = state.health.get();
    let prices = state.cache.snapshot();
    let activities = state.activities.list(DASHBOARD_ROWS);
    let alerts = state.alerts.list(DASHBOARD_ROWS);
    let last_cycle = state.last_cycle_at.lock().clone();
    let uptime = state.start_time.elapsed().as_secs();

    let mut health_rows = String::new();
    for (service, record) in &health {
        let cls = match record.status {
            HealthStatus::Healthy => "ok",
            HealthStatus::Unhealthy => "bad",
            HealthStatus::Disabled => "off",
            HealthStatus::Unknown => "",
        };
        health_rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(service),
            cls,
            record.status,
            record.last_check.as_deref().unwrap_or("-"),
            record.last_success.as_deref().unwrap_or("-"),
            escape(record.error.as_deref().unwrap_or("")),
        ));
    }

    let mut price_rows = String::new();
    for (key, quote) in &prices {
        price_rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"mono\">${:.4}</td><td class=\"mono\">{}</td><td class=\"mono\">{}</td><td>{}</td></tr>\n",
            escape(key),
            quote.price,
            optional(quote.change_24h.map(|c| format!("{:+.2}%", c))),
            optional(match (quote.low_24h, quote.high_24h) {
                (Some(low), Some(high)) => Some(format!("${:.4} - ${:.4}", low, high)),
                _ => None,
            }),
            escape(&quote.source),
        ));
    }
    if price_rows.is_empty() {
        price_rows = "<tr><td colspan=\"5\">No prices cached yet.</td></tr>".to_string();
    }

    let mut activity_rows = String::new();
    for a in &activities {
        activity_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            a.timestamp,
            escape(&a.activity_type),
            escape(&a.description)
        ));
    }
    if activity_rows.is_empty() {
        activity_rows = "<tr><td colspan=\"3\">No activity yet.</td></tr>".to_string();
    }

    let mut alert_rows = String::new();
    for a in &alerts {
        alert_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            a.timestamp,
            escape(&a.alert_type),
            escape(&a.source),
            escape(&a.message)
        ));
    }
    if alert_rows.is_empty() {
        alert_rows = "<tr><td colspan=\"4\">No alerts yet.</td></tr>".to_string();
    }

    let monitor_list = state
        .monitors
        .iter()
        .map(|m| {
            format!(
                "{} (+{}% / -{}%, {}s)",
                m.symbol, m.alert_threshold_up, m.alert_threshold_down, m.check_interval_secs
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Overseer Dashboard</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f1117; color: #e0e0e0; padding: 20px; }}
  h1 {{ color: #7ee787; margin-bottom: 8px; }}
  .meta {{ color: #8b949e; font-size: 0.85em; margin-bottom: 20px; }}
  table {{ width: 100%; border-collapse: collapse; margin-bottom: 24px; }}
  th {{ background: #161b22; color: #8b949e; text-align: left; padding: 8px 12px; font-size: 0.85em; text-transform: uppercase; border-bottom: 1px solid #30363d; }}
  td {{ padding: 8px 12px; border-bottom: 1px solid #21262d; font-size: 0.9em; }}
  tr:hover {{ background: #161b22; }}
  td.ok {{ color: #7ee787; }}
  td.bad {{ color: #f85149; }}
  td.off {{ color: #6e7681; }}
  .mono {{ font-family: 'SF Mono', 'Consolas', monospace; font-size: 0.85em; }}
  h2 {{ color: #c9d1d9; margin-bottom: 12px; font-size: 1.1em; }}
  .section {{ margin-bottom: 28px; }}
</style>
</head>
<body>
  <h1>&#9762; Overseer</h1>
  <p class="meta">Uptime: {uptime_str} &middot; Last price cycle: {last_cycle_str} &middot; Publisher: {publisher}</p>
  <p class="meta">Monitors: {monitor_list}</p>

  <div class="section">
    <h2>Service Health</h2>
    <table>
      <thead><tr><th>Service</th><th>Status</th><th>Last Check</th><th>Last Success</th><th>Error</th></tr></thead>
      <tbody>{health_rows}</tbody>
    </table>
  </div>

  <div class="section">
    <h2>Prices</h2>
    <table>
      <thead><tr><th>Monitor</th><th>Price</th><th>24h</th><th>24h Range</th><th>Source</th></tr></thead>
      <tbody>{price_rows}</tbody>
    </table>
  </div>

  <div class="section">
    <h2>Recent Activity</h2>
    <table>
      <thead><tr><th>Time</th><th>Type</th><th>Description</th></tr></thead>
      <tbody>{activity_rows}</tbody>
    </table>
  </div>

  <div class="section">
    <h2>Alerts</h2>
    <table>
      <thead><tr><th>Time</th><th>Type</th><th>Source</th><th>Message</th></tr></thead>
      <tbody>{alert_rows}</tbody>
    </table>
  </div>

  <script>
    setTimeout(() => location.reload(), 30000);
  </script>
</body>
</html>"#,
        uptime_str = format_uptime(uptime),
        last_cycle_str = last_cycle.as_deref().unwrap_or("not yet"),
        publisher = escape(&state.publisher),
        monitor_list = escape(&monitor_list),
        health_rows = health_rows,
        price_rows = price_rows,
        activity_rows = activity_rows,
        alert_rows = alert_rows,
    )
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "n/a".to_string())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
