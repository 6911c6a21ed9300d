//! Overseer Service: price monitoring with provider fallback, external
//! status polling and game-event posts.
//!
//! Hosts the JSON/RPC API, the event webhook and a dashboard UI on the same
//! port. Default: http://127.0.0.1:9110/

mod alert_policy;
mod binance;
mod broadcast;
mod coingecko;
mod config;
mod dashboard;
mod events;
mod external_api;
mod log_gate;
mod price_cache;
mod price_source;
mod registry;
mod resolver;
mod routes;
mod scheduler;
mod twitter_api;
mod worker;

use config::ServiceConfig;
use events::EventBridge;
use external_api::ExternalPoller;
use log_gate::ErrorLogGate;
use overseer_types::HealthStatus;
use parking_lot::Mutex;
use price_cache::PriceCache;
use price_source::PriceSource;
use rand::Rng;
use registry::{ActivityLog, AlertLog, HealthRegistry, ACTIVITY_LOG_CAPACITY, ALERT_LOG_CAPACITY};
use resolver::PriceResolver;
use routes::AppState;
use scheduler::{Scheduler, Trigger};
use std::sync::Arc;
use std::time::{Duration, Instant};
use twitter_api::{LogPublisher, Publisher, TwitterPublisher};
use worker::PriceMonitor;

const TWITTER_SERVICE: &str = "twitter";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match ServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .expect("Failed to build HTTP client");

    let endpoints = config.external_endpoints();
    let mut services = vec![binance::SOURCE_NAME, coingecko::SOURCE_NAME, TWITTER_SERVICE];
    services.extend(endpoints.iter().map(|e| e.name.as_str()));
    let health = Arc::new(HealthRegistry::new(services));

    let log_gate = Arc::new(ErrorLogGate::new());
    let activities = Arc::new(ActivityLog::with_capacity(ACTIVITY_LOG_CAPACITY));
    let alerts = Arc::new(AlertLog::with_capacity(ALERT_LOG_CAPACITY));

    log::info!("Opening price cache at: {}", config.cache_path.display());
    let cache = Arc::new(PriceCache::open(config.cache_path.clone()));

    let publisher: Arc<dyn Publisher> = match config.twitter.clone() {
        Some(creds) => Arc::new(TwitterPublisher::new(client.clone(), creds)),
        None => {
            log::warn!("Twitter credentials not set, posts will only be logged");
            health.update(
                TWITTER_SERVICE,
                HealthStatus::Disabled,
                Some("No credentials configured"),
            );
            Arc::new(LogPublisher::new())
        }
    };

    let sources: Vec<Arc<dyn PriceSource>> = vec![
        Arc::new(binance::BinanceSource::new(client.clone(), config.binance_url.clone())),
        Arc::new(
            coingecko::CoinGeckoSource::new(client.clone(), config.coingecko_url.clone())
                .with_coin_ids(config.coingecko_ids.clone()),
        ),
    ];
    let resolver = PriceResolver::new(sources, health.clone(), log_gate.clone());
    log::info!("Price sources (fallback order): {}", resolver.source_names().join(", "));

    let last_cycle_at: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let monitor = Arc::new(PriceMonitor {
        resolver,
        cache: cache.clone(),
        health: health.clone(),
        activities: activities.clone(),
        alerts: alerts.clone(),
        publisher: publisher.clone(),
        log_gate: log_gate.clone(),
        last_cycle_at: last_cycle_at.clone(),
        game_link: config.game_link.clone(),
    });

    let events = Arc::new(EventBridge {
        publisher: publisher.clone(),
        health: health.clone(),
        activities: activities.clone(),
        log_gate: log_gate.clone(),
        game_link: config.game_link.clone(),
    });

    let poller = Arc::new(ExternalPoller::new(
        client.clone(),
        endpoints,
        health.clone(),
        alerts.clone(),
        log_gate.clone(),
    ));
    poller.mark_unconfigured();

    let mut scheduler = Scheduler::new();

    for (interval, group) in worker::group_by_interval(&config.monitors) {
        let monitor = monitor.clone();
        let group = Arc::new(group);
        scheduler.add_job(
            format!("price_cycle_{}s", interval.as_secs()),
            Trigger::Interval(interval),
            move || {
                let monitor = monitor.clone();
                let group = group.clone();
                async move {
                    monitor.run_price_cycle(&group).await;
                }
            },
        );
    }

    if poller.has_configured() {
        let poller = poller.clone();
        scheduler.add_job(
            "external_poll",
            Trigger::Interval(Duration::from_secs(config.poll_interval_secs)),
            move || {
                let poller = poller.clone();
                async move { poller.poll_once().await }
            },
        );
    } else {
        log::warn!("No external endpoints configured, status poller disabled");
    }

    {
        let events = events.clone();
        scheduler.add_job(
            "diagnostic",
            Trigger::Cron(Box::new(config.diagnostic_schedule.clone())),
            move || {
                let events = events.clone();
                async move {
                    events.post_diagnostic().await;
                }
            },
        );
    }

    {
        let (min, max) = config.broadcast_minutes;
        let minutes = rand::thread_rng().gen_range(min..=max);
        log::info!("[OVERSEER] Broadcasting every {} minutes", minutes);
        let events = events.clone();
        scheduler.add_job(
            "broadcast",
            Trigger::Interval(Duration::from_secs(minutes * 60)),
            move || {
                let events = events.clone();
                async move {
                    events.post_broadcast().await;
                }
            },
        );
    }

    events.post_activation().await;

    log::info!("Scheduled jobs: {}", scheduler.job_names().join(", "));
    scheduler.start();

    let state = Arc::new(AppState {
        health,
        activities,
        alerts,
        cache,
        events,
        monitors: config.monitors.clone(),
        start_time: Instant::now(),
        last_cycle_at,
        publisher: publisher.name().to_string(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        .route("/", axum::routing::get(dashboard::dashboard))
        // Read-only views
        .route("/api/health", axum::routing::get(routes::health))
        .route("/api/health/:service", axum::routing::get(routes::health_service))
        .route("/api/activities", axum::routing::get(routes::activities))
        .route("/api/alerts", axum::routing::get(routes::alerts))
        .route("/api/prices", axum::routing::get(routes::prices))
        // Service
        .route("/rpc/status", axum::routing::get(routes::status))
        // Game webhook
        .route(
            "/overseer-event",
            axum::routing::post(routes::overseer_event),
        )
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.bind, config.port);
    log::info!("Overseer Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
