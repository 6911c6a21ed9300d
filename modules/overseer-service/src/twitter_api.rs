//! Post publishing: Twitter/X API v2 with OAuth 1.0a, or a log-only
//! stand-in when no credentials are configured.

use crate::log_gate::ErrorLogGate;
use crate::registry::HealthRegistry;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use overseer_types::HealthStatus;
use sha1::Sha1;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

pub const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";
pub const TWITTER_CHAR_LIMIT: usize = 280;

/// Twitter OAuth 1.0a credentials
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishError {
    RateLimited,
    Auth(String),
    Network(String),
    Api { status: u16, message: String },
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::RateLimited => write!(f, "Rate limited by Twitter"),
            PublishError::Auth(msg) => write!(f, "Twitter auth failed: {}", msg),
            PublishError::Network(msg) => write!(f, "Twitter request failed: {}", msg),
            PublishError::Api { status, message } => {
                write!(f, "Twitter API error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for PublishError {}

const PUBLISH_ERROR_KINDS: &[&str] = &["rate_limited", "auth", "network", "api"];

impl PublishError {
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::RateLimited => "rate_limited",
            PublishError::Auth(_) => "auth",
            PublishError::Network(_) => "network",
            PublishError::Api { .. } => "api",
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        PublishError::Network(e.to_string())
    }
}

/// Anything that can put a text post in front of followers
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// Whether outcomes should be reflected in the health registry
    fn reports_health(&self) -> bool {
        true
    }

    /// Publish `text` and return the new post id
    async fn publish(&self, text: &str) -> Result<String, PublishError>;
}

/// Publish one post, recording the outcome in health and gated logs.
/// Failures are not retried.
pub async fn publish_tracked(
    publisher: &dyn Publisher,
    health: &HealthRegistry,
    log_gate: &ErrorLogGate,
    text: &str,
) -> Option<String> {
    let service = publisher.name();
    match publisher.publish(text).await {
        Ok(id) => {
            if publisher.reports_health() {
                health.update(service, HealthStatus::Healthy, None);
            }
            log_gate.reset_kinds(service, PUBLISH_ERROR_KINDS);
            log::info!("[TWITTER] Posted {} via {}", id, service);
            Some(id)
        }
        Err(e) => {
            if publisher.reports_health() {
                health.update(service, HealthStatus::Unhealthy, Some(&e.to_string()));
            }
            if log_gate.should_log(service, e.kind()) {
                log::error!("[TWITTER] Failed to post via {}: {}", service, e);
            } else {
                log::debug!("[TWITTER] Failed to post via {} (suppressed): {}", service, e);
            }
            None
        }
    }
}

/// Cut `text` to the post limit, counting characters rather than bytes
pub fn truncate_for_post(text: &str) -> String {
    text.chars().take(TWITTER_CHAR_LIMIT).collect()
}

pub fn fits_in_post(text: &str) -> bool {
    text.chars().count() <= TWITTER_CHAR_LIMIT
}

// =====================================================
// Twitter
// =====================================================

pub struct TwitterPublisher {
    client: reqwest::Client,
    credentials: TwitterCredentials,
}

impl TwitterPublisher {
    pub fn new(client: reqwest::Client, credentials: TwitterCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn publish(&self, text: &str) -> Result<String, PublishError> {
        let auth = generate_oauth_header("POST", TWEETS_URL, &self.credentials);
        let body = serde_json::json!({ "text": truncate_for_post(text) });

        let response = self
            .client
            .post(TWEETS_URL)
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_create_response(status, &body)
    }
}

/// Map a `POST /2/tweets` response to the new tweet id
pub fn parse_create_response(status: u16, body: &str) -> Result<String, PublishError> {
    match status {
        200..=299 => {}
        429 => return Err(PublishError::RateLimited),
        401 | 403 => return Err(PublishError::Auth(truncate_error(body).to_string())),
        _ => {
            return Err(PublishError::Api {
                status,
                message: truncate_error(body).to_string(),
            })
        }
    }

    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| PublishError::Api {
        status,
        message: format!("Invalid JSON: {}", e),
    })?;

    json.get("data")
        .and_then(|d| d.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| PublishError::Api {
            status,
            message: "Response did not include a tweet id".to_string(),
        })
}

// =====================================================
// Log-only
// =====================================================

/// Stand-in used when Twitter credentials are not configured
#[derive(Default)]
pub struct LogPublisher {
    sent: AtomicU64,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    fn reports_health(&self) -> bool {
        false
    }

    async fn publish(&self, text: &str) -> Result<String, PublishError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("[TWITTER] (not posted, no credentials) #{}: {}", n, text);
        Ok(format!("local-{}", n))
    }
}

// =====================================================
// OAuth 1.0a
// =====================================================

fn percent_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

fn generate_oauth_header(method: &str, url: &str, credentials: &TwitterCredentials) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string();

    let nonce: String = (0..16)
        .map(|_| format!("{:02x}", rand::random::<u8>()))
        .collect();

    sign_oauth_header(method, url, credentials, &nonce, &timestamp)
}

/// JSON bodies are not part of the signature base string, so only the
/// oauth_* parameters are signed.
fn sign_oauth_header(
    method: &str,
    url: &str,
    credentials: &TwitterCredentials,
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut oauth_params: Vec<(&str, &str)> = vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];
    oauth_params.sort_by(|a, b| a.0.cmp(b.0));

    let param_string: String = oauth_params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );

    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.access_token_secret)
    );

    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let mut header_params = oauth_params.clone();
    header_params.push(("oauth_signature", signature.as_str()));
    header_params.sort_by(|a, b| a.0.cmp(b.0));

    let auth_string: String = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {}", auth_string)
}

fn truncate_error(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every post; fails every call while `failure` is set
    #[derive(Default)]
    pub(crate) struct FakePublisher {
        pub(crate) posts: Mutex<Vec<String>>,
        pub(crate) failure: Mutex<Option<PublishError>>,
    }

    impl FakePublisher {
        pub(crate) fn failing(error: PublishError) -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                failure: Mutex::new(Some(error)),
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        fn name(&self) -> &str {
            "twitter"
        }

        async fn publish(&self, text: &str) -> Result<String, PublishError> {
            if let Some(e) = self.failure.lock().clone() {
                return Err(e);
            }
            let mut posts = self.posts.lock();
            posts.push(text.to_string());
            Ok(format!("tweet-{}", posts.len()))
        }
    }

    fn credentials() -> TwitterCredentials {
        TwitterCredentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(percent_encode("☢"), "%E2%98%A2");
    }

    #[test]
    fn test_oauth_header_signature() {
        let header = sign_oauth_header(
            "post",
            TWEETS_URL,
            &credentials(),
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            "1318622958",
        );
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", "));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
        assert!(header.contains("oauth_signature=\"KW%2FbTR%2F89oblzvjn7CwP2L8j5qQ%3D\""));
        assert!(header.ends_with("oauth_version=\"1.0\""));
    }

    #[test]
    fn test_parse_create_response() {
        let id = parse_create_response(
            201,
            r#"{"data":{"id":"1445880548472328192","text":"hello"}}"#,
        )
        .unwrap();
        assert_eq!(id, "1445880548472328192");

        assert_eq!(parse_create_response(429, ""), Err(PublishError::RateLimited));
        assert!(matches!(
            parse_create_response(401, "Unauthorized"),
            Err(PublishError::Auth(_))
        ));
        assert!(matches!(
            parse_create_response(500, "oops"),
            Err(PublishError::Api { status: 500, .. })
        ));
        assert!(matches!(
            parse_create_response(200, r#"{"errors":[]}"#),
            Err(PublishError::Api { .. })
        ));
    }

    #[test]
    fn test_truncate_for_post_counts_chars() {
        let text = "☢".repeat(300);
        let cut = truncate_for_post(&text);
        assert_eq!(cut.chars().count(), TWITTER_CHAR_LIMIT);
        assert!(fits_in_post(&cut));
        assert!(!fits_in_post(&text));
        assert_eq!(truncate_for_post("short"), "short");
    }

    #[tokio::test]
    async fn test_log_publisher_ids() {
        let publisher = LogPublisher::new();
        assert_eq!(publisher.publish("one").await.unwrap(), "local-1");
        assert_eq!(publisher.publish("two").await.unwrap(), "local-2");
        assert_eq!(publisher.name(), "log");
    }

    #[tokio::test]
    async fn test_publish_tracked_updates_health() {
        let health = HealthRegistry::new(["twitter"]);
        let gate = ErrorLogGate::new();

        let failing = FakePublisher::failing(PublishError::RateLimited);
        assert!(publish_tracked(&failing, &health, &gate, "hello").await.is_none());
        let record = health.get_service("twitter").unwrap();
        assert_eq!(record.status, HealthStatus::Unhealthy);
        assert_eq!(record.error.as_deref(), Some("Rate limited by Twitter"));
        assert_eq!(gate.count("twitter", "rate_limited"), 1);

        *failing.failure.lock() = None;
        let id = publish_tracked(&failing, &health, &gate, "hello").await;
        assert_eq!(id.as_deref(), Some("tweet-1"));
        assert_eq!(health.get_service("twitter").unwrap().status, HealthStatus::Healthy);
        assert_eq!(gate.count("twitter", "rate_limited"), 0);
    }

    #[tokio::test]
    async fn test_log_publisher_leaves_health_alone() {
        let health = HealthRegistry::new(std::iter::empty());
        health.update("twitter", HealthStatus::Disabled, Some("No credentials configured"));
        let gate = ErrorLogGate::new();

        publish_tracked(&LogPublisher::new(), &health, &gate, "hi").await;
        assert_eq!(health.get_service("twitter").unwrap().status, HealthStatus::Disabled);
        assert!(health.get_service("log").is_none());
    }
}
