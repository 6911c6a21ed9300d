//! Game-event bridge: turns wallet/game webhooks into branded posts.

use crate::broadcast;
use crate::log_gate::ErrorLogGate;
use crate::registry::{ActivityLog, HealthRegistry};
use crate::twitter_api::{self, Publisher};
use chrono::Timelike;
use overseer_types::{GameEvent, HealthRecord, HealthStatus};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const BOT_NAME: &str = "OVERSEER V-BOT";

pub struct EventBridge {
    pub publisher: Arc<dyn Publisher>,
    pub health: Arc<HealthRegistry>,
    pub activities: Arc<ActivityLog>,
    pub log_gate: Arc<ErrorLogGate>,
    pub game_link: String,
}

impl EventBridge {
    /// Decode a raw webhook body. Malformed or unknown events are dropped.
    pub async fn handle_raw(&self, payload: serde_json::Value) -> Option<String> {
        match serde_json::from_value::<GameEvent>(payload) {
            Ok(event) => self.handle(&event).await,
            Err(e) => {
                log::warn!("[EVENT_BRIDGE] Ignoring malformed event: {}", e);
                None
            }
        }
    }

    /// Post one event and log it as activity. Returns the post id when
    /// publishing succeeded.
    pub async fn handle(&self, event: &GameEvent) -> Option<String> {
        let Some(body) = describe_event(event) else {
            log::debug!("[EVENT_BRIDGE] Ignoring unknown event type");
            return None;
        };

        let text = compose_update(&body, &self.game_link);
        let id = twitter_api::publish_tracked(
            self.publisher.as_ref(),
            &self.health,
            &self.log_gate,
            &text,
        )
        .await;

        self.activities
            .record(&format!("event_{}", event.kind()), body);
        log::info!("[EVENT_BRIDGE] Processed {} event", event.kind());
        id
    }

    /// Daily status post listing every dependency's health
    pub async fn post_diagnostic(&self) -> Option<String> {
        let text = compose_diagnostic(&self.health.get(), &self.game_link);
        let id = twitter_api::publish_tracked(
            self.publisher.as_ref(),
            &self.health,
            &self.log_gate,
            &text,
        )
        .await;
        self.activities.record("diagnostic", "Daily diagnostic posted");
        id
    }

    /// One themed broadcast of a random kind
    pub async fn post_broadcast(&self) -> Option<String> {
        let (kind, text) = {
            let mut rng = rand::thread_rng();
            let kind = broadcast::random_kind(&mut rng);
            let hour = chrono::Local::now().hour();
            (kind, broadcast::compose_broadcast(kind, &mut rng, hour, &self.game_link))
        };
        let id = twitter_api::publish_tracked(
            self.publisher.as_ref(),
            &self.health,
            &self.log_gate,
            &text,
        )
        .await;
        self.activities
            .record("broadcast", format!("Broadcast sent: {}", kind.as_str()));
        log::info!("[EVENT_BRIDGE] Broadcast sent: {}", kind.as_str());
        id
    }

    /// Start-up announcement
    pub async fn post_activation(&self) -> Option<String> {
        let text = broadcast::compose_activation(&mut rand::thread_rng(), &self.game_link);
        let id = twitter_api::publish_tracked(
            self.publisher.as_ref(),
            &self.health,
            &self.log_gate,
            &text,
        )
        .await;
        self.activities
            .record("activation", format!("{} online", BOT_NAME));
        id
    }
}

pub fn compose_diagnostic(health: &BTreeMap<String, HealthRecord>, game_link: &str) -> String {
    let mut lines = String::new();
    for (service, record) in health {
        if record.status == HealthStatus::Disabled {
            continue;
        }
        lines.push_str(&format!(
            "{}: {}\n",
            service,
            record.status.as_str().to_uppercase()
        ));
    }

    let text = format!(
        "☢️ OVERSEER DIAGNOSTIC ☢️\n\nSystem Status: ONLINE\nVault 77 Uplink: STABLE\n{}\n🎮 {}",
        lines, game_link
    );
    twitter_api::truncate_for_post(&text)
}

/// Branded update, falling back to a short form over the post limit
pub fn compose_update(body: &str, game_link: &str) -> String {
    let full = format!("☢️ {} UPDATE ☢️\n\n{}\n\n{}", BOT_NAME, body, game_link);
    if twitter_api::fits_in_post(&full) {
        return full;
    }
    twitter_api::truncate_for_post(&format!("☢️ {}\n\n{}", body, game_link))
}

/// Post body for a known event; `None` for unknown kinds
pub fn describe_event(event: &GameEvent) -> Option<String> {
    let lines: Vec<String> = match event {
        GameEvent::Perk { perk } => {
            let perk = text_or(perk, "Unknown Perk");
            vec![
                format!("PERK UNLOCKED: {}. The wasteland bends to your will.", perk),
                format!("New ability acquired: {}. Vault-Tec approves. Probably.", perk),
                format!("{} unlocked. The Overseer acknowledges your... competence.", perk),
            ]
        }
        GameEvent::Quest { code, message } => {
            let code = text_or(code, "UNKNOWN");
            let message = text_or(message, "Quest parameters classified.");
            vec![
                format!("QUEST TRIGGERED: [{}]\n{}", code, message),
                format!("New directive received. Code: {}. {}", code, message),
            ]
        }
        GameEvent::Swap {
            amount,
            from_token,
            to_token,
        } => {
            let amount = value_or(amount, "?");
            let from = text_or(from_token, "UNKNOWN");
            let to = text_or(to_token, "UNKNOWN");
            vec![
                format!("SWAP EXECUTED: {} {} → {}. The economy glows.", amount, from, to),
                format!("Currency exchange: {} {} → {}. FizzCo approves.", amount, from, to),
            ]
        }
        GameEvent::Moonpay { amount } => {
            let amount = value_or(amount, "?");
            vec![
                format!(
                    "VAULT FUNDING DETECTED: {} USDC via MoonPay. The treasury grows.",
                    amount
                ),
                format!("Funding confirmed: {} USDC. Vault-Tec shareholders rejoice.", amount),
            ]
        }
        GameEvent::Nft { action, name } => {
            let action = text_or(action, "detected");
            let name = text_or(name, "Unknown Item");
            vec![
                format!(
                    "NFT {}: {}. The Overseer acknowledges this artifact.",
                    action.to_uppercase(),
                    name
                ),
                format!("Digital artifact {}: {}. Logged in Vault-Tec archives.", action, name),
            ]
        }
        GameEvent::Claim { location, caps } => {
            let location = text_or(location, "Unknown Location");
            let caps = value_or(caps, "0");
            vec![
                format!("LOCATION CLAIMED: {}. +{} CAPS. Territory secured.", location, caps),
                format!("Claim successful: {}. {} CAPS added to your stash.", location, caps),
            ]
        }
        GameEvent::LevelUp { level, player } => {
            let level = value_or(level, "?");
            let player = text_or(player, "Dweller");
            vec![
                format!("LEVEL UP: {} reached Level {}. Evolution confirmed.", player, level),
                format!("{} leveled up to {}. Survival odds: improved.", player, level),
            ]
        }
        GameEvent::Unknown => return None,
    };

    lines.choose(&mut rand::thread_rng()).cloned()
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

/// Senders mix numbers and strings for amounts
fn value_or(value: &Option<serde_json::Value>, default: &str) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}
