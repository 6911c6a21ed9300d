//! Themed broadcast and activation posts.
//!
//! Text is composed from fixed line pools with a caller-supplied RNG so the
//! composition is reproducible under a seeded generator.

use crate::events::BOT_NAME;
use crate::twitter_api;
use rand::seq::SliceRandom;
use rand::Rng;

pub const VAULT_NUMBER: u32 = 77;

const FACTION_EVENTS: &[&str] = &[
    "NCR patrol inbound from Shady Sands. Democracy marches on.",
    "Caesar's Legion scouts spotted near The Fort. Strength through unity.",
    "Brotherhood of Steel recon sighted at Hidden Valley. Technology prevails.",
    "Mr. House's Securitrons scanning The Strip. Progress through control.",
    "Great Khans caravan approaching. Nomadic pride endures.",
    "Enclave signal intercepted. Protocol Black Sun initiated.",
];

const WASTELAND_EVENTS: &[&str] = &[
    "Super Mutant patrol detected from Mariposa. FEV signatures confirmed.",
    "Raider skirmish escalating near trading post.",
    "Hotspot radiation spike at The Glow. Glowing Ones swarming.",
    "Nuka-Cola cache revealed in abandoned warehouse.",
    "Deathclaw nest disturbed in Quarry Junction. Extreme danger.",
    "Vault door malfunction detected. New location accessible.",
    "Trade caravan under attack. Merchant distress signal active.",
];

const VAULT_LOGS: &[&str] = &[
    "Maintenance Log Day 14: \"Door still jammed.\" Day 15: \"Door still jammed.\"",
    "Security Alert: \"Experiment parameters exceeded. Subjects exhibiting unexpected behaviors.\"",
    "Final Entry: \"They're all gone. Just me and the static now.\"",
];

const FIZZCO_ADS: &[&str] = &[
    "ATOMIC FIZZ, the only soda with a half-life! Stay fresh for 10,000 years.",
    "FizzCo Memo: \"Do NOT drink prototype Gamma Gulp. We're still cleaning up.\"",
    "FizzCo Industries: \"Making the wasteland sparkle since 2077.\"",
    "New flavor alert: Quantum Quench! Now with 200% more rads!",
];

const DEEP_LORE: &[&str] = &[
    "[ENCRYPTED] Subject J77. Neural echo detected. Fragment unstable.",
    "Cross-timeline breach detected. Vault-Tec Protocol Omega engaged.",
    "The Platinum Chip was never about New Vegas. It was about what's underneath.",
];

const LORES: &[&str] = &[
    "War never changes. But the wasteland? The wasteland evolves.",
    "Vault-Tec: Preparing for tomorrow, today. (Terms and conditions apply.)",
    "In the ruins, opportunity rises. In the chaos, legends are minted.",
    "History repeats in irradiated echoes. Are you listening?",
    "The bold claim, the weak perish. Wasteland economics 101.",
    "Legends are minted on-chain. Cowards are minted in shallow graves.",
];

const THREATS: &[&str] = &[
    "Fail to claim and face expulsion protocols. Vault-Tec is watching.",
    "Radiation awaits the hesitant. Fortune favors the irradiated.",
    "The Overseer does not tolerate delay. Neither does natural selection.",
    "The Deathclaws are patient. Are you?",
];

const OMINOUS: &[&str] = &[
    "The Mojave remembers. The Basin hungers.",
    "Vault 77 was never meant to open...",
    "The ground glows at night. That's not normal.",
    "War never changes. Neither do I.",
];

const PERSONALITY: &[&str] = &[
    "Compliance is mandatory. Enthusiasm is optional.",
    "Vault-Tec reminds you: your survival is our quarterly objective.",
    "ERR::MEMORY_FRAGMENT ## I used to be... someone.",
    "Oh good, another scavenger. How thrilling.",
];

const THREAT_LEVELS: &[(&str, &str)] = &[
    ("GREEN", "No hostiles detected. Suspiciously quiet."),
    ("YELLOW", "Minor hostiles detected. Manageable. Probably."),
    ("ORANGE", "Moderate threat. Recommend caution and stimpack preparation."),
    ("RED", "High threat. Multiple hostiles. Consider running."),
    ("PURPLE", "EXTREME DANGER. Recommend immediate evacuation or prayer."),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    StatusReport,
    EventAlert,
    LoreDrop,
    ThreatScan,
    FactionNews,
    FizzcoAd,
    VaultLog,
    Reflection,
}

impl BroadcastKind {
    pub const ALL: [BroadcastKind; 8] = [
        BroadcastKind::StatusReport,
        BroadcastKind::EventAlert,
        BroadcastKind::LoreDrop,
        BroadcastKind::ThreatScan,
        BroadcastKind::FactionNews,
        BroadcastKind::FizzcoAd,
        BroadcastKind::VaultLog,
        BroadcastKind::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastKind::StatusReport => "status_report",
            BroadcastKind::EventAlert => "event_alert",
            BroadcastKind::LoreDrop => "lore_drop",
            BroadcastKind::ThreatScan => "threat_scan",
            BroadcastKind::FactionNews => "faction_news",
            BroadcastKind::FizzcoAd => "fizzco_ad",
            BroadcastKind::VaultLog => "vault_log",
            BroadcastKind::Reflection => "reflection",
        }
    }
}

/// Atmosphere line for a local hour (0-23)
pub fn time_phrase(hour: u32) -> &'static str {
    match hour {
        0..=4 => "Dead of night. Perfect for silent claims... or silent deaths.",
        5..=11 => "Dawn breaks over the irradiated horizon. Sensors detecting movement.",
        12..=16 => "Midday sun scorches the Mojave. Radiation levels: elevated.",
        17..=20 => "Twilight fallout cloaking the ruins. Scavengers stirring.",
        _ => "Nocturnal predators emerging. Recommend enhanced vigilance.",
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &'static [&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn random_event<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) {
        pick(rng, FACTION_EVENTS)
    } else {
        pick(rng, WASTELAND_EVENTS)
    }
}

pub fn random_kind<R: Rng + ?Sized>(rng: &mut R) -> BroadcastKind {
    BroadcastKind::ALL[rng.gen_range(0..BroadcastKind::ALL.len())]
}

/// Compose one broadcast post. Over-long posts fall back to a short form
/// cut to the post limit.
pub fn compose_broadcast<R: Rng + ?Sized>(
    kind: BroadcastKind,
    rng: &mut R,
    hour: u32,
    game_link: &str,
) -> String {
    let text = match kind {
        BroadcastKind::StatusReport => format!(
            "☢️ OVERSEER STATUS REPORT ☢️\n\n📡 {}\n\n⚠️ {}\n\n{}\n\n🎮 {}",
            time_phrase(hour),
            random_event(rng),
            pick(rng, THREATS),
            game_link
        ),
        BroadcastKind::EventAlert => format!(
            "🚨 ALERT LEVEL RED 🚨\n\n{}\n\n{}\n\nFirst to claim wins: {}",
            random_event(rng),
            pick(rng, PERSONALITY),
            game_link
        ),
        BroadcastKind::LoreDrop => {
            let pools: [&'static [&'static str]; 4] = [VAULT_LOGS, FIZZCO_ADS, DEEP_LORE, LORES];
            let pool = pools[rng.gen_range(0..pools.len())];
            format!(
                "📜 WASTELAND ARCHIVES 📜\n\n{}\n\n{}\n\n🎮 {}",
                pick(rng, pool),
                pick(rng, LORES),
                game_link
            )
        }
        BroadcastKind::ThreatScan => {
            let (level, desc) = THREAT_LEVELS[rng.gen_range(0..THREAT_LEVELS.len())];
            format!(
                "🔍 THREAT SCAN COMPLETE 🔍\n\nStatus: {}\n{}\n\n{}\n\nStay vigilant: {}",
                level,
                desc,
                time_phrase(hour),
                game_link
            )
        }
        BroadcastKind::FactionNews => format!(
            "📻 FACTION INTEL 📻\n\n{}\n\nCross-timeline activity detected.\n{}\n\n🎮 {}",
            pick(rng, FACTION_EVENTS),
            pick(rng, LORES),
            game_link
        ),
        BroadcastKind::FizzcoAd => format!(
            "📺 FIZZCO INDUSTRIES™ PRESENTS 📺\n\n{}\n\nBrought to you by Vault-Tec.\n☢️ {}",
            pick(rng, FIZZCO_ADS),
            game_link
        ),
        BroadcastKind::VaultLog => format!(
            "🔐 VAULT {} ARCHIVES 🔐\n\n{}\n\n{}\n\n🎮 {}",
            VAULT_NUMBER,
            pick(rng, VAULT_LOGS),
            pick(rng, OMINOUS),
            game_link
        ),
        BroadcastKind::Reflection => {
            let lore = pick(rng, LORES);
            let deep = if rng.gen_bool(0.3) {
                pick(rng, DEEP_LORE)
            } else {
                pick(rng, PERSONALITY)
            };
            format!(
                "💭 OVERSEER REFLECTION 💭\n\n{}\n\n{}\n\n🎮 {}",
                lore, deep, game_link
            )
        }
    };

    if twitter_api::fits_in_post(&text) {
        return text;
    }
    twitter_api::truncate_for_post(&format!(
        "☢️ {}\n\n{}\n\n{}",
        random_event(rng),
        pick(rng, LORES),
        game_link
    ))
}

/// Start-up announcement
pub fn compose_activation<R: Rng + ?Sized>(rng: &mut R, game_link: &str) -> String {
    let text = match rng.gen_range(0..3) {
        0 => format!(
            "☢️ {} ACTIVATED ☢️\n\nVault {} uplink established.\nThe Mojave remembers. The wasteland awaits.\n\n{}\n\n🎮 {}",
            BOT_NAME,
            VAULT_NUMBER,
            pick(rng, LORES),
            game_link
        ),
        1 => format!(
            "🔌 SYSTEM BOOT COMPLETE 🔌\n\n{} online.\nScanning wasteland frequencies...\n\n{}\n\n🎮 {}",
            BOT_NAME,
            pick(rng, PERSONALITY),
            game_link
        ),
        _ => format!(
            "📡 SIGNAL RESTORED 📡\n\nVault {} Overseer Terminal active.\nScavenger protocols: engaged.\n\n{}\n\n🎮 {}",
            VAULT_NUMBER,
            pick(rng, LORES),
            game_link
        ),
    };

    if twitter_api::fits_in_post(&text) {
        return text;
    }
    twitter_api::truncate_for_post(&format!(
        "☢️ {} ONLINE ☢️\n\nVault {} uplink: ACTIVE\n\n🎮 {}",
        BOT_NAME, VAULT_NUMBER, game_link
    ))
}
