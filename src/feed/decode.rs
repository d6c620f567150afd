// src/feed/decode.rs
//! Explicit decode of the upstream payloads into [`Event`] / [`NewsItem`].
//!
//! The raw structs mirror only the fields we render; everything else in the
//! payload is ignored. A payload that doesn't deserialize maps to
//! [`FeedError::BadJson`], a well-formed but empty one to [`FeedError::Empty`].

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::FeedError;
use crate::events::{eta_string, Event, EventKind, NewsItem};

// --- tolerant building blocks ---

/// IDs come either as plain strings or Mongo-style `{"$id": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedId {
    Plain(String),
    Oid {
        #[serde(rename = "$id")]
        id: String,
    },
}

impl FeedId {
    fn into_string(self) -> String {
        match self {
            FeedId::Plain(s) => s,
            FeedId::Oid { id } => id,
        }
    }
}

/// Timestamps come either as `{"sec": N}` or a bare unix number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedTime {
    Mongo { sec: i64 },
    Unix(i64),
}

impl FeedTime {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            FeedTime::Mongo { sec } => *sec,
            FeedTime::Unix(s) => *s,
        };
        Utc.timestamp_opt(secs, 0).single()
    }
}

// --- alerts ---

#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(rename = "_id")]
    id: FeedId,
    #[serde(rename = "Expiry")]
    expiry: FeedTime,
    #[serde(rename = "MissionInfo")]
    mission: RawMission,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMission {
    #[serde(default)]
    location: String,
    #[serde(default)]
    mission_type: String,
    #[serde(default)]
    faction: String,
    #[serde(default)]
    min_enemy_level: u32,
    #[serde(default)]
    max_enemy_level: u32,
    #[serde(default)]
    mission_reward: RawReward,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReward {
    #[serde(default)]
    credits: u64,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    counted_items: Vec<RawCountedItem>,
}

#[derive(Debug, Deserialize)]
struct RawCountedItem {
    #[serde(rename = "ItemType")]
    item_type: String,
    #[serde(rename = "ItemCount", default = "one")]
    item_count: u32,
}

fn one() -> u32 {
    1
}

pub fn decode_alerts(body: &str, now: DateTime<Utc>) -> Result<Vec<Event>, FeedError> {
    let raw: Vec<RawAlert> = decode_array(body)?;
    let mut out = Vec::with_capacity(raw.len());
    for a in raw {
        let Some(expiry) = a.expiry.to_utc() else {
            tracing::debug!("alert with out-of-range expiry skipped");
            continue;
        };
        let reward = &a.mission.mission_reward;

        let mut rewards: Vec<String> = reward.items.clone();
        rewards.extend(reward.counted_items.iter().map(|c| c.item_type.clone()));

        let mut parts = Vec::new();
        if reward.credits > 0 {
            parts.push(format!("{}cr", reward.credits));
        }
        parts.extend(reward.items.iter().cloned());
        parts.extend(
            reward
                .counted_items
                .iter()
                .map(|c| format!("{}x {}", c.item_count, c.item_type)),
        );

        let m = &a.mission;
        let text = format!(
            "{} | {} ({}) lvl {}-{}\n{}\nExpires in {}",
            m.location,
            m.mission_type,
            m.faction,
            m.min_enemy_level,
            m.max_enemy_level,
            if parts.is_empty() {
                "No reward".to_string()
            } else {
                parts.join(" + ")
            },
            eta_string(expiry, now)
        );

        out.push(Event::new(
            EventKind::Alert,
            a.id.into_string(),
            Some(expiry),
            rewards,
            text,
        ));
    }
    Ok(out)
}

// --- invasions ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInvasion {
    id: FeedId,
    #[serde(default)]
    node: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    faction: String,
    #[serde(default)]
    defender_faction: String,
    #[serde(default)]
    attacker_reward: String,
    #[serde(default)]
    defender_reward: String,
    #[serde(default)]
    eta: String,
}

pub fn decode_invasions(body: &str) -> Result<Vec<Event>, FeedError> {
    let raw: Vec<RawInvasion> = decode_array(body)?;
    Ok(raw
        .into_iter()
        .map(|i| {
            let sides: Vec<&str> = [i.attacker_reward.trim(), i.defender_reward.trim()]
                .into_iter()
                .filter(|r| !r.is_empty())
                .collect();
            let rewards = sides.iter().map(|r| reward_name(r)).collect();

            let mut text = format!(
                "{} - {}\n{} vs {}\n{}",
                i.node,
                i.desc,
                i.faction,
                i.defender_faction,
                sides.join(" / ")
            );
            if !i.eta.trim().is_empty() {
                text.push_str(&format!("\nETA {}", i.eta.trim()));
            }

            Event::new(EventKind::Invasion, i.id.into_string(), None, rewards, text)
        })
        .collect())
}

// --- daily deals ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDeal {
    #[serde(rename = "_id")]
    id: FeedId,
    store_item: String,
    expiry: FeedTime,
    #[serde(default)]
    original_price: u32,
    #[serde(default)]
    sale_price: u32,
    #[serde(default)]
    amount_total: u32,
    #[serde(default)]
    amount_sold: u32,
}

pub fn decode_deals(body: &str, now: DateTime<Utc>) -> Result<Vec<Event>, FeedError> {
    let raw: Vec<RawDeal> = decode_array(body)?;
    let mut out = Vec::with_capacity(raw.len());
    for d in raw {
        let Some(expiry) = d.expiry.to_utc() else {
            continue;
        };
        let item = store_item_name(&d.store_item);
        let text = format!(
            "{}\n{}p (original {}p)\n{} / {} sold\nExpires in {}",
            item,
            d.sale_price,
            d.original_price,
            d.amount_sold,
            d.amount_total,
            eta_string(expiry, now)
        );
        out.push(Event::new(
            EventKind::Deal,
            d.id.into_string(),
            Some(expiry),
            vec![item],
            text,
        ));
    }
    Ok(out)
}

// --- news (pipe-separated text, one item per line) ---

pub fn decode_news(body: &str) -> Result<Vec<NewsItem>, FeedError> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(FeedError::Empty);
    }

    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let mut parts = line.splitn(4, '|');
        let (Some(id), Some(link), Some(ts), Some(text)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!(line, "news line skipped: expected 4 fields");
            continue;
        };
        let Some(published) = ts
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|s| Utc.timestamp_opt(s, 0).single())
        else {
            tracing::debug!(line, "news line skipped: bad timestamp");
            continue;
        };
        out.push(NewsItem {
            id: id.to_string(),
            link: link.to_string(),
            published,
            text: text.to_string(),
        });
    }

    if out.is_empty() {
        return Err(FeedError::BadJson("no parseable news line".into()));
    }
    Ok(out)
}

// --- helpers ---

fn decode_array<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, FeedError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FeedError::Empty);
    }
    let items: Vec<T> =
        serde_json::from_str(trimmed).map_err(|e| FeedError::BadJson(e.to_string()))?;
    if items.is_empty() {
        return Err(FeedError::Empty);
    }
    Ok(items)
}

/// `"3x Fieldron"` -> `"Fieldron"`; anything else is returned trimmed.
pub fn reward_name(raw: &str) -> String {
    static RE_COUNT: OnceCell<Regex> = OnceCell::new();
    let re = RE_COUNT.get_or_init(|| {
        Regex::new(r"^\d+\s*x\s+(?P<name>.+)$").expect("static reward-count regex")
    });
    let t = raw.trim();
    match re.captures(t).and_then(|c| c.name("name")) {
        Some(m) => m.as_str().trim().to_string(),
        None => t.to_string(),
    }
}

/// Store items may arrive as internal paths; keep the last segment.
fn store_item_name(raw: &str) -> String {
    raw.rsplit('/').next().unwrap_or(raw).trim().to_string()
}
