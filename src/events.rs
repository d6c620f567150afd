// src/events.rs
//! Normalized feed records. Built fresh on every fetch, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Alert,
    Invasion,
    Deal,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Alert => "alert",
            EventKind::Invasion => "invasion",
            EventKind::Deal => "deal",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert, invasion or daily deal as seen in a single feed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub id: String,
    /// Alerts and deals only. Invasions leave the feed when resolved.
    pub expiry: Option<DateTime<Utc>>,
    pub rewards: Vec<String>,
    pub display_text: String,
}

impl Event {
    pub fn new(
        kind: EventKind,
        id: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
        rewards: Vec<String>,
        display_text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            expiry,
            rewards,
            display_text: display_text.into(),
        }
    }

    /// An event without expiry never expires by time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry, Some(exp) if exp < now)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text)
    }
}

/// A news headline. Not an [`Event`]: no rewards, never pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub id: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub text: String,
}

impl NewsItem {
    pub fn render(&self, now: DateTime<Utc>) -> String {
        format!(
            "[{} ago]: {}\n{}",
            elapsed_string(self.published, now),
            self.text,
            self.link
        )
    }
}

/// `"H hrs, M mins"` until `expiry`; clamps at zero once passed.
pub fn eta_string(expiry: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (expiry - now).num_seconds().max(0);
    format!("{} hrs, {} mins", secs / 3600, (secs % 3600) / 60)
}

/// Compact age: `Nd` past a day, `Nh Mm` past an hour, else `Mm`.
pub fn elapsed_string(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0);
    if secs >= 86_400 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}m", secs / 60)
    }
}
