// src/listing.rs
//! Rendering of on-demand replies. Pure: no fetching, no dedup state.

use chrono::{DateTime, Utc};

use crate::events::{Event, NewsItem};
use crate::filter::FilterSet;

/// Separator between events in one message.
pub const EVENT_SEPARATOR: &str = "\n\n";

/// Live alerts, reward-filtered unless `show_all`.
pub fn render_alerts(alerts: &[Event], filter: &FilterSet, show_all: bool, now: DateTime<Utc>) -> String {
    let shown: Vec<&str> = alerts
        .iter()
        .filter(|a| !a.is_expired(now))
        .filter(|a| show_all || filter.matches(&a.rewards))
        .map(|a| a.display_text.as_str())
        .collect();
    or_placeholder(shown, if show_all { "No alerts" } else { "No filtered alerts" })
}

/// Current invasions, reward-filtered unless `show_all`.
pub fn render_invasions(invasions: &[Event], filter: &FilterSet, show_all: bool) -> String {
    let shown: Vec<&str> = invasions
        .iter()
        .filter(|i| show_all || filter.matches(&i.rewards))
        .map(|i| i.display_text.as_str())
        .collect();
    or_placeholder(
        shown,
        if show_all { "No invasions" } else { "No filtered invasions" },
    )
}

pub fn render_deals(deals: &[Event], now: DateTime<Utc>) -> String {
    let shown: Vec<&str> = deals
        .iter()
        .filter(|d| !d.is_expired(now))
        .map(|d| d.display_text.as_str())
        .collect();
    or_placeholder(shown, "No deals")
}

/// Newest first.
pub fn render_news(items: &[NewsItem], now: DateTime<Utc>) -> String {
    let mut sorted: Vec<&NewsItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.published.cmp(&a.published));
    let rendered: Vec<String> = sorted.iter().map(|n| n.render(now)).collect();
    if rendered.is_empty() {
        return "No news".to_string();
    }
    rendered.join(EVENT_SEPARATOR)
}

fn or_placeholder(shown: Vec<&str>, empty: &str) -> String {
    if shown.is_empty() {
        empty.to_string()
    } else {
        shown.join(EVENT_SEPARATOR)
    }
}
