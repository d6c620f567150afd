// src/state.rs
//! Persisted snapshot of subscribers and already-notified event IDs.
//!
//! A missing or corrupt file is never fatal: the bot starts empty and logs
//! why. Older files are a bare JSON array of chat IDs; that legacy layout
//! still loads, as subscribers with empty dedup sets.
//!
//! `alertExpiry` holds the known expiry of each notified alert so the
//! tracker can forget alerts that expire while missing from the feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::dedup::DedupTracker;
use crate::registry::{ChatId, SubscriberRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub subscribers: Vec<ChatId>,
    #[serde(default)]
    pub notified_alerts: Vec<String>,
    #[serde(default)]
    pub notified_invasions: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alert_expiry: BTreeMap<String, DateTime<Utc>>,
}

impl PersistedState {
    pub fn capture(registry: &SubscriberRegistry, tracker: &DedupTracker) -> Self {
        let (notified_alerts, notified_invasions) = tracker.snapshot();
        Self {
            subscribers: registry.snapshot().into_iter().collect(),
            notified_alerts,
            notified_invasions,
            alert_expiry: tracker.alert_expiries(),
        }
    }

    pub fn into_parts(self) -> (SubscriberRegistry, DedupTracker) {
        (
            SubscriberRegistry::with_subscribers(self.subscribers),
            DedupTracker::from_snapshot(self.notified_alerts, self.notified_invasions)
                .with_alert_expiries(self.alert_expiry),
        )
    }
}

// --- tolerant on-disk variants ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateFile {
    Full(PersistedState),
    Legacy(Vec<ChatId>),
}

impl From<StateFile> for PersistedState {
    fn from(f: StateFile) -> Self {
        match f {
            StateFile::Full(s) => s,
            StateFile::Legacy(subscribers) => PersistedState {
                subscribers,
                ..Default::default()
            },
        }
    }
}

pub fn parse_state(content: &str) -> Result<PersistedState> {
    let f: StateFile = serde_json::from_str(content).context("parse state json")?;
    Ok(f.into())
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Never fails; unreadable state degrades to empty.
    async fn load(&self) -> PersistedState;
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file, replaced atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> PersistedState {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "state file not found, starting empty");
                return PersistedState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "state file unreadable, starting empty: {e:#}");
                return PersistedState::default();
            }
        };
        match parse_state(&content) {
            Ok(s) => {
                tracing::info!(
                    path = %self.path.display(),
                    subscribers = s.subscribers.len(),
                    alerts = s.notified_alerts.len(),
                    invasions = s.notified_invasions.len(),
                    "state loaded"
                );
                s
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "state file corrupt, starting empty: {e:#}");
                PersistedState::default()
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create state dir {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(state).context("serialize state")?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename state into {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_chat_array_loads_as_subscribers() {
        let s = parse_state("[12, -34]").unwrap();
        assert_eq!(s.subscribers, vec![12, -34]);
        assert!(s.notified_alerts.is_empty());
    }

    #[test]
    fn camel_case_layout() {
        let s = PersistedState {
            subscribers: vec![42],
            notified_alerts: vec!["a1".into()],
            ..Default::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"notifiedAlerts\":[\"a1\"]"));
        assert!(!json.contains("alertExpiry"));
        assert_eq!(parse_state(&json).unwrap(), s);
    }

    #[test]
    fn alert_expiry_survives_capture_and_restore() {
        use crate::events::{Event, EventKind};
        use crate::filter::FilterSet;
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let exp = now + chrono::Duration::hours(1);
        let a1 = Event::new(EventKind::Alert, "a1", Some(exp), vec!["Forma".into()], "a1");
        let mut tracker = DedupTracker::new();
        assert!(tracker.should_notify(&a1, &FilterSet::new(vec!["Forma".into()]), now));

        let state = PersistedState::capture(&SubscriberRegistry::new(), &tracker);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"alertExpiry\":{\"a1\":"));

        let (_, mut restored) = parse_state(&json).unwrap().into_parts();
        assert_eq!(restored, tracker);
        // still recorded while missing from the feed, until it expires
        restored.reconcile_alerts(&[], now);
        assert!(restored.is_recorded(EventKind::Alert, "a1"));
    }

    #[test]
    fn partial_object_fills_defaults() {
        let s = parse_state(r#"{"subscribers":[7]}"#).unwrap();
        assert_eq!(s.subscribers, vec![7]);
        assert!(s.notified_invasions.is_empty());
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        let store = JsonFileStore::new("state/chats.json");
        assert_eq!(store.tmp_path(), PathBuf::from("state/chats.json.tmp"));
    }
}
