// src/dedup.rs
//! Per-kind record of event IDs that were already pushed to subscribers.
//!
//! An ID stays recorded while its event is live. Alerts carry their expiry
//! with the ID and are forgotten once that time has passed, whether or not
//! the latest snapshot still lists them, so a mirror that briefly drops a
//! live alert can't trigger a second push. Invasions have no expiry and are
//! forgotten once gone from the feed. An ID that comes back after removal is
//! notified again.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::events::{Event, EventKind};
use crate::filter::FilterSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupTracker {
    /// `None` when the expiry is unknown (restored from a file without it).
    notified_alerts: HashMap<String, Option<DateTime<Utc>>>,
    notified_invasions: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore bare ID lists. Alert expiries start unknown; see
    /// [`with_alert_expiries`](Self::with_alert_expiries).
    pub fn from_snapshot<A, I>(alerts: A, invasions: I) -> Self
    where
        A: IntoIterator<Item = String>,
        I: IntoIterator<Item = String>,
    {
        Self {
            notified_alerts: alerts.into_iter().map(|id| (id, None)).collect(),
            notified_invasions: invasions.into_iter().collect(),
        }
    }

    /// Attach stored expiries to already-recorded alert IDs. Entries for IDs
    /// that aren't recorded are ignored.
    pub fn with_alert_expiries(mut self, expiries: BTreeMap<String, DateTime<Utc>>) -> Self {
        for (id, exp) in expiries {
            if let Some(slot) = self.notified_alerts.get_mut(&id) {
                *slot = Some(exp);
            }
        }
        self
    }

    /// Sorted copies of both ID sets, for persistence.
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let mut a: Vec<String> = self.notified_alerts.keys().cloned().collect();
        let mut i: Vec<String> = self.notified_invasions.iter().cloned().collect();
        a.sort();
        i.sort();
        (a, i)
    }

    /// Known expiries of recorded alerts, for persistence.
    pub fn alert_expiries(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.notified_alerts
            .iter()
            .filter_map(|(id, exp)| exp.map(|e| (id.clone(), e)))
            .collect()
    }

    /// Forget expired alert IDs, then return the live alerts in feed order.
    ///
    /// Expiry comes from the snapshot when the alert is listed, otherwise
    /// from the time stored when it was recorded. A recorded alert whose
    /// expiry was never known is only kept while the snapshot lists it.
    /// The whole list is scanned; the feed's recency ordering is not relied on.
    pub fn reconcile_alerts<'a>(&mut self, alerts: &'a [Event], now: DateTime<Utc>) -> Vec<&'a Event> {
        let listed: HashMap<&str, &Event> = alerts.iter().map(|a| (a.id.as_str(), a)).collect();
        for (id, exp) in self.notified_alerts.iter_mut() {
            if let Some(ev) = listed.get(id.as_str()).filter(|ev| ev.expiry.is_some()) {
                *exp = ev.expiry;
            }
        }
        self.notified_alerts.retain(|id, exp| match exp {
            Some(exp) => *exp >= now,
            None => listed.contains_key(id.as_str()),
        });

        alerts.iter().filter(|a| !a.is_expired(now)).collect()
    }

    /// Forget invasion IDs missing from `invasions`.
    pub fn reconcile_invasions<'a>(&mut self, invasions: &'a [Event]) -> Vec<&'a Event> {
        let present: HashSet<&str> = invasions.iter().map(|i| i.id.as_str()).collect();
        self.notified_invasions
            .retain(|id| present.contains(id.as_str()));

        invasions.iter().collect()
    }

    /// Both reconcile steps; live alerts first, then invasions.
    pub fn reconcile<'a>(
        &mut self,
        alerts: &'a [Event],
        invasions: &'a [Event],
        now: DateTime<Utc>,
    ) -> Vec<&'a Event> {
        let mut live = self.reconcile_alerts(alerts, now);
        live.extend(self.reconcile_invasions(invasions));
        live
    }

    /// True when `event` is new for its kind, still live and wanted by
    /// `filter`. Records the ID when it returns true. Deals are never pushed.
    pub fn should_notify(&mut self, event: &Event, filter: &FilterSet, now: DateTime<Utc>) -> bool {
        if self.is_recorded(event.kind, &event.id)
            || event.is_expired(now)
            || !filter.matches(&event.rewards)
        {
            return false;
        }
        match event.kind {
            EventKind::Alert => {
                self.notified_alerts.insert(event.id.clone(), event.expiry);
            }
            EventKind::Invasion => {
                self.notified_invasions.insert(event.id.clone());
            }
            EventKind::Deal => return false,
        }
        true
    }

    pub fn is_recorded(&self, kind: EventKind, id: &str) -> bool {
        match kind {
            EventKind::Alert => self.notified_alerts.contains_key(id),
            EventKind::Invasion => self.notified_invasions.contains(id),
            EventKind::Deal => false,
        }
    }

    pub fn len(&self) -> usize {
        self.notified_alerts.len() + self.notified_invasions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
