//! # Notification Engine
//! Timer-driven fetch -> reconcile -> filter -> fan-out loop, plus the
//! on-demand listing queries used by chat commands.
//!
//! The loop parks on the registry's polling signal while nobody is
//! subscribed (`Idle`) and runs one cycle per interval otherwise (`Polling`).
//! The [`DedupTracker`] is owned by the loop and handed back when it stops.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::dedup::DedupTracker;
use crate::error::FeedError;
use crate::events::Event;
use crate::feed::EventSource;
use crate::filter::RewardFilter;
use crate::listing::{self, EVENT_SEPARATOR};
use crate::notify::Transport;
use crate::registry::SubscriberRegistry;
use crate::state::{PersistedState, StateStore};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Polling,
}

/// Result of fetching both pushable feeds for one cycle.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub alerts: Result<Vec<Event>, FeedError>,
    pub invasions: Result<Vec<Event>, FeedError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub alerts_ok: bool,
    pub invasions_ok: bool,
    pub notified: usize,
    pub delivered: usize,
    pub failed: usize,
    pub dedup_changed: bool,
}

#[derive(Clone)]
pub struct NotificationEngine {
    source: Arc<dyn EventSource>,
    transport: Arc<dyn Transport>,
    filter: RewardFilter,
    registry: Arc<SubscriberRegistry>,
    interval: Duration,
    checkpoint: Option<Arc<dyn StateStore>>,
}

impl NotificationEngine {
    pub fn new(
        source: Arc<dyn EventSource>,
        transport: Arc<dyn Transport>,
        filter: RewardFilter,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            source,
            transport,
            filter,
            registry,
            interval: DEFAULT_INTERVAL,
            checkpoint: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Save state after every cycle that changed the dedup sets.
    pub fn with_checkpoint(mut self, store: Arc<dyn StateStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn state(&self) -> EngineState {
        if self.registry.is_active() {
            EngineState::Polling
        } else {
            EngineState::Idle
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn filter(&self) -> &RewardFilter {
        &self.filter
    }

    /// Run until `cancel` fires, then return the tracker for the final
    /// checkpoint. A fetch in flight at cancellation is abandoned; evaluation
    /// and delivery, once started, complete.
    pub async fn run(&self, mut tracker: DedupTracker, cancel: CancellationToken) -> DedupTracker {
        crate::metrics::ensure_described();
        let mut active = self.registry.active();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                ok = wait_active(&mut active) => {
                    if !ok {
                        break;
                    }
                }
            }

            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                s = self.fetch() => s,
            };

            self.process(&mut tracker, &snapshot, Utc::now()).await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(tracked = tracker.len(), "notification loop stopped");
        tracker
    }

    /// One full cycle without cancellation points.
    pub async fn run_cycle(&self, tracker: &mut DedupTracker) -> CycleReport {
        let snapshot = self.fetch().await;
        self.process(tracker, &snapshot, Utc::now()).await
    }

    /// Fetch alerts and invasions concurrently; each result stands alone.
    pub async fn fetch(&self) -> FeedSnapshot {
        let (alerts, invasions) =
            tokio::join!(self.source.fetch_alerts(), self.source.fetch_invasions());
        FeedSnapshot { alerts, invasions }
    }

    /// Reconcile + evaluate + deliver for an already-fetched snapshot, then
    /// checkpoint if the dedup sets changed.
    ///
    /// A failed feed is skipped for this cycle and its dedup set is left as
    /// it was; the other feed is still evaluated.
    pub async fn process(
        &self,
        tracker: &mut DedupTracker,
        snapshot: &FeedSnapshot,
        now: DateTime<Utc>,
    ) -> CycleReport {
        counter!("warbot_poll_cycles_total").increment(1);
        if let Err(e) = &snapshot.alerts {
            record_feed_error("alerts", e);
        }
        if let Err(e) = &snapshot.invasions {
            record_feed_error("invasions", e);
        }

        let before = tracker.clone();
        let texts = self.evaluate(tracker, snapshot, now);

        let mut report = CycleReport {
            alerts_ok: snapshot.alerts.is_ok(),
            invasions_ok: snapshot.invasions.is_ok(),
            notified: texts.len(),
            dedup_changed: before != *tracker,
            ..Default::default()
        };

        if !texts.is_empty() {
            counter!("warbot_notifications_total").increment(texts.len() as u64);
            let body = texts.join(EVENT_SEPARATOR);
            let (delivered, failed) = self.deliver(&body).await;
            report.delivered = delivered;
            report.failed = failed;
        }

        tracing::info!(
            alerts_ok = report.alerts_ok,
            invasions_ok = report.invasions_ok,
            notified = report.notified,
            delivered = report.delivered,
            failed = report.failed,
            "poll cycle"
        );
        if report.dedup_changed {
            self.save_checkpoint(tracker).await;
        }
        report
    }

    /// Display texts of the events to push this cycle, alerts first.
    /// Records every returned event in `tracker`.
    pub fn evaluate(
        &self,
        tracker: &mut DedupTracker,
        snapshot: &FeedSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let filter = self.filter.current();

        let mut live: Vec<&Event> = Vec::new();
        if let Ok(alerts) = &snapshot.alerts {
            live.extend(tracker.reconcile_alerts(alerts, now));
        }
        if let Ok(invasions) = &snapshot.invasions {
            live.extend(tracker.reconcile_invasions(invasions));
        }

        live.into_iter()
            .filter(|ev| tracker.should_notify(ev, &filter, now))
            .map(|ev| ev.display_text.clone())
            .collect()
    }

    /// One send per subscriber; a failure only costs that subscriber.
    /// Returns `(delivered, failed)`.
    pub async fn deliver(&self, body: &str) -> (usize, usize) {
        let recipients = self.registry.snapshot();
        let (mut delivered, mut failed) = (0, 0);
        for chat_id in recipients {
            match self.transport.send(chat_id, body).await {
                Ok(()) => {
                    delivered += 1;
                    counter!("warbot_deliveries_total").increment(1);
                }
                Err(e) => {
                    failed += 1;
                    counter!("warbot_delivery_errors_total").increment(1);
                    tracing::warn!(chat_id, error = %e, "delivery failed");
                }
            }
        }
        (delivered, failed)
    }

    async fn save_checkpoint(&self, tracker: &DedupTracker) {
        let Some(store) = &self.checkpoint else {
            return;
        };
        let state = PersistedState::capture(&self.registry, tracker);
        if let Err(e) = store.save(&state).await {
            tracing::warn!("state checkpoint failed: {e:#}");
        }
    }

    // --- on-demand queries (never touch dedup state) ---

    pub async fn list_alerts(&self, show_all: bool) -> Result<String, FeedError> {
        let alerts = self
            .source
            .fetch_alerts()
            .await
            .inspect_err(|e| record_feed_error("alerts", e))?;
        Ok(listing::render_alerts(
            &alerts,
            &self.filter.current(),
            show_all,
            Utc::now(),
        ))
    }

    pub async fn list_invasions(&self, show_all: bool) -> Result<String, FeedError> {
        let invasions = self
            .source
            .fetch_invasions()
            .await
            .inspect_err(|e| record_feed_error("invasions", e))?;
        Ok(listing::render_invasions(
            &invasions,
            &self.filter.current(),
            show_all,
        ))
    }

    pub async fn list_deals(&self) -> Result<String, FeedError> {
        let deals = self
            .source
            .fetch_deals()
            .await
            .inspect_err(|e| record_feed_error("deals", e))?;
        Ok(listing::render_deals(&deals, Utc::now()))
    }

    pub async fn list_news(&self) -> Result<String, FeedError> {
        let news = self
            .source
            .fetch_news()
            .await
            .inspect_err(|e| record_feed_error("news", e))?;
        Ok(listing::render_news(&news, Utc::now()))
    }
}

async fn wait_active(rx: &mut watch::Receiver<bool>) -> bool {
    rx.wait_for(|on| *on).await.is_ok()
}

fn record_feed_error(feed: &'static str, e: &FeedError) {
    counter!("warbot_feed_errors_total", "feed" => feed, "kind" => e.kind()).increment(1);
    tracing::warn!(feed, kind = e.kind(), "feed fetch failed: {e}");
}
