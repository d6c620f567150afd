// src/metrics.rs
//! Prometheus recorder and the series this crate reports.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("warbot_poll_cycles_total", "Notification cycles run.");
        describe_counter!(
            "warbot_feed_errors_total",
            "Feed fetch/decode failures by feed and kind."
        );
        describe_counter!(
            "warbot_notifications_total",
            "Events that qualified for a push."
        );
        describe_counter!("warbot_deliveries_total", "Messages delivered to a chat.");
        describe_counter!(
            "warbot_delivery_errors_total",
            "Messages that failed to reach a chat."
        );
        describe_counter!("warbot_commands_total", "Chat commands handled by command.");
        describe_gauge!("warbot_subscribers", "Chats with notifications enabled.");
        describe_histogram!("warbot_feed_fetch_ms", "Feed fetch time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only one per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format, for merging into the admin
    /// router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
