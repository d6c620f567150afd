// src/admin.rs
//! Optional operator HTTP surface (enabled by `WARBOT_ADMIN_BIND`).

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::filter::RewardFilter;
use crate::metrics::Metrics;
use crate::registry::SubscriberRegistry;

#[derive(Clone)]
pub struct AdminState {
    pub filter: RewardFilter,
    pub registry: Arc<SubscriberRegistry>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Serialize)]
pub struct StatusResp {
    pub subscribers: usize,
    pub polling: bool,
    pub rewards: usize,
}

#[derive(Debug, Serialize)]
struct ReloadResp {
    reloaded: bool,
    rewards: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .route("/admin/reload-rewards", post(reload_rewards))
        .route("/admin/shutdown", post(shutdown))
        .with_state(state)
}

/// Admin routes plus `/metrics` when a recorder is installed.
pub fn router_with_metrics(state: AdminState, metrics: Option<&Metrics>) -> Router {
    match metrics {
        Some(m) => router(state).merge(m.router()),
        None => router(state),
    }
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("admin: bind {addr}"))?;
    tracing::info!(addr = %addr, "admin server listening");
    Ok(listener)
}

/// Serve until `cancel` fires, then drain open requests.
pub async fn serve(listener: TcpListener, app: Router, cancel: CancellationToken) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("admin: serve")
}

async fn status(State(state): State<AdminState>) -> Json<StatusResp> {
    Json(StatusResp {
        subscribers: state.registry.len(),
        polling: state.registry.is_active(),
        rewards: state.filter.current().len(),
    })
}

async fn reload_rewards(State(state): State<AdminState>) -> (StatusCode, Json<ReloadResp>) {
    match state.filter.reload() {
        Ok(set) => (
            StatusCode::OK,
            Json(ReloadResp {
                reloaded: true,
                rewards: set.len(),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("reward reload via admin failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReloadResp {
                    reloaded: false,
                    rewards: state.filter.current().len(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn shutdown(State(state): State<AdminState>) -> (StatusCode, &'static str) {
    tracing::info!("shutdown requested via admin");
    state.cancel.cancel();
    (StatusCode::ACCEPTED, "shutting down")
}
