//! warbot: Warframe alert/invasion notifier for Telegram.
//! Wires config, state, the notification loop, the command loop and the
//! operator controls, then saves state once on the way out.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warbot::admin::{self, AdminState};
use warbot::console;
use warbot::metrics::Metrics;
use warbot::{
    AppConfig, CommandDispatcher, CommandLoop, HttpEventSource, JsonFileStore, NotificationEngine,
    PersistedState, RewardFilter, StateStore, TelegramClient,
};

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warbot=info,warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn main() -> Result<()> {
    // Load .env if present; real environment wins.
    let _ = dotenvy::dotenv();

    let cfg = AppConfig::load().context("load configuration")?;
    init_tracing(cfg.log_json);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let res = rt.block_on(run(cfg));
    // a pending stdin read would otherwise hold the runtime open
    rt.shutdown_timeout(Duration::from_secs(1));
    res
}

async fn run(cfg: AppConfig) -> Result<()> {
    tracing::info!(config = ?cfg, "starting warbot");

    let filter = RewardFilter::open(&cfg.rewards_path).context("load reward list")?;
    tracing::info!(
        path = %cfg.rewards_path.display(),
        rewards = filter.current().len(),
        "reward filter loaded"
    );

    let store = Arc::new(JsonFileStore::new(&cfg.state_path));
    let (registry, tracker) = store.load().await.into_parts();
    let registry = Arc::new(registry);

    let telegram = Arc::new(
        TelegramClient::new(&cfg.telegram_api_url, &cfg.telegram_token)
            .with_timeout(cfg.http_timeout_secs)
            .with_poll_timeout(cfg.poll_timeout_secs),
    );
    let source = Arc::new(HttpEventSource::new(cfg.feeds.clone()).with_timeout(cfg.http_timeout_secs));

    let mut engine = NotificationEngine::new(source, telegram.clone(), filter.clone(), registry.clone())
        .with_interval(Duration::from_secs(cfg.notify_interval_secs));
    if cfg.checkpoint {
        engine = engine.with_checkpoint(store.clone());
    }
    let commands = CommandLoop::new(
        telegram.clone(),
        telegram,
        CommandDispatcher::new(engine.clone()),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(console::wait_for_signal(cancel.clone()));
    if cfg.console {
        tokio::spawn(console::run_console(
            BufReader::new(tokio::io::stdin()),
            filter.clone(),
            cancel.clone(),
        ));
    }

    let admin_task = match &cfg.admin_bind {
        Some(addr) => {
            let metrics = Metrics::init()?;
            // the restored count was recorded before the recorder existed
            registry.publish_gauge();
            let state = AdminState {
                filter: filter.clone(),
                registry: registry.clone(),
                cancel: cancel.clone(),
            };
            let app = admin::router_with_metrics(state, Some(&metrics));
            let listener = admin::bind(addr).await?;
            Some(tokio::spawn(admin::serve(listener, app, cancel.clone())))
        }
        None => None,
    };

    tracing::info!(
        subscribers = registry.len(),
        state = ?engine.state(),
        "warbot running"
    );

    let (tracker, cursor) = tokio::join!(
        engine.run(tracker, cancel.clone()),
        commands.run(cancel.clone())
    );
    tracing::info!(offset = cursor.offset(), "loops stopped, saving state");

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::warn!("admin server: {e:#}"),
            Err(e) => tracing::warn!("admin server task: {e}"),
            Ok(Ok(())) => {}
        }
    }

    let state = PersistedState::capture(&registry, &tracker);
    store
        .save(&state)
        .await
        .with_context(|| format!("save state to {}", cfg.state_path.display()))?;
    tracing::info!(subscribers = state.subscribers.len(), "state saved, bye");
    Ok(())
}
