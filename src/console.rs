// src/console.rs
//! Operator console on stdin plus OS signal handling.
//!
//! Both only ever cancel the shared token; the loops observe it and `main`
//! does the final save.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::filter::RewardFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Quit,
    Reload,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "q" | "quit" => Some(Self::Quit),
            "r" | "reload" => Some(Self::Reload),
            _ => None,
        }
    }
}

/// Read commands line by line until `q`, end of input, or cancellation.
/// End of input requests shutdown like `q` does.
pub async fn run_console<R>(input: R, filter: RewardFilter, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            l = lines.next_line() => l,
        };

        match line {
            Ok(Some(l)) => match ConsoleCommand::parse(&l) {
                Some(ConsoleCommand::Quit) => {
                    info!("quit requested from console");
                    cancel.cancel();
                    return;
                }
                Some(ConsoleCommand::Reload) => reload(&filter),
                None if l.trim().is_empty() => {}
                None => info!("console commands: q = quit, r = reload rewards"),
            },
            Ok(None) => {
                info!("console input closed, shutting down");
                cancel.cancel();
                return;
            }
            Err(e) => {
                warn!("console read failed, shutting down: {e}");
                cancel.cancel();
                return;
            }
        }
    }
}

/// Reload the reward list; on failure the previous list stays active.
pub fn reload(filter: &RewardFilter) {
    if let Err(e) = filter.reload() {
        warn!("reward reload failed, keeping previous list: {e}");
    }
}

/// Cancel `cancel` on SIGINT (Ctrl+C) or SIGTERM.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sigint.recv() => info!("received SIGINT"),
                    _ = sigterm.recv() => info!("received SIGTERM"),
                }
                cancel.cancel();
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("signal handlers unavailable, falling back to ctrl_c: {e}");
            }
        }
    }

    tokio::select! {
        _ = cancel.cancelled() => {}
        r = tokio::signal::ctrl_c() => {
            match r {
                Ok(()) => info!("received Ctrl+C"),
                Err(e) => {
                    // without any signal source only the console or admin can stop us
                    warn!("ctrl_c handler unavailable: {e}");
                    return;
                }
            }
            cancel.cancel();
        }
    }
}
