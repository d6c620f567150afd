// src/commands/poller.rs
//! Inbound long-poll loop. Handles one message at a time, in order.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::CommandDispatcher;
use crate::notify::{InboundMessage, Transport, UpdateSource};

/// `offset = highest update_id seen + 1`. Updates below the offset a poll was
/// sent with were already handled and are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetCursor {
    next: i64,
}

impl OffsetCursor {
    pub fn starting_at(next: i64) -> Self {
        Self { next }
    }

    pub fn offset(&self) -> i64 {
        self.next
    }

    /// True when `update_id` is below the offset, i.e. already handled.
    pub fn is_behind(&self, update_id: i64) -> bool {
        update_id < self.next
    }

    /// Raise the offset past `update_id`. Never moves it back.
    pub fn advance(&mut self, update_id: i64) {
        self.next = self.next.max(update_id + 1);
    }
}

pub struct CommandLoop {
    updates: Arc<dyn UpdateSource>,
    transport: Arc<dyn Transport>,
    dispatcher: CommandDispatcher,
    retry_delay: Duration,
}

impl CommandLoop {
    pub fn new(
        updates: Arc<dyn UpdateSource>,
        transport: Arc<dyn Transport>,
        dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            updates,
            transport,
            dispatcher,
            retry_delay: Duration::from_secs(3),
        }
    }

    /// Pause after a failed poll before trying again.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Poll until `cancel` fires. A poll in flight is abandoned; a message
    /// being handled is finished. The last offset is acknowledged on the way
    /// out so handled updates aren't redelivered after a restart.
    pub async fn run(&self, cancel: CancellationToken) -> OffsetCursor {
        let mut cursor = OffsetCursor::default();
        let mut unacked = false;

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.updates.poll(cursor.offset()) => r,
            };

            let updates = match polled {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!("getUpdates failed: {e}");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => continue,
                    }
                }
            };

            // a successful poll confirmed everything below the offset it sent
            let polled_from = cursor;
            unacked = false;
            for update in updates {
                if polled_from.is_behind(update.update_id) {
                    tracing::debug!(update_id = update.update_id, "update already handled");
                    continue;
                }
                cursor.advance(update.update_id);
                unacked = true;
                match update.payload {
                    Ok(msg) => self.handle(&msg).await,
                    Err(e) => {
                        tracing::debug!(update_id = update.update_id, "update ignored: {e}")
                    }
                }
            }
        }

        if unacked {
            if let Err(e) = self.updates.acknowledge(cursor.offset()).await {
                tracing::warn!(offset = cursor.offset(), "final acknowledge failed: {e}");
            }
        }
        tracing::info!(offset = cursor.offset(), "command loop stopped");
        cursor
    }

    pub async fn handle(&self, msg: &InboundMessage) {
        let Some(reply) = self.dispatcher.dispatch(msg).await else {
            return;
        };
        if let Err(e) = self.transport.send(msg.chat_id, &reply).await {
            tracing::warn!(chat_id = msg.chat_id, error = %e, "reply failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_max_plus_one() {
        let mut c = OffsetCursor::default();
        c.advance(10);
        c.advance(12);
        c.advance(11);
        assert_eq!(c.offset(), 13);
    }

    #[test]
    fn cursor_reports_handled_updates() {
        let mut c = OffsetCursor::starting_at(20);
        assert!(c.is_behind(19));
        assert!(!c.is_behind(20));
        c.advance(25);
        assert!(c.is_behind(25));
        c.advance(19);
        assert_eq!(c.offset(), 26);
    }
}
