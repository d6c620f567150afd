// src/notify/mod.rs
pub mod telegram;

use async_trait::async_trait;

use crate::error::{DecodeError, TransportError};
use crate::registry::ChatId;

/// Outbound delivery of one text message to one chat.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError>;
}

/// Inbound long-poll source of chat messages.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch updates with `update_id >= offset`, blocking up to the source's
    /// long-poll timeout.
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError>;

    /// Confirm everything below `offset` so it isn't redelivered after a
    /// restart.
    async fn acknowledge(&self, _offset: i64) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: ChatId,
    pub text: String,
}

/// One update as delivered. The id is always known so the cursor can move
/// past updates we can't use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub payload: Result<InboundMessage, DecodeError>,
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// blank-line boundaries and cutting hard only inside an oversized block.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for block in text.split("\n\n") {
        let joined_len = if current.is_empty() {
            block.chars().count()
        } else {
            current.chars().count() + 2 + block.chars().count()
        };
        if joined_len <= max_chars {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(block);
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if block.chars().count() <= max_chars {
            current.push_str(block);
        } else {
            chunks.extend(hard_split(block, max_chars));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(block: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = block.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
