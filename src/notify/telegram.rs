use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{split_message, InboundMessage, Transport, Update, UpdateSource};
use crate::error::{DecodeError, TransportError};
use crate::registry::ChatId;

/// Telegram caps a message body at 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Bot API client used both as the outbound transport and as the
/// `getUpdates` long-poll source.
#[derive(Clone)]
pub struct TelegramClient {
    base: String,
    client: Client,
    timeout: Duration,
    poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            poll_timeout_secs: 5,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let rsp = self
            .client
            .post(format!("{}/{}", self.base, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            // the URL carries the bot token
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let status = rsp.status();
        let text = rsp
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(_) if !status.is_success() => return Err(TransportError::Status(status.as_u16())),
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        };
        if !parsed.ok {
            return Err(TransportError::Rejected(
                parsed
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        parsed
            .result
            .ok_or_else(|| TransportError::Decode(format!("{method}: ok without result")))
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let total = chunks.len();
        for (sent, chunk) in chunks.into_iter().enumerate() {
            let body = json!({ "chat_id": chat_id, "text": chunk });
            if let Err(e) = self.call::<Value>("sendMessage", &body, self.timeout).await {
                if sent > 0 {
                    tracing::warn!(chat_id, sent, total, "message only partly delivered");
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let body = json!({ "offset": offset, "timeout": self.poll_timeout_secs });
        // leave room for the server-side long poll
        let timeout = self.timeout + Duration::from_secs(self.poll_timeout_secs);
        let raw: Vec<Value> = self.call("getUpdates", &body, timeout).await?;
        Ok(raw.into_iter().filter_map(decode_update).collect())
    }

    async fn acknowledge(&self, offset: i64) -> Result<(), TransportError> {
        let body = json!({ "offset": offset, "timeout": 0, "limit": 1 });
        let _: Vec<Value> = self.call("getUpdates", &body, self.timeout).await?;
        Ok(())
    }
}

/// Decode one raw update. Returns `None` only when even the update id is
/// unusable; everything else yields an [`Update`] so the cursor can advance.
pub fn decode_update(raw: Value) -> Option<Update> {
    let Some(update_id) = raw.get("update_id").and_then(Value::as_i64) else {
        tracing::warn!("update without usable update_id dropped");
        return None;
    };

    let payload = match raw.get("message") {
        None => Err(DecodeError::MissingMessage),
        Some(msg) => match msg.pointer("/chat/id").and_then(Value::as_i64) {
            None => Err(DecodeError::Malformed("message.chat.id".into())),
            Some(chat_id) => match msg.get("text").and_then(Value::as_str) {
                None => Err(DecodeError::MissingText),
                Some(text) => Ok(InboundMessage {
                    update_id,
                    chat_id,
                    text: text.to_string(),
                }),
            },
        },
    };

    Some(Update { update_id, payload })
}
