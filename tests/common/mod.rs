// tests/common/mod.rs
//
// In-memory stand-ins for the feed, the chat transport and the update
// source, shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use warbot::error::{FeedError, TransportError};
use warbot::notify::{InboundMessage, Update};
use warbot::{ChatId, Event, EventKind, EventSource, NewsItem, Transport, UpdateSource};

pub fn alert(id: &str, reward: &str, expires_in: Duration) -> Event {
    Event::new(
        EventKind::Alert,
        id,
        Some(Utc::now() + expires_in),
        vec![reward.to_string()],
        format!("{id}: {reward}"),
    )
}

pub fn invasion(id: &str, reward: &str) -> Event {
    Event::new(
        EventKind::Invasion,
        id,
        None,
        vec![reward.to_string()],
        format!("{id}: {reward}"),
    )
}

/// Scriptable feed. Every fetch returns the currently configured result.
pub struct MockSource {
    alerts: Mutex<Result<Vec<Event>, FeedError>>,
    invasions: Mutex<Result<Vec<Event>, FeedError>>,
    deals: Mutex<Result<Vec<Event>, FeedError>>,
    news: Mutex<Result<Vec<NewsItem>, FeedError>>,
    alert_fetches: AtomicUsize,
    invasion_fetches: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alerts: Mutex::new(Ok(Vec::new())),
            invasions: Mutex::new(Ok(Vec::new())),
            deals: Mutex::new(Ok(Vec::new())),
            news: Mutex::new(Ok(Vec::new())),
            alert_fetches: AtomicUsize::new(0),
            invasion_fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_alerts(&self, r: Result<Vec<Event>, FeedError>) {
        *self.alerts.lock().unwrap() = r;
    }

    pub fn set_invasions(&self, r: Result<Vec<Event>, FeedError>) {
        *self.invasions.lock().unwrap() = r;
    }

    pub fn set_deals(&self, r: Result<Vec<Event>, FeedError>) {
        *self.deals.lock().unwrap() = r;
    }

    pub fn set_news(&self, r: Result<Vec<NewsItem>, FeedError>) {
        *self.news.lock().unwrap() = r;
    }

    pub fn alert_fetches(&self) -> usize {
        self.alert_fetches.load(Ordering::SeqCst)
    }

    pub fn invasion_fetches(&self) -> usize {
        self.invasion_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn fetch_alerts(&self) -> Result<Vec<Event>, FeedError> {
        self.alert_fetches.fetch_add(1, Ordering::SeqCst);
        self.alerts.lock().unwrap().clone()
    }

    async fn fetch_invasions(&self) -> Result<Vec<Event>, FeedError> {
        self.invasion_fetches.fetch_add(1, Ordering::SeqCst);
        self.invasions.lock().unwrap().clone()
    }

    async fn fetch_deals(&self) -> Result<Vec<Event>, FeedError> {
        self.deals.lock().unwrap().clone()
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, FeedError> {
        self.news.lock().unwrap().clone()
    }
}

/// Records every send; chats in `failing` get a transport error instead.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, String)>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(TransportError::Status(403));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Hands out scripted poll results in order, then blocks forever.
/// `drained` is notified the first time the script runs out.
pub struct ScriptedUpdates {
    script: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    offsets: Mutex<Vec<i64>>,
    acks: Mutex<Vec<i64>>,
    pub drained: Notify,
}

impl ScriptedUpdates {
    pub fn new(script: Vec<Result<Vec<Update>, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
            drained: Notify::new(),
        })
    }

    pub fn polled_offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn acks(&self) -> Vec<i64> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSource for ScriptedUpdates {
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(r) => r,
            None => {
                self.drained.notify_one();
                std::future::pending().await
            }
        }
    }

    async fn acknowledge(&self, offset: i64) -> Result<(), TransportError> {
        self.acks.lock().unwrap().push(offset);
        Ok(())
    }
}

pub fn message(update_id: i64, chat_id: ChatId, text: &str) -> Update {
    Update {
        update_id,
        payload: Ok(InboundMessage {
            update_id,
            chat_id,
            text: text.to_string(),
        }),
    }
}
