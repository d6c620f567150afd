// src/registry.rs
//! Chats that opted in to push notifications, plus the polling signal.
//!
//! The signal is a `watch` channel whose value is `true` exactly while the
//! set is non-empty. It is updated while the set's mutex is held, so a reader
//! of the signal never sees it disagree with the set.

use metrics::gauge;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscription {
    Removed,
    NotPresent,
}

#[derive(Debug)]
pub struct SubscriberRegistry {
    chats: Mutex<BTreeSet<ChatId>>,
    active: watch::Sender<bool>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::with_subscribers(std::iter::empty())
    }

    /// Restore from persisted state; the signal starts raised iff any chat
    /// is present.
    pub fn with_subscribers<I: IntoIterator<Item = ChatId>>(ids: I) -> Self {
        let chats: BTreeSet<ChatId> = ids.into_iter().collect();
        let (active, _) = watch::channel(!chats.is_empty());
        gauge!("warbot_subscribers").set(chats.len() as f64);
        Self {
            chats: Mutex::new(chats),
            active,
        }
    }

    pub fn subscribe(&self, id: ChatId) -> Subscription {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        if !chats.insert(id) {
            return Subscription::AlreadyPresent;
        }
        if chats.len() == 1 {
            self.active.send_replace(true);
            tracing::info!(chat_id = id, "first subscriber, polling started");
        }
        gauge!("warbot_subscribers").set(chats.len() as f64);
        Subscription::Added
    }

    pub fn unsubscribe(&self, id: ChatId) -> Unsubscription {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        if !chats.remove(&id) {
            return Unsubscription::NotPresent;
        }
        if chats.is_empty() {
            self.active.send_replace(false);
            tracing::info!(chat_id = id, "last subscriber left, polling parked");
        }
        gauge!("warbot_subscribers").set(chats.len() as f64);
        Unsubscription::Removed
    }

    /// Copy of the set taken under the registry lock.
    pub fn snapshot(&self) -> BTreeSet<ChatId> {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    pub fn len(&self) -> usize {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-set the subscriber gauge, e.g. once a recorder is installed after
    /// the registry was restored.
    pub fn publish_gauge(&self) {
        gauge!("warbot_subscribers").set(self.len() as f64);
    }

    /// Receiver for the polling signal (`true` while anyone is subscribed).
    pub fn active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }
}
