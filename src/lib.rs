// src/lib.rs
// Library surface shared by the binaries and integration tests.

pub mod admin;
pub mod commands;
pub mod config;
pub mod console;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod filter;
pub mod listing;
pub mod metrics;
pub mod notify;
pub mod registry;
pub mod state;

// ---- Re-exports for the common wiring ----
pub use crate::commands::{poller::CommandLoop, CommandDispatcher};
pub use crate::config::AppConfig;
pub use crate::dedup::DedupTracker;
pub use crate::engine::{EngineState, NotificationEngine};
pub use crate::events::{Event, EventKind, NewsItem};
pub use crate::feed::{EventSource, FeedUrls, HttpEventSource};
pub use crate::filter::RewardFilter;
pub use crate::notify::{telegram::TelegramClient, Transport, UpdateSource};
pub use crate::registry::{ChatId, SubscriberRegistry};
pub use crate::state::{JsonFileStore, PersistedState, StateStore};
