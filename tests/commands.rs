// tests/commands.rs
//
// Chat commands end to end through the dispatcher and the command loop.
//
// Covered:
// - filtered vs `all` listings
// - /notify on/off replies and the Idle/Polling switch
// - fresh start without a state file, then a first subscriber
// - fetch failures answered with a generic reply
// - command loop: ordering, cursor, malformed updates, retries, final ack

mod common;

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{alert, message, MockSource, RecordingTransport, ScriptedUpdates};
use warbot::commands::USAGE;
use warbot::error::{DecodeError, FeedError, TransportError};
use warbot::notify::{InboundMessage, Update};
use warbot::{
    CommandDispatcher, CommandLoop, EngineState, JsonFileStore, NotificationEngine, RewardFilter,
    StateStore, SubscriberRegistry,
};

fn dispatcher(source: Arc<MockSource>, registry: SubscriberRegistry) -> CommandDispatcher {
    let engine = NotificationEngine::new(
        source,
        RecordingTransport::new(),
        RewardFilter::from_entries(["Forma Blueprint"]),
        Arc::new(registry),
    );
    CommandDispatcher::new(engine)
}

fn msg(chat_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        update_id: 1,
        chat_id,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn alerts_listing_is_filtered_unless_all() {
    let source = MockSource::new();
    source.set_alerts(Ok(vec![
        alert("A1", "Forma Blueprint", ChronoDuration::hours(1)),
        alert("A2", "Credits", ChronoDuration::hours(1)),
    ]));
    let d = dispatcher(source, SubscriberRegistry::new());

    let filtered = d.dispatch(&msg(5, "/alerts")).await.unwrap();
    assert_eq!(filtered, "A1: Forma Blueprint");

    let all = d.dispatch(&msg(5, "/alerts all")).await.unwrap();
    assert_eq!(all, "A1: Forma Blueprint\n\nA2: Credits");
}

#[tokio::test]
async fn empty_listings_use_placeholders() {
    let d = dispatcher(MockSource::new(), SubscriberRegistry::new());
    assert_eq!(d.dispatch(&msg(5, "/alerts")).await.unwrap(), "No filtered alerts");
    assert_eq!(d.dispatch(&msg(5, "/invasions all")).await.unwrap(), "No invasions");
    assert_eq!(d.dispatch(&msg(5, "/darvo")).await.unwrap(), "No deals");
    assert_eq!(d.dispatch(&msg(5, "/news")).await.unwrap(), "No news");
}

#[tokio::test]
async fn fetch_failure_gets_generic_reply() {
    let source = MockSource::new();
    source.set_alerts(Err(FeedError::BadStatus(502)));
    source.set_news(Err(FeedError::Unreachable("timeout".into())));
    let d = dispatcher(source, SubscriberRegistry::new());

    assert_eq!(
        d.dispatch(&msg(5, "/alerts all")).await.unwrap(),
        "Couldn't fetch alerts, try again later"
    );
    assert_eq!(
        d.dispatch(&msg(5, "/news")).await.unwrap(),
        "Couldn't fetch news, try again later"
    );
}

#[tokio::test]
async fn notify_toggles_are_idempotent() {
    let d = dispatcher(MockSource::new(), SubscriberRegistry::new());

    assert_eq!(d.dispatch(&msg(9, "/notify off")).await.unwrap(), "Notifications already disabled");
    assert_eq!(d.dispatch(&msg(9, "/notify on")).await.unwrap(), "Notifications enabled");
    assert_eq!(d.dispatch(&msg(9, "/notify on")).await.unwrap(), "Notifications already enabled");
    assert_eq!(d.dispatch(&msg(9, "/notify off")).await.unwrap(), "Notifications disabled");
    assert_eq!(d.dispatch(&msg(9, "/notify")).await.unwrap(), "Usage: /notify on|off");
}

#[tokio::test]
async fn fresh_start_then_first_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("chats.json"));
    let (registry, tracker) = store.load().await.into_parts();
    assert!(registry.is_empty());
    assert!(tracker.is_empty());

    let engine = NotificationEngine::new(
        MockSource::new(),
        RecordingTransport::new(),
        RewardFilter::from_entries(["Forma Blueprint"]),
        Arc::new(registry),
    );
    assert_eq!(engine.state(), EngineState::Idle);

    let d = CommandDispatcher::new(engine.clone());
    let reply = d.dispatch(&msg(7, "/notify on")).await.unwrap();
    assert_eq!(reply, "Notifications enabled");
    assert_eq!(engine.state(), EngineState::Polling);
    assert!(engine.registry().contains(7));
}

#[tokio::test]
async fn help_and_non_commands() {
    let d = dispatcher(MockSource::new(), SubscriberRegistry::new());
    assert_eq!(d.dispatch(&msg(1, "/help")).await.unwrap(), USAGE);
    assert_eq!(d.dispatch(&msg(1, "/start")).await.unwrap(), USAGE);
    assert!(d.dispatch(&msg(1, "good morning")).await.is_none());
    assert!(d.dispatch(&msg(1, "/frobnicate")).await.is_none());
}

// ---------- command loop ----------

fn command_loop(
    updates: Arc<ScriptedUpdates>,
    replies: Arc<RecordingTransport>,
) -> (CommandLoop, Arc<SubscriberRegistry>) {
    let engine = NotificationEngine::new(
        MockSource::new(),
        RecordingTransport::new(),
        RewardFilter::from_entries(["Forma Blueprint"]),
        Arc::new(SubscriberRegistry::new()),
    );
    let registry = engine.registry().clone();
    let lp = CommandLoop::new(updates, replies, CommandDispatcher::new(engine))
        .with_retry_delay(Duration::from_millis(50));
    (lp, registry)
}

#[tokio::test]
async fn loop_handles_updates_in_order_and_acks_on_exit() {
    let updates = ScriptedUpdates::new(vec![Ok(vec![
        message(10, 5, "/help"),
        Update {
            update_id: 11,
            payload: Err(DecodeError::MissingText),
        },
        message(12, 5, "/notify on"),
    ])]);
    let replies = RecordingTransport::new();
    let (lp, registry) = command_loop(updates.clone(), replies.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { lp.run(cancel).await }
    });

    updates.drained.notified().await;
    cancel.cancel();
    let cursor = task.await.unwrap();

    assert_eq!(cursor.offset(), 13);
    assert_eq!(updates.polled_offsets(), vec![0, 13]);
    assert_eq!(updates.acks(), vec![13]);
    assert_eq!(
        replies.sent(),
        vec![
            (5, USAGE.to_string()),
            (5, "Notifications enabled".to_string())
        ]
    );
    assert!(registry.contains(5));
}

#[tokio::test]
async fn loop_never_reprocesses_an_update() {
    let updates = ScriptedUpdates::new(vec![
        Ok(vec![message(3, 8, "/notify on")]),
        // redelivered by the server
        Ok(vec![message(3, 8, "/notify on"), message(4, 8, "/notify off")]),
    ]);
    let replies = RecordingTransport::new();
    let (lp, _registry) = command_loop(updates.clone(), replies.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { lp.run(cancel).await }
    });

    updates.drained.notified().await;
    cancel.cancel();
    let cursor = task.await.unwrap();

    assert_eq!(cursor.offset(), 5);
    assert_eq!(updates.polled_offsets(), vec![0, 4, 5]);
    let texts: Vec<String> = replies.sent().into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["Notifications enabled", "Notifications disabled"]);
}

#[tokio::test]
async fn loop_handles_every_update_of_an_unordered_batch() {
    let updates = ScriptedUpdates::new(vec![Ok(vec![
        message(10, 5, "/notify on"),
        message(12, 6, "/notify on"),
        message(11, 7, "/notify on"),
    ])]);
    let replies = RecordingTransport::new();
    let (lp, registry) = command_loop(updates.clone(), replies.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { lp.run(cancel).await }
    });

    updates.drained.notified().await;
    cancel.cancel();
    let cursor = task.await.unwrap();

    assert_eq!(cursor.offset(), 13);
    assert_eq!(updates.polled_offsets(), vec![0, 13]);
    let chats: Vec<i64> = replies.sent().into_iter().map(|(c, _)| c).collect();
    assert_eq!(chats, vec![5, 6, 7]);
    assert!(registry.contains(5) && registry.contains(6) && registry.contains(7));
}

#[tokio::test]
async fn loop_retries_after_poll_failure() {
    let updates = ScriptedUpdates::new(vec![
        Err(TransportError::Status(502)),
        Ok(vec![message(1, 2, "/help")]),
    ]);
    let replies = RecordingTransport::new();
    let (lp, _registry) = command_loop(updates.clone(), replies.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { lp.run(cancel).await }
    });

    updates.drained.notified().await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(updates.polled_offsets(), vec![0, 0, 2]);
    assert_eq!(replies.sent().len(), 1);
}

#[tokio::test]
async fn reply_failure_does_not_stop_the_loop() {
    let updates = ScriptedUpdates::new(vec![Ok(vec![
        message(1, 66, "/help"),
        message(2, 5, "/help"),
    ])]);
    let replies = RecordingTransport::new();
    replies.fail_for(66);
    let (lp, _registry) = command_loop(updates.clone(), replies.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { lp.run(cancel).await }
    });

    updates.drained.notified().await;
    cancel.cancel();
    let cursor = task.await.unwrap();

    assert_eq!(cursor.offset(), 3);
    assert_eq!(replies.sent(), vec![(5, USAGE.to_string())]);
}
