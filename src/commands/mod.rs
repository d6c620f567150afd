// src/commands/mod.rs
//! Chat command surface: parsing and dispatch.
//!
//! Listing commands are reward-filtered by default; an `all` argument shows
//! everything. They go through the engine's on-demand queries and never touch
//! dedup state. `/notify` mutates the subscriber registry.

pub mod poller;

use metrics::counter;

use crate::engine::NotificationEngine;
use crate::error::FeedError;
use crate::notify::InboundMessage;
use crate::registry::{ChatId, Subscription, Unsubscription};

pub const USAGE: &str = "Warframe alert and invasion bot\n\n\
Usage:\n\
/help - Show this\n\
/alerts - Show current filtered alerts\n\
/alerts all - Show all current alerts\n\
/invasions - Show current filtered invasions\n\
/invasions all - Show all current invasions\n\
/darvo - Show Darvo's daily deal\n\
/news - Show recent news\n\
/notify [on|off] - Turn notifications on/off";

pub const NOTIFY_USAGE: &str = "Usage: /notify on|off";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Alerts { all: bool },
    Invasions { all: bool },
    Deals,
    News,
    /// `None` when the argument is missing or not `on`/`off`.
    Notify(Option<Toggle>),
}

impl Command {
    /// Parse `/name[@bot] [arg]`. Returns `None` for anything that isn't one
    /// of our commands.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let arg = words.next().map(str::to_ascii_lowercase);
        let all = arg.as_deref() == Some("all");

        match name.as_str() {
            "help" | "start" => Some(Command::Help),
            "alerts" => Some(Command::Alerts { all }),
            "invasions" => Some(Command::Invasions { all }),
            "darvo" => Some(Command::Deals),
            "news" => Some(Command::News),
            "notify" => Some(Command::Notify(match arg.as_deref() {
                Some("on") => Some(Toggle::On),
                Some("off") => Some(Toggle::Off),
                _ => None,
            })),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Alerts { .. } => "alerts",
            Command::Invasions { .. } => "invasions",
            Command::Deals => "darvo",
            Command::News => "news",
            Command::Notify(_) => "notify",
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    engine: NotificationEngine,
}

impl CommandDispatcher {
    pub fn new(engine: NotificationEngine) -> Self {
        Self { engine }
    }

    /// Reply text for `msg`, or `None` when it isn't a command we answer.
    pub async fn dispatch(&self, msg: &InboundMessage) -> Option<String> {
        let cmd = Command::parse(&msg.text)?;
        counter!("warbot_commands_total", "command" => cmd.label()).increment(1);
        tracing::debug!(chat_id = msg.chat_id, command = cmd.label(), "dispatching");
        Some(self.execute(msg.chat_id, cmd).await)
    }

    pub async fn execute(&self, chat_id: ChatId, cmd: Command) -> String {
        match cmd {
            Command::Help => USAGE.to_string(),
            Command::Alerts { all } => {
                or_fetch_failure(self.engine.list_alerts(all).await, "alerts")
            }
            Command::Invasions { all } => {
                or_fetch_failure(self.engine.list_invasions(all).await, "invasions")
            }
            Command::Deals => or_fetch_failure(self.engine.list_deals().await, "deals"),
            Command::News => or_fetch_failure(self.engine.list_news().await, "news"),
            Command::Notify(Some(Toggle::On)) => match self.engine.registry().subscribe(chat_id) {
                Subscription::Added => "Notifications enabled".to_string(),
                Subscription::AlreadyPresent => "Notifications already enabled".to_string(),
            },
            Command::Notify(Some(Toggle::Off)) => {
                match self.engine.registry().unsubscribe(chat_id) {
                    Unsubscription::Removed => "Notifications disabled".to_string(),
                    Unsubscription::NotPresent => "Notifications already disabled".to_string(),
                }
            }
            Command::Notify(None) => NOTIFY_USAGE.to_string(),
        }
    }
}

fn or_fetch_failure(res: Result<String, FeedError>, what: &str) -> String {
    res.unwrap_or_else(|_| format!("Couldn't fetch {what}, try again later"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_commands() {
        assert_eq!(Command::parse("/alerts"), Some(Command::Alerts { all: false }));
        assert_eq!(Command::parse("/alerts all"), Some(Command::Alerts { all: true }));
        assert_eq!(
            Command::parse("/invasions@WarBot ALL"),
            Some(Command::Invasions { all: true })
        );
        assert_eq!(Command::parse("/darvo"), Some(Command::Deals));
        assert_eq!(Command::parse("  /news  "), Some(Command::News));
    }

    #[test]
    fn parses_notify_arguments() {
        assert_eq!(Command::parse("/notify on"), Some(Command::Notify(Some(Toggle::On))));
        assert_eq!(Command::parse("/notify off"), Some(Command::Notify(Some(Toggle::Off))));
        assert_eq!(Command::parse("/notify"), Some(Command::Notify(None)));
        assert_eq!(Command::parse("/notify maybe"), Some(Command::Notify(None)));
    }

    #[test]
    fn ignores_non_commands() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("alerts"), None);
    }

    #[test]
    fn start_is_help() {
        assert_eq!(Command::parse("/start"), Some(Command::Help));
    }
}
