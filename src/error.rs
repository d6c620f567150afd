//! Error kinds shared across the bot.
//!
//! Every kind here is recoverable once the process is up: feed errors skip a
//! poll cycle, transport errors skip one recipient, decode errors skip one
//! inbound update, and config errors keep the previous state.

use std::path::PathBuf;
use thiserror::Error;

/// Reward list, state file or config file problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Upstream feed failures. All of them are transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed answered with HTTP {0}")]
    BadStatus(u16),

    #[error("feed payload could not be decoded: {0}")]
    BadJson(String),

    #[error("feed payload was empty")]
    Empty,

    #[error("feed unreachable: {0}")]
    Unreachable(String),
}

impl FeedError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::BadStatus(_) => "bad_status",
            FeedError::BadJson(_) => "bad_json",
            FeedError::Empty => "empty",
            FeedError::Unreachable(_) => "unreachable",
        }
    }
}

/// Delivery or long-poll failures against the chat transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("transport answered with HTTP {0}")]
    Status(u16),

    #[error("transport rejected the call: {0}")]
    Rejected(String),

    #[error("transport response could not be decoded: {0}")]
    Decode(String),
}

/// An inbound update that carries nothing we can dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("update has no message")]
    MissingMessage,

    #[error("message has no text")]
    MissingText,

    #[error("malformed update: {0}")]
    Malformed(String),
}
