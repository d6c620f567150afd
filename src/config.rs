// src/config.rs
//! Process configuration.
//!
//! Layers, last one wins:
//! 1) built-in defaults
//! 2) TOML file at $WARBOT_CONFIG_PATH, else `config/warbot.toml` if present
//! 3) environment variables (`.env` is loaded by the binary before this runs)

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::feed::FeedUrls;

pub const ENV_CONFIG_PATH: &str = "WARBOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/warbot.toml";
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub feeds: FeedUrls,
    pub rewards_path: PathBuf,
    pub state_path: PathBuf,
    pub notify_interval_secs: u64,
    /// Long-poll wait passed to getUpdates.
    pub poll_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub console: bool,
    /// Save state after every cycle that changed dedup state.
    pub checkpoint: bool,
    pub admin_bind: Option<String>,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            telegram_api_url: "https://api.telegram.org".into(),
            feeds: FeedUrls::default(),
            rewards_path: PathBuf::from("rewards"),
            state_path: PathBuf::from("chats.json"),
            notify_interval_secs: 900,
            poll_timeout_secs: 5,
            http_timeout_secs: 30,
            console: true,
            checkpoint: true,
            admin_bind: None,
            log_json: false,
        }
    }
}

// keep the token out of logs
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_token", &"<redacted>")
            .field("telegram_api_url", &self.telegram_api_url)
            .field("feeds", &self.feeds)
            .field("rewards_path", &self.rewards_path)
            .field("state_path", &self.state_path)
            .field("notify_interval_secs", &self.notify_interval_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("console", &self.console)
            .field("checkpoint", &self.checkpoint)
            .field("admin_bind", &self.admin_bind)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an explicit variable lookup.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(ENV_CONFIG_PATH) {
            Some(p) => Self::from_file(Path::new(&p))?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(&lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_BOT_TOKEN) {
            self.telegram_token = v;
        }
        if let Some(v) = get("TELEGRAM_API_URL") {
            self.telegram_api_url = v;
        }
        if let Some(v) = get("WARBOT_ALERTS_URL") {
            self.feeds.alerts = v;
        }
        if let Some(v) = get("WARBOT_INVASIONS_URL") {
            self.feeds.invasions = v;
        }
        if let Some(v) = get("WARBOT_DEALS_URL") {
            self.feeds.deals = v;
        }
        if let Some(v) = get("WARBOT_NEWS_URL") {
            self.feeds.news = v;
        }
        if let Some(v) = get("WARBOT_REWARDS_PATH") {
            self.rewards_path = PathBuf::from(v);
        }
        if let Some(v) = get("WARBOT_STATE_PATH") {
            self.state_path = PathBuf::from(v);
        }
        if let Some(v) = get("WARBOT_ADMIN_BIND") {
            self.admin_bind = Some(v);
        }

        self.notify_interval_secs =
            parse_or("WARBOT_NOTIFY_INTERVAL_SECS", get("WARBOT_NOTIFY_INTERVAL_SECS"), self.notify_interval_secs)?;
        self.poll_timeout_secs =
            parse_or("WARBOT_POLL_TIMEOUT_SECS", get("WARBOT_POLL_TIMEOUT_SECS"), self.poll_timeout_secs)?;
        self.http_timeout_secs =
            parse_or("WARBOT_HTTP_TIMEOUT_SECS", get("WARBOT_HTTP_TIMEOUT_SECS"), self.http_timeout_secs)?;
        self.console = flag_or("WARBOT_CONSOLE", get("WARBOT_CONSOLE"), self.console)?;
        self.checkpoint = flag_or("WARBOT_CHECKPOINT", get("WARBOT_CHECKPOINT"), self.checkpoint)?;
        self.log_json = flag_or("WARBOT_LOG_JSON", get("WARBOT_LOG_JSON"), self.log_json)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_BOT_TOKEN));
        }
        if self.notify_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "WARBOT_NOTIFY_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn parse_or(key: &'static str, raw: Option<String>, current: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(current),
        Some(v) => v.parse().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("{v:?}: {e}"),
        }),
    }
}

fn flag_or(key: &'static str, raw: Option<String>, current: bool) -> Result<bool, ConfigError> {
    let Some(v) = raw else {
        return Ok(current);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("{v:?} is not a boolean"),
        }),
    }
}
