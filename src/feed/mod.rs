// src/feed/mod.rs
pub mod decode;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::error::FeedError;
use crate::events::{Event, NewsItem};

/// Upstream data feeds, decoded into normalized records.
///
/// Every failure is a [`FeedError`]; callers treat them all as transient.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_alerts(&self) -> Result<Vec<Event>, FeedError>;
    async fn fetch_invasions(&self) -> Result<Vec<Event>, FeedError>;
    async fn fetch_deals(&self) -> Result<Vec<Event>, FeedError>;
    async fn fetch_news(&self) -> Result<Vec<NewsItem>, FeedError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedUrls {
    pub alerts: String,
    pub invasions: String,
    pub deals: String,
    pub news: String,
}

impl Default for FeedUrls {
    fn default() -> Self {
        Self {
            alerts: "https://deathsnacks.com/wf/data/last15alerts_localized.json".into(),
            invasions: "https://deathsnacks.com/wf/data/invasion.json".into(),
            deals: "https://deathsnacks.com/wf/data/daily_deals.json".into(),
            news: "https://deathsnacks.com/wf/data/news_raw.txt".into(),
        }
    }
}

/// Plain HTTP GET against the deathsnacks mirrors.
pub struct HttpEventSource {
    urls: FeedUrls,
    client: Client,
    timeout: Duration,
}

impl HttpEventSource {
    pub fn new(urls: FeedUrls) -> Self {
        Self {
            urls,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn get_body(&self, feed: &'static str, url: &str) -> Result<String, FeedError> {
        let t0 = Instant::now();
        let res = self.client.get(url).timeout(self.timeout).send().await;
        let resp = match res {
            Ok(r) => r,
            Err(e) => return Err(FeedError::Unreachable(e.without_url().to_string())),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::BadStatus(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::BadJson(format!("reading body: {e}")))?;

        histogram!("warbot_feed_fetch_ms", "feed" => feed)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(body)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_alerts(&self) -> Result<Vec<Event>, FeedError> {
        let body = self.get_body("alerts", &self.urls.alerts).await?;
        decode::decode_alerts(&body, chrono::Utc::now())
    }

    async fn fetch_invasions(&self) -> Result<Vec<Event>, FeedError> {
        let body = self.get_body("invasions", &self.urls.invasions).await?;
        decode::decode_invasions(&body)
    }

    async fn fetch_deals(&self) -> Result<Vec<Event>, FeedError> {
        let body = self.get_body("deals", &self.urls.deals).await?;
        decode::decode_deals(&body, chrono::Utc::now())
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, FeedError> {
        let body = self.get_body("news", &self.urls.news).await?;
        decode::decode_news(&body)
    }
}
