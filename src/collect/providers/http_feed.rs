// src/collect/providers/http_feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

use crate::collect::rss::FeedFetcher;

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml";

/// Plain HTTP GET with a descriptive User-Agent and a per-request timeout.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("feed http get {url}"))?;
        let rsp = rsp
            .error_for_status()
            .with_context(|| format!("feed http status {url}"))?;
        rsp.text().await.context("feed http .text()")
    }
}
