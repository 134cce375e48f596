// src/collect/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::article::{Article, CollectorKind, Extras, FeedExtras, RawArticle};
use crate::collect::feed::{self, parse_free_text_date, parse_rfc2822, parse_rfc3339, FeedEntry};
use crate::collect::{Collector, CollectorStatus};
use crate::config::{FeedSpec, RssConfig};
use crate::normalize::{is_relevant, strip_html, truncate_chars};
use crate::telemetry;

const MAX_CONTENT: usize = 1000;
const NO_TITLE: &str = "No title";

/// Opaque feed transport: url → body.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct RssCollector {
    cfg: RssConfig,
    fetcher: Box<dyn FeedFetcher>,
}

impl RssCollector {
    pub fn new(cfg: RssConfig, fetcher: Box<dyn FeedFetcher>) -> Self {
        Self { cfg, fetcher }
    }

    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let body = self.fetcher.fetch(url).await.context("fetching feed")?;
        feed::parse_feed(&body)
    }

    async fn collect_from_feed(&self, spec: &FeedSpec) -> Result<Vec<Article>> {
        let entries = self.fetch_entries(&spec.url).await?;
        let now = Utc::now();
        Ok(entries
            .into_iter()
            .filter_map(|e| entry_to_article(e, spec, now))
            .collect())
    }

    /// Fetch + parse one feed; true when it has at least one entry.
    pub async fn test_feed(&self, url: &str) -> bool {
        match self.fetch_entries(url).await {
            Ok(entries) if !entries.is_empty() => {
                tracing::info!(target: "collector.rss", feed = url, "feed test successful");
                true
            }
            Ok(_) => {
                tracing::warn!(target: "collector.rss", feed = url, "feed has no entries");
                false
            }
            Err(e) => {
                tracing::error!(target: "collector.rss", error = ?e, feed = url, "feed test failed");
                false
            }
        }
    }
}

/// summary → description → content, HTML stripped, 1000 chars.
pub fn extract_content(e: &FeedEntry) -> String {
    [&e.summary, &e.description, &e.content]
        .into_iter()
        .flatten()
        .map(|s| strip_html(s))
        .find(|s| !s.trim().is_empty())
        .map(|s| truncate_chars(&s, MAX_CONTENT))
        .unwrap_or_default()
}

/// Structured fields first, free text next; `None` lets the article default to now.
pub fn extract_published(e: &FeedEntry) -> Option<DateTime<Utc>> {
    let structured = e
        .published
        .as_deref()
        .and_then(|s| parse_rfc2822(s).or_else(|| parse_rfc3339(s)))
        .or_else(|| e.updated.as_deref().and_then(parse_rfc3339));
    if structured.is_some() {
        return structured;
    }
    [&e.published, &e.updated, &e.dc_date]
        .into_iter()
        .flatten()
        .find_map(|s| parse_free_text_date(s))
}

/// `author`, then `dc:creator`. A blank author does not shadow the creator.
pub fn extract_author(e: &FeedEntry) -> Option<String> {
    e.author
        .clone()
        .filter(|a| !a.trim().is_empty())
        .or_else(|| e.creator.clone())
}

/// `None` when the entry is not relevant.
pub fn entry_to_article(e: FeedEntry, spec: &FeedSpec, now: DateTime<Utc>) -> Option<Article> {
    let title = e.title.clone().unwrap_or_else(|| NO_TITLE.to_string());
    let summary = e.summary.as_deref().unwrap_or_default();
    if !is_relevant(&format!("{title} {summary}")) {
        return None;
    }

    let raw = RawArticle {
        title,
        url: e.link.clone().unwrap_or_default(),
        source: spec.display_name().to_string(),
        content: extract_content(&e),
        published: extract_published(&e),
        author: extract_author(&e),
        native_tags: e.categories.clone(),
    };
    let extras = Extras::Rss(FeedExtras {
        feed_url: spec.url.clone(),
        guid: e.id,
        categories: e.categories,
    });
    Some(Article::normalize(raw, extras, now))
}

#[async_trait]
impl Collector for RssCollector {
    fn name(&self) -> &str {
        "rss"
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::Rss
    }

    fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    async fn collect(&self) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        if !self.cfg.enabled {
            tracing::info!(target: "collector.rss", "rss collector is disabled");
            return Ok(articles);
        }

        for spec in &self.cfg.feeds {
            let name = spec.display_name();
            tracing::info!(target: "collector.rss", feed = name, "collecting");
            match self.collect_from_feed(spec).await {
                Ok(mut v) => {
                    tracing::info!(target: "collector.rss", feed = name, count = v.len(), "collected");
                    articles.append(&mut v);
                }
                Err(e) => {
                    tracing::error!(target: "collector.rss", error = ?e, feed = name, url = %spec.url, "feed failed");
                    counter!(telemetry::SOURCE_ERRORS, "collector" => "rss").increment(1);
                }
            }
        }

        counter!(telemetry::ARTICLES_COLLECTED, "collector" => "rss").increment(articles.len() as u64);
        Ok(articles)
    }

    async fn test_connection(&self) -> bool {
        match self.cfg.feeds.first() {
            Some(spec) => self.test_feed(&spec.url).await,
            None => {
                tracing::warn!(target: "collector.rss", "no feeds configured");
                false
            }
        }
    }

    fn status(&self) -> CollectorStatus {
        CollectorStatus {
            name: self.name().to_string(),
            kind: self.kind(),
            enabled: self.cfg.enabled,
            sources: self.cfg.feeds.len(),
            config: serde_json::to_value(&self.cfg).unwrap_or_default(),
        }
    }
}
