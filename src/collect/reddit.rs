// src/collect/reddit.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::article::{Article, CollectorKind, Extras, RawArticle, RedditExtras};
use crate::collect::{Collector, CollectorStatus};
use crate::config::RedditConfig;
use crate::normalize::{is_relevant, truncate_chars};
use crate::telemetry;

const MAX_SELFTEXT: usize = 500;
const PERMALINK_BASE: &str = "https://reddit.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    /// Unknown values fall back to `Hot`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => SortMode::New,
            "top" => SortMode::Top,
            "rising" => SortMode::Rising,
            "hot" => SortMode::Hot,
            other => {
                tracing::warn!(target: "collector.reddit", sort = other, "unknown sort_type, using hot");
                SortMode::Hot
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }
}

/// What to ask a subreddit listing for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub sort: SortMode,
    pub limit: u32,
    /// hour | day | week | month | year | all; only sent for `Top`.
    pub time_filter: Option<String>,
}

/// A post as the listing API returns it (`data.children[].data`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub removed_by_category: Option<String>,
    #[serde(default)]
    pub link_flair_text: Option<String>,
}

/// Opaque Reddit capability: listing fetch + auth check.
#[async_trait]
pub trait RedditSource: Send + Sync {
    async fn fetch_listing(&self, subreddit: &str, query: &ListingQuery) -> Result<Vec<RawPost>>;
    /// Prove the auth path works.
    async fn verify(&self) -> Result<()>;
}

pub struct RedditCollector {
    cfg: RedditConfig,
    source: Box<dyn RedditSource>,
}

impl RedditCollector {
    pub fn new(cfg: RedditConfig, source: Box<dyn RedditSource>) -> Self {
        Self { cfg, source }
    }

    fn listing_query(&self) -> ListingQuery {
        let sort = SortMode::parse(&self.cfg.sort_type);
        ListingQuery {
            sort,
            limit: self.cfg.limit,
            time_filter: (sort == SortMode::Top).then(|| self.cfg.time_filter.clone()),
        }
    }

    async fn collect_from_subreddit(&self, subreddit: &str, query: &ListingQuery) -> Result<Vec<Article>> {
        let posts = self.source.fetch_listing(subreddit, query).await?;
        let now = Utc::now();
        Ok(posts
            .into_iter()
            .filter_map(|p| post_to_article(p, subreddit, now))
            .collect())
    }
}

/// `None` for stickied, removed or irrelevant posts.
pub fn post_to_article(post: RawPost, subreddit: &str, now: chrono::DateTime<Utc>) -> Option<Article> {
    if post.stickied || post.removed_by_category.is_some() {
        return None;
    }
    if !is_relevant(&format!("{} {}", post.title, post.selftext)) {
        return None;
    }

    let url = if post.is_self {
        format!("{PERMALINK_BASE}{}", post.permalink)
    } else {
        post.url.clone()
    };
    let published = Utc
        .timestamp_opt(post.created_utc.trunc() as i64, 0)
        .single()
        .filter(|_| post.created_utc > 0.0);

    let raw = RawArticle {
        title: post.title,
        url,
        source: format!("r/{subreddit}"),
        content: truncate_chars(&post.selftext, MAX_SELFTEXT),
        published,
        author: post.author.filter(|a| a != "[deleted]"),
        native_tags: post.link_flair_text.into_iter().collect(),
    };
    let extras = Extras::Reddit(RedditExtras {
        score: post.score,
        comments: post.num_comments,
        upvote_ratio: post.upvote_ratio,
        is_self: post.is_self,
        subreddit: subreddit.to_string(),
    });
    Some(Article::normalize(raw, extras, now))
}

#[async_trait]
impl Collector for RedditCollector {
    fn name(&self) -> &str {
        "reddit"
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::Reddit
    }

    fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    async fn collect(&self) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        if !self.cfg.enabled {
            tracing::info!(target: "collector.reddit", "reddit collector is disabled");
            return Ok(articles);
        }

        let query = self.listing_query();
        for sub in &self.cfg.subreddits {
            tracing::info!(target: "collector.reddit", subreddit = %sub, sort = query.sort.as_str(), "collecting");
            match self.collect_from_subreddit(sub, &query).await {
                Ok(mut v) => {
                    tracing::info!(target: "collector.reddit", subreddit = %sub, count = v.len(), "collected");
                    articles.append(&mut v);
                }
                Err(e) => {
                    tracing::error!(target: "collector.reddit", error = ?e, subreddit = %sub, "subreddit failed");
                    counter!(telemetry::SOURCE_ERRORS, "collector" => "reddit").increment(1);
                }
            }
        }

        counter!(telemetry::ARTICLES_COLLECTED, "collector" => "reddit").increment(articles.len() as u64);
        Ok(articles)
    }

    async fn test_connection(&self) -> bool {
        match self.source.verify().await {
            Ok(()) => {
                tracing::info!(target: "collector.reddit", "connection test successful");
                true
            }
            Err(e) => {
                tracing::error!(target: "collector.reddit", error = ?e, "connection test failed");
                false
            }
        }
    }

    fn status(&self) -> CollectorStatus {
        CollectorStatus {
            name: self.name().to_string(),
            kind: self.kind(),
            enabled: self.cfg.enabled,
            sources: self.cfg.subreddits.len(),
            config: serde_json::to_value(&self.cfg).unwrap_or_default(),
        }
    }
}
