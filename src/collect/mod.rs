// src/collect/mod.rs
pub mod feed;
pub mod providers;
pub mod reddit;
pub mod rss;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::article::{Article, CollectorKind};

/// Status snapshot for reports; `config` never carries secrets.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub name: String,
    pub kind: CollectorKind,
    pub enabled: bool,
    /// Configured subreddits or feeds.
    pub sources: usize,
    pub config: serde_json::Value,
}

/// One source type. `collect` logs and skips failing sub-sources itself;
/// an `Err` means the whole collector failed and the cycle moves on without it.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> CollectorKind;
    fn is_enabled(&self) -> bool;
    async fn collect(&self) -> Result<Vec<Article>>;

    async fn test_connection(&self) -> bool {
        true
    }

    fn status(&self) -> CollectorStatus;
}

pub use reddit::{RedditCollector, RedditSource};
pub use rss::{FeedFetcher, RssCollector};
