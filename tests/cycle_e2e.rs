// tests/cycle_e2e.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use info_watchdog::collect::reddit::{ListingQuery, RawPost};
use info_watchdog::collect::{Collector, FeedFetcher, RedditCollector, RedditSource, RssCollector};
use info_watchdog::config::{FeedSpec, RedditConfig, RssConfig};
use info_watchdog::store::memory::MemoryTable;
use info_watchdog::store::record::Fields;
use info_watchdog::store::{ArticleStore, Query, RemoteTable, StoredRecord, WarmScope};
use info_watchdog::Watchdog;

struct OneSubreddit(Vec<RawPost>);

#[async_trait]
impl RedditSource for OneSubreddit {
    async fn fetch_listing(&self, _subreddit: &str, _query: &ListingQuery) -> Result<Vec<RawPost>> {
        Ok(self.0.clone())
    }
    async fn verify(&self) -> Result<()> {
        Ok(())
    }
}

struct StaticFeed(HashMap<String, String>);

#[async_trait]
impl FeedFetcher for StaticFeed {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.0.get(url).cloned().ok_or_else(|| anyhow!("no route to {url}"))
    }
}

/// Never finds anything remotely; counts inserts.
#[derive(Clone, Default)]
struct EmptyRemote {
    rows: MemoryTable,
    inserts: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteTable for EmptyRemote {
    async fn insert(&self, fields: Fields) -> Result<String> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.rows.insert(fields).await
    }
    async fn find_by_field(&self, _field: &str, _value: &str) -> Result<Vec<StoredRecord>> {
        Ok(Vec::new())
    }
    async fn query(&self, query: Query) -> Result<Vec<StoredRecord>> {
        self.rows.query(query).await
    }
    fn name(&self) -> &str {
        "empty-remote"
    }
}

/// Whole collector blows up.
struct Broken;

#[async_trait]
impl Collector for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn kind(&self) -> info_watchdog::CollectorKind {
        info_watchdog::CollectorKind::Rss
    }
    fn is_enabled(&self) -> bool {
        true
    }
    async fn collect(&self) -> Result<Vec<info_watchdog::Article>> {
        bail!("collector crashed")
    }
    fn status(&self) -> info_watchdog::CollectorStatus {
        info_watchdog::CollectorStatus {
            name: "broken".into(),
            kind: self.kind(),
            enabled: true,
            sources: 0,
            config: serde_json::Value::Null,
        }
    }
}

fn reddit_post(title: &str, id: &str) -> RawPost {
    RawPost {
        title: title.into(),
        url: format!("https://news.test/{id}"),
        permalink: format!("/r/environment/comments/{id}/"),
        created_utc: 1_729_000_000.0,
        author: Some("poster".into()),
        score: 5,
        ..Default::default()
    }
}

fn reddit(posts: Vec<RawPost>) -> Box<dyn Collector> {
    Box::new(RedditCollector::new(
        RedditConfig {
            subreddits: vec!["environment".into()],
            ..Default::default()
        },
        Box::new(OneSubreddit(posts)),
    ))
}

fn rss_one_item() -> Box<dyn Collector> {
    let body = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item>
    <title>Forest restoration gets funding</title>
    <link>https://feed.test/forest</link>
    <description>Planting starts in spring.</description>
    <pubDate>Wed, 16 Oct 2024 10:00:00 +0000</pubDate>
  </item>
</channel></rss>"#;
    let mut bodies = HashMap::new();
    bodies.insert("https://feed.test/rss".to_string(), body.to_string());
    Box::new(RssCollector::new(
        RssConfig {
            feeds: vec![FeedSpec {
                url: "https://feed.test/rss".into(),
                name: Some("Feed Test".into()),
            }],
            ..Default::default()
        },
        Box::new(StaticFeed(bodies)),
    ))
}

#[tokio::test]
async fn full_cycle_collects_and_stores_everything_new() {
    let remote = EmptyRemote::default();
    let store = ArticleStore::new(Box::new(remote.clone()), 3600);
    let mut w = Watchdog::new(
        vec![
            reddit(vec![
                reddit_post("Solar tariffs cut", "a"),
                reddit_post("Ocean heatwave", "b"),
            ]),
            rss_one_item(),
        ],
        Some(store),
    );

    let report = w.run_cycle().await;
    assert_eq!(report.articles_collected, 3);
    assert!(report.storage_success);
    let outcome = report.store_outcome.unwrap();
    assert_eq!(outcome.inserted, 3);
    assert_eq!(remote.inserts.load(Ordering::SeqCst), 3);
    assert_eq!(report.collectors.len(), 2);
    assert!(report.finished_at >= report.started_at);

    let rows = remote.rows.snapshot().await;
    let collectors: Vec<_> = rows.iter().filter_map(|r| r.field_str("Collector")).collect();
    assert_eq!(collectors, vec!["reddit", "reddit", "rss"]);
}

#[tokio::test]
async fn failing_collector_is_isolated() {
    let remote = EmptyRemote::default();
    let mut w = Watchdog::new(
        vec![Box::new(Broken), rss_one_item()],
        Some(ArticleStore::new(Box::new(remote.clone()), 3600)),
    );
    let report = w.run_cycle().await;
    assert_eq!(report.articles_collected, 1);
    assert!(report.storage_success);
}

#[tokio::test]
async fn second_cycle_is_all_duplicates_and_still_succeeds() {
    let remote = EmptyRemote::default();
    let mut w = Watchdog::new(
        vec![rss_one_item()],
        Some(ArticleStore::new(Box::new(remote.clone()), 3600)),
    );
    assert!(w.run_cycle().await.storage_success);
    let second = w.run_cycle().await;
    assert!(second.storage_success);
    let outcome = second.store_outcome.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(remote.inserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_collection_is_success() {
    let mut w = Watchdog::new(
        vec![reddit(vec![])],
        Some(ArticleStore::new(Box::new(MemoryTable::new()), 3600)),
    );
    let report = w.run_cycle().await;
    assert_eq!(report.articles_collected, 0);
    assert!(report.storage_success);
}

#[tokio::test]
async fn warmup_runs_before_collection() {
    let store = ArticleStore::new(Box::new(MemoryTable::new()), 3600);
    let mut w = Watchdog::new(vec![rss_one_item()], Some(store)).with_cache_warmup(Some(WarmScope::All));
    let report = w.run_cycle().await;
    let storage = report.storage.unwrap();
    assert!(storage.cache_fresh);
    assert!(storage.last_cache_refresh.is_some());
    assert_eq!(storage.cache_size, 1);
    assert!(storage.connection);
    assert!(storage.enabled);
}

/// Every query fails: inserts work but the table cannot be listed.
#[derive(Clone, Default)]
struct Unlistable(MemoryTable);

#[async_trait]
impl RemoteTable for Unlistable {
    async fn insert(&self, fields: Fields) -> Result<String> {
        self.0.insert(fields).await
    }
    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<StoredRecord>> {
        self.0.find_by_field(field, value).await
    }
    async fn query(&self, _query: Query) -> Result<Vec<StoredRecord>> {
        bail!("HTTP 503")
    }
    fn name(&self) -> &str {
        "unlistable"
    }
}

#[tokio::test]
async fn report_carries_storage_connectivity() {
    let mut w = Watchdog::new(
        vec![rss_one_item()],
        Some(ArticleStore::new(Box::new(Unlistable::default()), 3600)),
    );
    let report = w.run_cycle().await;
    assert!(report.storage_success);
    let storage = report.storage.unwrap();
    assert_eq!(storage.backend, "unlistable");
    assert!(!storage.connection);
}

#[tokio::test]
async fn connection_report_and_stats() {
    let table = MemoryTable::new();
    let mut w = Watchdog::new(
        vec![reddit(vec![reddit_post("Clean water act", "w")]), rss_one_item()],
        Some(ArticleStore::new(Box::new(table), 3600)),
    );

    let checks = w.test_connections().await;
    assert_eq!(checks.get("collector_reddit"), Some(&true));
    assert_eq!(checks.get("collector_rss"), Some(&true));
    assert_eq!(checks.get("storage"), Some(&true));

    w.run_cycle().await;
    let stats = w.stats().await;
    assert_eq!(stats.collectors.total, 2);
    assert_eq!(stats.collectors.enabled, 2);
    let storage = stats.storage.unwrap();
    assert_eq!(storage.total_articles, 2);
    assert_eq!(storage.recent_articles_7days, 2);
    assert_eq!(storage.articles_by_source.get("r/environment"), Some(&1));
    assert_eq!(storage.articles_by_source.get("Feed Test"), Some(&1));
}
