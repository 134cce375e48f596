// src/watchdog.rs
//! One collection cycle: every enabled collector in order, one store call, a report.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use metrics::{gauge, histogram};
use serde::Serialize;

use crate::article::Article;
use crate::collect::providers::{HttpFeedFetcher, RedditApiClient};
use crate::collect::{Collector, CollectorStatus, RedditCollector, RssCollector};
use crate::config::{AppConfig, Secrets, StorageConfig};
use crate::store::airtable::AirtableTable;
use crate::store::memory::MemoryTable;
use crate::store::{ArticleStore, RemoteTable, StoreOutcome, StoreStats, StoreStatus, WarmScope};
use crate::telemetry;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub articles_collected: usize,
    pub storage_success: bool,
    /// `None` when no store was available.
    pub store_outcome: Option<StoreOutcome>,
    pub collectors: Vec<CollectorStatus>,
    pub storage: Option<StoreStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorsSummary {
    pub total: usize,
    pub enabled: usize,
    pub details: Vec<CollectorStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub collectors: CollectorsSummary,
    pub storage: Option<StoreStats>,
}

pub struct Watchdog {
    collectors: Vec<Box<dyn Collector>>,
    store: Option<ArticleStore>,
    warmup: Option<WarmScope>,
}

impl Watchdog {
    pub fn new(collectors: Vec<Box<dyn Collector>>, store: Option<ArticleStore>) -> Self {
        Self {
            collectors,
            store,
            warmup: None,
        }
    }

    /// Bulk-load hashes before each cycle while the cache is stale.
    pub fn with_cache_warmup(mut self, scope: Option<WarmScope>) -> Self {
        self.warmup = scope;
        self
    }

    /// Build collectors (reddit, then rss) and the store. A component that
    /// cannot be built is logged and left out.
    pub fn from_config(cfg: &AppConfig, secrets: &Secrets) -> Self {
        let mut collectors: Vec<Box<dyn Collector>> = Vec::new();

        let reddit = &cfg.collectors.reddit;
        if reddit.enabled {
            match RedditApiClient::new(
                secrets.reddit_client_id.as_deref().unwrap_or_default(),
                secrets.reddit_client_secret.as_deref().unwrap_or_default(),
                &secrets.reddit_user_agent,
            ) {
                Ok(client) => {
                    collectors.push(Box::new(RedditCollector::new(reddit.clone(), Box::new(client))));
                    tracing::info!(target: "watchdog", "reddit collector initialized");
                }
                Err(e) => {
                    tracing::error!(target: "watchdog", error = ?e, "failed to initialize reddit collector")
                }
            }
        }

        let rss = &cfg.collectors.rss;
        if rss.enabled {
            match HttpFeedFetcher::new(&rss.user_agent, rss.timeout_secs) {
                Ok(fetcher) => {
                    collectors.push(Box::new(RssCollector::new(rss.clone(), Box::new(fetcher))));
                    tracing::info!(target: "watchdog", feeds = rss.feeds.len(), "rss collector initialized");
                }
                Err(e) => {
                    tracing::error!(target: "watchdog", error = ?e, "failed to initialize rss collector")
                }
            }
        }

        let store = match build_store(&cfg.storage, secrets) {
            Ok(s) => {
                tracing::info!(target: "watchdog", backend = s.backend(), "storage initialized");
                Some(s)
            }
            Err(e) => {
                tracing::error!(target: "watchdog", error = ?e, "failed to initialize storage");
                None
            }
        };

        Self::new(collectors, store).with_cache_warmup(warm_scope(&cfg.storage))
    }

    pub fn collectors(&self) -> &[Box<dyn Collector>] {
        &self.collectors
    }

    pub fn store(&self) -> Option<&ArticleStore> {
        self.store.as_ref()
    }

    /// Enabled collectors in order; a failing collector contributes nothing.
    pub async fn collect_all(&self) -> Vec<Article> {
        let mut all = Vec::new();
        tracing::info!(target: "watchdog", "starting data collection from all sources");

        for c in self.collectors.iter().filter(|c| c.is_enabled()) {
            tracing::info!(target: "watchdog", collector = c.name(), "collecting");
            match c.collect().await {
                Ok(mut v) => {
                    tracing::info!(target: "watchdog", collector = c.name(), count = v.len(), "collector done");
                    all.append(&mut v);
                }
                Err(e) => {
                    tracing::error!(target: "watchdog", error = ?e, collector = c.name(), "collector failed");
                }
            }
        }

        tracing::info!(target: "watchdog", total = all.len(), "collection finished");
        all
    }

    /// `None` when there is no store: the cycle cannot persist anything.
    pub async fn store_articles(&mut self, articles: &[Article]) -> Option<StoreOutcome> {
        let Some(store) = self.store.as_mut() else {
            tracing::error!(target: "watchdog", "no storage system initialized");
            return None;
        };
        if articles.is_empty() {
            tracing::info!(target: "watchdog", "no articles to store");
        }
        Some(store.store(articles).await)
    }

    pub async fn run_cycle(&mut self) -> RunReport {
        telemetry::ensure_metrics_described();
        let started_at = Utc::now();
        let t0 = Instant::now();
        tracing::info!(target: "watchdog", "starting collection cycle");

        if let (Some(scope), Some(store)) = (self.warmup, self.store.as_mut()) {
            if !store.cache_is_fresh() {
                store.warm_cache(scope).await;
            }
        }

        let articles = self.collect_all().await;
        let outcome = self.store_articles(&articles).await;

        let elapsed = t0.elapsed();
        let finished_at = Utc::now();
        let storage_success = outcome.is_some_and(|o| o.is_success());

        histogram!(telemetry::CYCLE_MS).record(elapsed.as_secs_f64() * 1_000.0);
        gauge!(telemetry::LAST_CYCLE_TS).set(finished_at.timestamp() as f64);

        tracing::info!(
            target: "watchdog",
            duration_secs = elapsed.as_secs_f64(),
            collected = articles.len(),
            storage_success,
            "collection cycle completed"
        );

        RunReport {
            started_at,
            finished_at,
            duration_secs: elapsed.as_secs_f64(),
            articles_collected: articles.len(),
            storage_success,
            store_outcome: outcome,
            collectors: self.collectors.iter().map(|c| c.status()).collect(),
            storage: match &self.store {
                Some(s) => Some(s.status().await),
                None => None,
            },
        }
    }

    /// `collector_<name>` per collector, plus `storage` when a store exists.
    pub async fn test_connections(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for c in &self.collectors {
            results.insert(format!("collector_{}", c.name()), c.test_connection().await);
        }
        if let Some(store) = &self.store {
            results.insert("storage".to_string(), store.test_connection().await);
        }
        results
    }

    pub async fn stats(&self) -> SystemStats {
        let details: Vec<CollectorStatus> = self.collectors.iter().map(|c| c.status()).collect();
        let storage = match &self.store {
            Some(s) => s.stats().await,
            None => None,
        };
        SystemStats {
            collectors: CollectorsSummary {
                total: self.collectors.len(),
                enabled: self.collectors.iter().filter(|c| c.is_enabled()).count(),
                details,
            },
            storage,
        }
    }
}

fn warm_scope(cfg: &StorageConfig) -> Option<WarmScope> {
    if !cfg.warm_cache {
        return None;
    }
    Some(match cfg.warm_cache_days {
        Some(days) => WarmScope::RecentDays(days),
        None => WarmScope::All,
    })
}

fn build_store(cfg: &StorageConfig, secrets: &Secrets) -> Result<ArticleStore> {
    if !cfg.enabled {
        bail!("storage is disabled in configuration");
    }
    let table: Box<dyn RemoteTable> = match cfg.kind.to_ascii_lowercase().as_str() {
        "airtable" => Box::new(
            AirtableTable::new(
                secrets.airtable_api_key.as_deref().unwrap_or_default(),
                secrets.airtable_base_id.as_deref().unwrap_or_default(),
                &secrets.airtable_table_name,
            )?
            .with_timeout(cfg.timeout_secs),
        ),
        "memory" => Box::new(MemoryTable::new()),
        other => bail!("unsupported storage type: {other}"),
    };
    Ok(ArticleStore::from_config(table, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_skips_components_without_credentials() {
        let mut cfg = AppConfig::default();
        cfg.collectors.rss.feeds.push(crate::config::FeedSpec {
            url: "https://x.test/rss".into(),
            name: None,
        });
        let w = Watchdog::from_config(&cfg, &Secrets::default());
        let names: Vec<_> = w.collectors().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["rss"]);
        assert!(w.store().is_none());
    }

    #[test]
    fn memory_backend_builds() {
        let mut cfg = AppConfig::default();
        cfg.storage.kind = "memory".into();
        cfg.collectors.reddit.enabled = false;
        let w = Watchdog::from_config(&cfg, &Secrets::default());
        assert_eq!(w.store().map(|s| s.backend()), Some("memory"));
    }

    #[test]
    fn warm_scope_from_config() {
        let mut cfg = StorageConfig::default();
        assert_eq!(warm_scope(&cfg), None);
        cfg.warm_cache = true;
        assert_eq!(warm_scope(&cfg), Some(WarmScope::All));
        cfg.warm_cache_days = Some(7);
        assert_eq!(warm_scope(&cfg), Some(WarmScope::RecentDays(7)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let cfg = StorageConfig {
            kind: "sheets".into(),
            ..Default::default()
        };
        assert!(build_store(&cfg, &Secrets::default()).is_err());
    }

    #[tokio::test]
    async fn no_store_means_failed_storage() {
        let mut w = Watchdog::new(Vec::new(), None);
        let report = w.run_cycle().await;
        assert_eq!(report.articles_collected, 0);
        assert!(!report.storage_success);
        assert!(report.store_outcome.is_none());
        assert!(report.storage.is_none());
    }
}
