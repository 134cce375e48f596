// src/store/mod.rs
//! Persistence: the `RemoteTable` capability, the dedup cache, and
//! `ArticleStore`, which filters and appends articles one at a time.

pub mod airtable;
pub mod cache;
pub mod memory;
pub mod record;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::article::Article;
use crate::config::StorageConfig;
use crate::telemetry;
use cache::{CacheLookup, DedupCache};
use record::{Fields, F_COLLECTED, F_HASH, F_SOURCE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Fields,
}

impl StoredRecord {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Date column (`YYYY-MM-DD`) on or after the given day.
    OnOrAfter { field: String, date: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    /// Restrict returned columns; all when `None`.
    pub fields: Option<Vec<String>>,
    pub max_records: Option<usize>,
}

/// Opaque hosted table. Implementations: Airtable, in-process memory.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Append one record; returns its id.
    async fn insert(&self, fields: Fields) -> Result<String>;
    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<StoredRecord>>;
    async fn query(&self, query: Query) -> Result<Vec<StoredRecord>>;
    fn name(&self) -> &str;
}

/// Per-call bookkeeping of `ArticleStore::store`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreOutcome {
    /// Articles handed in.
    pub received: usize,
    /// Dropped as already stored (remote, cache, or earlier in the same call).
    pub duplicates: usize,
    /// Inserts actually sent.
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
}

impl StoreOutcome {
    /// True when something was inserted, or when nothing needed inserting
    /// (empty input or all duplicates). False only if every attempted insert failed.
    pub fn is_success(&self) -> bool {
        self.inserted > 0 || self.attempted == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub backend: String,
    pub enabled: bool,
    /// Result of `test_connection` at the time the status was taken.
    pub connection: bool,
    pub timeout_secs: u64,
    pub cache_size: usize,
    pub cache_fresh: bool,
    pub cache_ttl_secs: i64,
    pub last_cache_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_articles: usize,
    pub recent_articles_7days: usize,
    pub articles_by_source: BTreeMap<String, usize>,
    pub cache_size: usize,
    pub last_cache_refresh: Option<DateTime<Utc>>,
}

/// What a warm-up loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmScope {
    /// Every hash in the table; the cache becomes fresh.
    All,
    /// Hashes collected in the trailing N days. Only adds known positives,
    /// the cache stays stale so older hashes still go to the remote.
    RecentDays(u32),
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ArticleStore {
    table: Box<dyn RemoteTable>,
    cache: DedupCache,
    clock: Clock,
    enabled: bool,
    timeout_secs: u64,
}

impl ArticleStore {
    pub fn new(table: Box<dyn RemoteTable>, cache_ttl_secs: u64) -> Self {
        Self {
            table,
            cache: DedupCache::new(i64::try_from(cache_ttl_secs).unwrap_or(i64::MAX)),
            clock: Arc::new(Utc::now),
            enabled: true,
            timeout_secs: StorageConfig::default().timeout_secs,
        }
    }

    pub fn from_config(table: Box<dyn RemoteTable>, cfg: &StorageConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            timeout_secs: cfg.timeout_secs,
            ..Self::new(table, cfg.cache_ttl_secs)
        }
    }

    /// Replace the wall clock (tests drive TTL expiry with this).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &str {
        self.table.name()
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Duplicate check for one hash: cache first, then the remote by hash.
    /// A failed remote lookup counts as "not duplicate".
    pub async fn is_duplicate(&mut self, hash: &str) -> bool {
        if hash.is_empty() {
            return false;
        }
        match self.cache.lookup(hash, self.now()) {
            CacheLookup::Present => true,
            CacheLookup::Absent => false,
            CacheLookup::Unknown => match self.table.find_by_field(F_HASH, hash).await {
                Ok(records) => {
                    let exists = !records.is_empty();
                    if exists {
                        self.cache.insert(hash);
                    }
                    exists
                }
                Err(e) => {
                    tracing::error!(target: "storage", error = ?e, %hash, "duplicate check failed");
                    false
                }
            },
        }
    }

    /// Keep the articles not already stored, in input order.
    pub async fn filter_new<'a>(&mut self, articles: &'a [Article]) -> Vec<&'a Article> {
        let mut fresh = Vec::with_capacity(articles.len());
        for a in articles {
            if !self.is_duplicate(a.hash()).await {
                fresh.push(a);
            }
        }
        tracing::info!(
            target: "storage",
            received = articles.len(),
            new = fresh.len(),
            "filtered articles"
        );
        fresh
    }

    /// Filter, then insert survivors one at a time. One failed insert never
    /// stops the others.
    pub async fn store(&mut self, articles: &[Article]) -> StoreOutcome {
        let mut out = StoreOutcome {
            received: articles.len(),
            ..Default::default()
        };
        if articles.is_empty() {
            return out;
        }

        let fresh = self.filter_new(articles).await;
        out.duplicates = articles.len() - fresh.len();

        for article in fresh {
            // Same hash already inserted earlier in this call.
            if self.cache.contains(article.hash()) {
                out.duplicates += 1;
                continue;
            }
            out.attempted += 1;
            match self.table.insert(record::to_fields(article)).await {
                Ok(id) => {
                    out.inserted += 1;
                    self.cache.insert(article.hash());
                    tracing::debug!(target: "storage", %id, hash = article.hash(), "inserted");
                }
                Err(e) => {
                    out.failed += 1;
                    tracing::error!(
                        target: "storage",
                        error = ?e,
                        title = article.title(),
                        hash = article.hash(),
                        "failed to insert article"
                    );
                }
            }
        }

        counter!(telemetry::STORE_INSERTED).increment(out.inserted as u64);
        counter!(telemetry::STORE_FAILED).increment(out.failed as u64);
        counter!(telemetry::STORE_DUPLICATES).increment(out.duplicates as u64);

        tracing::info!(
            target: "storage",
            inserted = out.inserted,
            attempted = out.attempted,
            failed = out.failed,
            duplicates = out.duplicates,
            "store finished"
        );
        out
    }

    fn since_days(&self, days: u32) -> NaiveDate {
        (self.now() - ChronoDuration::days(i64::from(days))).date_naive()
    }

    /// Records collected in the trailing `days`, newest first. Errors → empty.
    pub async fn get_recent_articles(&self, days: u32) -> Vec<StoredRecord> {
        let query = Query {
            filter: Some(Filter::OnOrAfter {
                field: F_COLLECTED.to_string(),
                date: self.since_days(days),
            }),
            sort: Some(Sort {
                field: F_COLLECTED.to_string(),
                direction: Direction::Desc,
            }),
            ..Default::default()
        };
        match self.table.query(query).await {
            Ok(records) => {
                tracing::info!(target: "storage", count = records.len(), days, "retrieved recent articles");
                records
            }
            Err(e) => {
                tracing::error!(target: "storage", error = ?e, days, "failed to retrieve recent articles");
                Vec::new()
            }
        }
    }

    /// Bulk-load hashes into the cache. Only `WarmScope::All` marks the
    /// cache fresh. On error the cache is left untouched.
    pub async fn warm_cache(&mut self, scope: WarmScope) -> bool {
        let filter = match scope {
            WarmScope::All => None,
            WarmScope::RecentDays(days) => Some(Filter::OnOrAfter {
                field: F_COLLECTED.to_string(),
                date: self.since_days(days),
            }),
        };
        let query = Query {
            filter,
            fields: Some(vec![F_HASH.to_string()]),
            ..Default::default()
        };
        match self.table.query(query).await {
            Ok(records) => {
                let hashes = records
                    .iter()
                    .filter_map(|r| r.field_str(F_HASH).map(str::to_string));
                match scope {
                    WarmScope::All => {
                        let now = self.now();
                        self.cache.replace_all(hashes, now);
                    }
                    WarmScope::RecentDays(_) => self.cache.extend(hashes),
                }
                tracing::info!(target: "storage", ?scope, entries = self.cache.len(), "refreshed hash cache");
                true
            }
            Err(e) => {
                tracing::error!(target: "storage", error = ?e, ?scope, "failed to refresh hash cache");
                false
            }
        }
    }

    pub fn cache_is_fresh(&self) -> bool {
        self.cache.is_fresh(self.now())
    }

    pub async fn test_connection(&self) -> bool {
        let query = Query {
            max_records: Some(1),
            ..Default::default()
        };
        match self.table.query(query).await {
            Ok(_) => {
                tracing::info!(target: "storage", backend = self.backend(), "connection test successful");
                true
            }
            Err(e) => {
                tracing::error!(target: "storage", error = ?e, backend = self.backend(), "connection test failed");
                false
            }
        }
    }

    pub async fn stats(&self) -> Option<StoreStats> {
        let all = Query {
            fields: Some(vec![F_HASH.to_string()]),
            ..Default::default()
        };
        let total = match self.table.query(all).await {
            Ok(r) => r.len(),
            Err(e) => {
                tracing::error!(target: "storage", error = ?e, "failed to compute stats");
                return None;
            }
        };

        let recent = self.get_recent_articles(7).await;
        let mut by_source = BTreeMap::new();
        for r in &recent {
            let source = r.field_str(F_SOURCE).unwrap_or("Unknown").to_string();
            *by_source.entry(source).or_insert(0) += 1;
        }

        Some(StoreStats {
            total_articles: total,
            recent_articles_7days: recent.len(),
            articles_by_source: by_source,
            cache_size: self.cache.len(),
            last_cache_refresh: self.cache.last_refreshed(),
        })
    }

    /// Status snapshot, including a live connection test.
    pub async fn status(&self) -> StoreStatus {
        StoreStatus {
            backend: self.backend().to_string(),
            enabled: self.enabled,
            connection: self.test_connection().await,
            timeout_secs: self.timeout_secs,
            cache_size: self.cache.len(),
            cache_fresh: self.cache_is_fresh(),
            cache_ttl_secs: self.cache.ttl_secs(),
            last_cache_refresh: self.cache.last_refreshed(),
        }
    }
}
