// src/store/cache.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;

/// Answer of a local cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// Known to exist remotely.
    Present,
    /// Not in a fresh cache: trusted as new.
    Absent,
    /// Not in the cache and the cache is stale or never warmed: ask the remote.
    Unknown,
}

/// Time-windowed set of hashes believed to exist remotely.
/// - A present hash stays present: the agent never deletes records.
/// - A missing hash is only trusted while the cache is fresh, i.e. within `ttl`
///   of the last bulk warm-up. Incremental inserts do not refresh it.
#[derive(Debug, Clone)]
pub struct DedupCache {
    ttl: ChronoDuration,
    hashes: HashSet<String>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl DedupCache {
    /// `ttl_secs` < 0 is treated as 0 (never fresh); values past chrono's
    /// range saturate to `TimeDelta::MAX`.
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: ChronoDuration::try_seconds(ttl_secs.max(0)).unwrap_or(ChronoDuration::MAX),
            hashes: HashSet::new(),
            last_refreshed: None,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed {
            None => false,
            Some(ts) => now.signed_duration_since(ts) < self.ttl,
        }
    }

    /// Does NOT mutate state.
    pub fn lookup(&self, hash: &str, now: DateTime<Utc>) -> CacheLookup {
        if self.hashes.contains(hash) {
            CacheLookup::Present
        } else if self.is_fresh(now) {
            CacheLookup::Absent
        } else {
            CacheLookup::Unknown
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Record a hash seen remotely or just inserted.
    pub fn insert(&mut self, hash: impl Into<String>) {
        self.hashes.insert(hash.into());
    }

    /// Add hashes from a partial snapshot. Freshness is untouched: hashes
    /// outside the snapshot are still unknown.
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, hashes: I) {
        self.hashes
            .extend(hashes.into_iter().filter(|h| !h.is_empty()));
    }

    /// Replace the set with a snapshot of the whole table and mark the cache
    /// fresh at `now`.
    pub fn replace_all<I: IntoIterator<Item = String>>(&mut self, hashes: I, now: DateTime<Utc>) {
        self.hashes = hashes.into_iter().filter(|h| !h.is_empty()).collect();
        self.last_refreshed = Some(now);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn never_warmed_is_unknown() {
        let c = DedupCache::new(3600);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        assert_eq!(c.lookup("h", now), CacheLookup::Unknown);
    }

    #[test]
    fn fresh_absent_then_stale_unknown() {
        let mut c = DedupCache::new(3600);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        c.replace_all(vec!["a".to_string()], t0);
        assert_eq!(c.lookup("a", t0), CacheLookup::Present);
        assert_eq!(c.lookup("b", t0), CacheLookup::Absent);

        let boundary = t0 + ChronoDuration::seconds(3600);
        assert_eq!(c.lookup("b", boundary), CacheLookup::Unknown);
        assert_eq!(c.lookup("a", boundary), CacheLookup::Present);
    }

    #[test]
    fn huge_ttl_saturates() {
        let mut c = DedupCache::new(i64::MAX);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        c.replace_all(Vec::new(), t0);
        assert!(c.is_fresh(t0 + ChronoDuration::days(365 * 100)));
        assert!(c.ttl_secs() > 0);
    }

    #[test]
    fn extend_keeps_cache_stale() {
        let mut c = DedupCache::new(3600);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        c.extend(vec!["a".to_string(), String::new()]);
        assert_eq!(c.len(), 1);
        assert_eq!(c.lookup("a", now), CacheLookup::Present);
        assert_eq!(c.lookup("b", now), CacheLookup::Unknown);
    }

    #[test]
    fn insert_does_not_refresh() {
        let mut c = DedupCache::new(3600);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        c.insert("x");
        assert!(!c.is_fresh(now));
        assert_eq!(c.lookup("x", now), CacheLookup::Present);
        assert_eq!(c.len(), 1);
    }
}
