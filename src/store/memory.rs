// src/store/memory.rs
//! In-process table. Backs `type = "memory"` dry runs and the test suite.
//! Clones share the same rows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::record::Fields;
use super::{Direction, Filter, Query, RemoteTable, StoredRecord};

#[derive(Clone, Default)]
pub struct MemoryTable {
    rows: Arc<RwLock<Vec<StoredRecord>>>,
    next_id: Arc<AtomicUsize>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with existing rows.
    pub fn with_rows(rows: Vec<Fields>) -> Self {
        let table = Self::new();
        let records = rows
            .into_iter()
            .map(|fields| StoredRecord {
                id: table.next_record_id(),
                fields,
            })
            .collect();
        Self {
            rows: Arc::new(RwLock::new(records)),
            ..table
        }
    }

    fn next_record_id(&self) -> String {
        format!("mem{:06}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<StoredRecord> {
        self.rows.read().await.clone()
    }
}

fn date_field(r: &StoredRecord, field: &str) -> Option<NaiveDate> {
    r.field_str(field)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn matches(r: &StoredRecord, filter: &Filter) -> bool {
    match filter {
        Filter::OnOrAfter { field, date } => date_field(r, field).is_some_and(|d| d >= *date),
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn insert(&self, fields: Fields) -> Result<String> {
        let id = self.next_record_id();
        self.rows.write().await.push(StoredRecord {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<StoredRecord>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.field_str(field) == Some(value))
            .cloned()
            .collect())
    }

    async fn query(&self, query: Query) -> Result<Vec<StoredRecord>> {
        let rows = self.rows.read().await;
        let mut out: Vec<StoredRecord> = rows
            .iter()
            .filter(|r| query.filter.as_ref().map_or(true, |f| matches(r, f)))
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            // YYYY-MM-DD and plain strings both order correctly as text.
            out.sort_by(|a, b| {
                let ka = a.field_str(&sort.field).unwrap_or_default();
                let kb = b.field_str(&sort.field).unwrap_or_default();
                match sort.direction {
                    Direction::Asc => ka.cmp(kb),
                    Direction::Desc => kb.cmp(ka),
                }
            });
        }

        if let Some(cols) = &query.fields {
            for r in &mut out {
                r.fields.retain(|k, _| cols.iter().any(|c| c == k));
            }
        }

        if let Some(max) = query.max_records {
            out.truncate(max);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Sort;
    use serde_json::json;

    fn row(hash: &str, day: &str) -> Fields {
        json!({ "Hash": hash, "Collected_Date": day })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn query_filters_sorts_and_projects() {
        let t = MemoryTable::with_rows(vec![
            row("a", "2025-01-01"),
            row("b", "2025-01-05"),
            row("c", "2025-01-03"),
        ]);
        let q = Query {
            filter: Some(Filter::OnOrAfter {
                field: "Collected_Date".into(),
                date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            }),
            sort: Some(Sort {
                field: "Collected_Date".into(),
                direction: Direction::Desc,
            }),
            fields: Some(vec!["Hash".into()]),
            max_records: None,
        };
        let out = t.query(q).await.unwrap();
        let hashes: Vec<_> = out.iter().map(|r| r.field_str("Hash").unwrap()).collect();
        assert_eq!(hashes, vec!["b", "c"]);
        assert!(out.iter().all(|r| !r.fields.contains_key("Collected_Date")));
    }

    #[tokio::test]
    async fn find_by_field_matches_exactly() {
        let t = MemoryTable::new();
        t.insert(row("h1", "2025-01-01")).await.unwrap();
        assert_eq!(t.find_by_field("Hash", "h1").await.unwrap().len(), 1);
        assert!(t.find_by_field("Hash", "h2").await.unwrap().is_empty());
        assert_eq!(t.len().await, 1);
    }

    #[tokio::test]
    async fn len_waits_for_a_held_lock() {
        let t = MemoryTable::with_rows(vec![row("a", "2025-01-01")]);
        let guard = t.rows.write().await;
        let reader = t.clone();
        let pending = tokio::spawn(async move { reader.len().await });
        tokio::task::yield_now().await;
        drop(guard);
        assert_eq!(pending.await.unwrap(), 1);
        assert!(!t.is_empty().await);
    }
}
