// tests/metrics_cycle.rs
#![cfg(feature = "strict-metrics")]
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use info_watchdog::collect::{FeedFetcher, RssCollector};
use info_watchdog::config::{FeedSpec, RssConfig};
use info_watchdog::store::memory::MemoryTable;
use info_watchdog::store::ArticleStore;
use info_watchdog::Watchdog;
use metrics_exporter_prometheus::PrometheusBuilder;

struct Fixture(HashMap<String, String>);

#[async_trait]
impl FeedFetcher for Fixture {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.0.get(url).cloned().ok_or_else(|| anyhow!("unreachable {url}"))
    }
}

#[tokio::test]
async fn metrics_exposed_after_cycle() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("recorder");

    let xml = std::fs::read_to_string("tests/fixtures/env_rss.xml").expect("fixture");
    let mut bodies = HashMap::new();
    bodies.insert("https://good.test/rss".to_string(), xml);
    let rss = RssCollector::new(
        RssConfig {
            feeds: vec![
                FeedSpec {
                    url: "https://good.test/rss".into(),
                    name: None,
                },
                FeedSpec {
                    url: "https://down.test/rss".into(),
                    name: None,
                },
            ],
            ..Default::default()
        },
        Box::new(Fixture(bodies)),
    );

    let mut w = Watchdog::new(
        vec![Box::new(rss)],
        Some(ArticleStore::new(Box::new(MemoryTable::new()), 3600)),
    );
    let report = w.run_cycle().await;
    assert!(report.storage_success);

    let out = handle.render();
    assert!(out.contains("collector_articles_total"));
    assert!(out.contains("collector_source_errors_total"));
    assert!(out.contains("store_inserted_total 2"));
    assert!(out.contains("watchdog_cycle_ms"));
    assert!(out.contains("watchdog_last_cycle_ts"));
}
