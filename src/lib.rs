// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod collect;
pub mod config;
pub mod normalize;
pub mod store;
pub mod telemetry;
pub mod watchdog;

// ---- Re-exports for stable public API ----
pub use crate::article::{Article, CollectorKind, Extras, RawArticle};
pub use crate::collect::{Collector, CollectorStatus};
pub use crate::config::{AppConfig, Secrets};
pub use crate::store::{ArticleStore, RemoteTable, StoreOutcome};
pub use crate::watchdog::{RunReport, SystemStats, Watchdog};
