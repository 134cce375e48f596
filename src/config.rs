// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "INFOWATCHDOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

fn default_true() -> bool {
    true
}
fn default_subreddits() -> Vec<String> {
    vec!["environment".to_string()]
}
fn default_limit() -> u32 {
    50
}
fn default_sort_type() -> String {
    "hot".to_string()
}
fn default_time_filter() -> String {
    "day".to_string()
}
fn default_feed_timeout() -> u64 {
    30
}
fn default_feed_user_agent() -> String {
    "InfoWatchdog RSS Collector/1.0".to_string()
}
fn default_storage_type() -> String {
    "airtable".to_string()
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_storage_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub rss: RssConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// "hot" | "new" | "top" | "rising"; anything else falls back to hot.
    #[serde(default = "default_sort_type")]
    pub sort_type: String,
    /// Only used with `sort_type = "top"`.
    #[serde(default = "default_time_filter")]
    pub time_filter: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subreddits: default_subreddits(),
            limit: default_limit(),
            sort_type: default_sort_type(),
            time_filter: default_time_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    /// Display name; the url when absent.
    #[serde(default)]
    pub name: Option<String>,
}

impl FeedSpec {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub feeds: Vec<FeedSpec>,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_feed_user_agent")]
    pub user_agent: String,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feeds: Vec::new(),
            timeout_secs: default_feed_timeout(),
            user_agent: default_feed_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "airtable" | "memory"
    #[serde(rename = "type", default = "default_storage_type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Bulk-load hashes before each cycle while the cache is stale.
    #[serde(default)]
    pub warm_cache: bool,
    /// Limit the warm-up to hashes collected in the last N days. Such a
    /// partial load never makes the cache fresh; omit it to load the whole table.
    #[serde(default)]
    pub warm_cache_days: Option<u32>,
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: default_storage_type(),
            enabled: true,
            cache_ttl_secs: default_cache_ttl(),
            warm_cache: false,
            warm_cache_days: None,
            timeout_secs: default_storage_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing config toml")?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Resolve the config path: explicit path, then $INFOWATCHDOG_CONFIG, then
    /// `config/config.toml`. A missing default file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::warn!(
            target: "watchdog",
            path = DEFAULT_CONFIG_PATH,
            "config file not found, using defaults"
        );
        Ok(Self::default())
    }
}

pub const DEFAULT_REDDIT_USER_AGENT: &str = "InfoWatchdog/1.0";
pub const DEFAULT_AIRTABLE_TABLE: &str = "Environmental_News";

/// Credentials supplied by the process environment. Only the binary calls
/// `from_env`; core components receive the values.
#[derive(Clone)]
pub struct Secrets {
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: String,
    pub airtable_api_key: Option<String>,
    pub airtable_base_id: Option<String>,
    pub airtable_table_name: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("reddit_client_id", &self.reddit_client_id.is_some())
            .field("reddit_client_secret", &self.reddit_client_secret.is_some())
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("airtable_api_key", &self.airtable_api_key.is_some())
            .field("airtable_base_id", &self.airtable_base_id.is_some())
            .field("airtable_table_name", &self.airtable_table_name)
            .finish()
    }
}

impl Default for Secrets {
    fn default() -> Self {
        Self {
            reddit_client_id: None,
            reddit_client_secret: None,
            reddit_user_agent: DEFAULT_REDDIT_USER_AGENT.to_string(),
            airtable_api_key: None,
            airtable_base_id: None,
            airtable_table_name: DEFAULT_AIRTABLE_TABLE.to_string(),
        }
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }
        Self {
            reddit_client_id: var("REDDIT_CLIENT_ID"),
            reddit_client_secret: var("REDDIT_CLIENT_SECRET"),
            reddit_user_agent: var("REDDIT_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_REDDIT_USER_AGENT.to_string()),
            airtable_api_key: var("AIRTABLE_API_KEY"),
            airtable_base_id: var("AIRTABLE_BASE_ID"),
            airtable_table_name: var("AIRTABLE_TABLE_NAME")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_TABLE.to_string()),
        }
    }
}
