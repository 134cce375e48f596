// src/article.rs
//! Canonical article shape shared by every collector.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{clean_text, extract_tags, fingerprint};

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Which collector produced an article. Also the value of the `Collector` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    Reddit,
    Rss,
}

impl CollectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectorKind::Reddit => "reddit",
            CollectorKind::Rss => "rss",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedditExtras {
    pub score: i64,
    pub comments: u64,
    pub upvote_ratio: Option<f64>,
    pub is_self: bool,
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedExtras {
    pub feed_url: String,
    pub guid: Option<String>,
    pub categories: Vec<String>,
}

/// Source-specific fields. The variant decides `Article::collector()`, so the
/// extension fields can never disagree with the collector that built them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "collector", rename_all = "lowercase")]
pub enum Extras {
    Reddit(RedditExtras),
    Rss(FeedExtras),
}

/// Raw fields as a collector read them, before cleaning and hashing.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub content: String,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// Feed categories or post flair.
    pub native_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    title: String,
    url: String,
    source: String,
    content: String,
    published_date: DateTime<Utc>,
    collected_date: DateTime<Utc>,
    author: String,
    tags: BTreeSet<String>,
    hash: String,
    #[serde(flatten)]
    extras: Extras,
}

impl Article {
    /// Build the canonical article. `collected_at` becomes `collected_date` and
    /// the fallback for a missing publication date.
    pub fn normalize(raw: RawArticle, extras: Extras, collected_at: DateTime<Utc>) -> Self {
        let title = clean_text(&raw.title);
        let content = clean_text(&raw.content);
        let author = raw
            .author
            .map(|a| clean_text(&a))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let tags = extract_tags(&raw.native_tags, &title);
        let hash = fingerprint(&title, &raw.url);

        Self {
            title,
            url: raw.url,
            source: raw.source,
            content,
            published_date: raw.published.unwrap_or(collected_at),
            collected_date: collected_at,
            author,
            tags,
            hash,
            extras,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn published_date(&self) -> DateTime<Utc> {
        self.published_date
    }
    pub fn collected_date(&self) -> DateTime<Utc> {
        self.collected_date
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
    pub fn hash(&self) -> &str {
        &self.hash
    }
    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    pub fn collector(&self) -> CollectorKind {
        match self.extras {
            Extras::Reddit(_) => CollectorKind::Reddit,
            Extras::Rss(_) => CollectorKind::Rss,
        }
    }

    pub fn reddit(&self) -> Option<&RedditExtras> {
        match &self.extras {
            Extras::Reddit(r) => Some(r),
            Extras::Rss(_) => None,
        }
    }

    pub fn feed(&self) -> Option<&FeedExtras> {
        match &self.extras {
            Extras::Rss(f) => Some(f),
            Extras::Reddit(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed_extras() -> Extras {
        Extras::Rss(FeedExtras {
            feed_url: "https://example.test/feed".into(),
            guid: None,
            categories: vec![],
        })
    }

    #[test]
    fn normalize_cleans_and_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let raw = RawArticle {
            title: "  Solar   farms\nexpand ".into(),
            url: "https://example.test/a".into(),
            source: "Example".into(),
            content: "line one\n\n line two".into(),
            published: None,
            author: Some("   ".into()),
            native_tags: vec!["Energy".into()],
        };
        let a = Article::normalize(raw, feed_extras(), now);
        assert_eq!(a.title(), "Solar farms expand");
        assert_eq!(a.content(), "line one line two");
        assert_eq!(a.author(), UNKNOWN_AUTHOR);
        assert_eq!(a.published_date(), now);
        assert_eq!(a.collected_date(), now);
        assert_eq!(a.collector(), CollectorKind::Rss);
        assert!(a.reddit().is_none());
        assert!(a.tags().contains("Energy"));
        assert!(a.tags().contains("solar"));
        assert_eq!(a.hash(), fingerprint("Solar farms expand", "https://example.test/a"));
    }

    #[test]
    fn serializes_collector_tag() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let raw = RawArticle {
            title: "t".into(),
            url: "u".into(),
            ..Default::default()
        };
        let a = Article::normalize(raw, feed_extras(), now);
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["collector"], "rss");
        assert_eq!(v["feed_url"], "https://example.test/feed");
    }
}
