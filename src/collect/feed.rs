// src/collect/feed.rs
//! RSS 2.0 / Atom body → flat `FeedEntry` list, plus the date helpers the RSS
//! collector falls back through.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// One entry, with the field names the collector's fallbacks are written against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    /// Structured publication date (RFC 2822 for RSS, RFC 3339 for Atom).
    pub published: Option<String>,
    pub updated: Option<String>,
    /// `dc:date`, free text in practice.
    pub dc_date: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date")]
    dc_date: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    dc_creator: Option<String>,
    #[serde(rename = "category", default)]
    category: Vec<TextNode>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomPerson {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    id: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "author", default)]
    author: Vec<AtomPerson>,
    #[serde(rename = "dc:creator")]
    dc_creator: Option<String>,
    #[serde(rename = "category", default)]
    category: Vec<AtomCategory>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<RssItem> for FeedEntry {
    fn from(it: RssItem) -> Self {
        let description = non_empty(it.description);
        FeedEntry {
            title: non_empty(it.title),
            link: non_empty(it.link),
            id: non_empty(it.guid.map(|g| g.value)),
            // RSS has no separate summary element; description doubles as it.
            summary: description.clone(),
            description,
            content: non_empty(it.content_encoded),
            published: non_empty(it.pub_date),
            updated: None,
            dc_date: non_empty(it.dc_date),
            author: non_empty(it.author),
            creator: non_empty(it.dc_creator),
            categories: it
                .category
                .into_iter()
                .filter_map(|c| non_empty(Some(c.value)))
                .collect(),
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(e: AtomEntry) -> Self {
        let link = e
            .link
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| e.link.first())
            .and_then(|l| l.href.clone());
        FeedEntry {
            title: non_empty(e.title.map(|t| t.value)),
            link: non_empty(link),
            id: non_empty(e.id),
            summary: non_empty(e.summary.map(|s| s.value)),
            description: None,
            content: non_empty(e.content.map(|c| c.value)),
            published: non_empty(e.published),
            updated: non_empty(e.updated),
            dc_date: None,
            author: non_empty(e.author.into_iter().find_map(|a| non_empty(a.name))),
            creator: non_empty(e.dc_creator),
            categories: e
                .category
                .into_iter()
                .filter_map(|c| non_empty(c.term))
                .collect(),
        }
    }
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>> {
    let xml = scrub_html_entities_for_xml(body);
    let rss_err = match from_str::<Rss>(&xml) {
        Ok(rss) => return Ok(rss.channel.item.into_iter().map(FeedEntry::from).collect()),
        Err(e) => e,
    };
    match from_str::<AtomFeed>(&xml) {
        Ok(feed) if looks_like_atom(&xml) => {
            Ok(feed.entry.into_iter().map(FeedEntry::from).collect())
        }
        Ok(_) => Err(anyhow!("parsing feed xml: not RSS ({rss_err}) nor Atom")),
        Err(atom_err) => Err(anyhow!(
            "parsing feed xml: not RSS ({rss_err}) nor Atom ({atom_err})"
        )),
    }
}

fn looks_like_atom(xml: &str) -> bool {
    xml.contains("<feed")
}

/// Replace HTML-only entities that XML parsers reject.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

pub fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| Utc.timestamp_opt(dt.unix_timestamp(), 0).single())
}

pub fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Lenient parser for the date strings feeds actually carry.
pub fn parse_free_text_date(ts: &str) -> Option<DateTime<Utc>> {
    let s = ts.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = parse_rfc2822(s).or_else(|| parse_rfc3339(s)) {
        return Some(d);
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return Some(d.with_timezone(&Utc));
    }

    const WITH_TZ: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S%z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
    ];
    for f in WITH_TZ {
        if let Ok(d) = DateTime::parse_from_str(s, f) {
            return Some(d.with_timezone(&Utc));
        }
    }

    const NAIVE: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for f in NAIVE {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, f) {
            return Some(d.and_utc());
        }
    }

    const DATE_ONLY: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];
    for f in DATE_ONLY {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_and_rfc3339() {
        let a = parse_rfc2822("Tue, 10 Jun 2025 14:30:00 +0200").unwrap();
        assert_eq!(a.to_rfc3339(), "2025-06-10T12:30:00+00:00");
        let b = parse_rfc3339("2025-06-10T12:30:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn free_text_formats() {
        assert_eq!(
            parse_free_text_date("2025-06-10").unwrap().to_rfc3339(),
            "2025-06-10T00:00:00+00:00"
        );
        assert_eq!(
            parse_free_text_date("June 10, 2025").unwrap().to_rfc3339(),
            "2025-06-10T00:00:00+00:00"
        );
        assert_eq!(
            parse_free_text_date("2025-06-10 08:15:00").unwrap().to_rfc3339(),
            "2025-06-10T08:15:00+00:00"
        );
        assert!(parse_free_text_date("yesterday-ish").is_none());
    }

    #[test]
    fn parses_minimal_rss() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>T</title>
    <item>
      <title>Ocean warming&nbsp;report</title>
      <link>https://x.test/1</link>
      <description>&lt;p&gt;Summary&lt;/p&gt;</description>
      <pubDate>Tue, 10 Jun 2025 14:30:00 +0000</pubDate>
      <dc:creator>Jane</dc:creator>
      <category>Science</category>
      <category domain="x">Oceans</category>
    </item>
  </channel>
</rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.title.as_deref(), Some("Ocean warming report"));
        assert_eq!(e.summary.as_deref(), Some("<p>Summary</p>"));
        assert_eq!(e.creator.as_deref(), Some("Jane"));
        assert_eq!(e.categories, vec!["Science", "Oceans"]);
    }

    #[test]
    fn parses_minimal_atom() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>A</title>
  <entry>
    <title type="html">Forest carbon</title>
    <link rel="alternate" href="https://x.test/a"/>
    <id>urn:1</id>
    <updated>2025-06-10T12:00:00Z</updated>
    <summary>Trees</summary>
    <author><name>Sam</name></author>
    <category term="Forests"/>
  </entry>
</feed>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.link.as_deref(), Some("https://x.test/a"));
        assert_eq!(e.author.as_deref(), Some("Sam"));
        assert_eq!(e.updated.as_deref(), Some("2025-06-10T12:00:00Z"));
        assert_eq!(e.categories, vec!["Forests"]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("this is not xml").is_err());
        assert!(parse_feed("<html><body>nope</body></html>").is_err());
    }
}
