// src/store/record.rs
//! Article → remote column mapping.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::article::Article;
use crate::normalize::truncate_chars;

pub const F_TITLE: &str = "Title";
pub const F_URL: &str = "URL";
pub const F_SOURCE: &str = "Source";
pub const F_CONTENT: &str = "Content";
pub const F_AUTHOR: &str = "Author";
pub const F_COLLECTOR: &str = "Collector";
pub const F_HASH: &str = "Hash";
pub const F_TAGS: &str = "Tags";
pub const F_PUBLISHED: &str = "Published_Date";
pub const F_COLLECTED: &str = "Collected_Date";
pub const F_REDDIT_SCORE: &str = "Reddit_Score";
pub const F_REDDIT_COMMENTS: &str = "Reddit_Comments";
pub const F_SUBREDDIT: &str = "Subreddit";

const MAX_TITLE: usize = 500;
const MAX_CONTENT: usize = 1000;

/// Column name → value, as sent to the remote table.
pub type Fields = Map<String, Value>;

/// Day precision only; time of day is dropped in the persisted form.
pub fn format_date(d: DateTime<Utc>) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn put_str(fields: &mut Fields, key: &str, value: &str) {
    if !value.is_empty() {
        fields.insert(key.to_string(), Value::String(value.to_string()));
    }
}

pub fn to_fields(article: &Article) -> Fields {
    let mut f = Fields::new();
    put_str(&mut f, F_TITLE, &truncate_chars(article.title(), MAX_TITLE));
    put_str(&mut f, F_URL, article.url());
    put_str(&mut f, F_SOURCE, article.source());
    put_str(&mut f, F_CONTENT, &truncate_chars(article.content(), MAX_CONTENT));
    put_str(&mut f, F_AUTHOR, article.author());
    put_str(&mut f, F_COLLECTOR, article.collector().as_str());
    put_str(&mut f, F_HASH, article.hash());

    let tags: Vec<&str> = article.tags().iter().map(String::as_str).collect();
    put_str(&mut f, F_TAGS, &tags.join(", "));

    put_str(&mut f, F_PUBLISHED, &format_date(article.published_date()));
    put_str(&mut f, F_COLLECTED, &format_date(article.collected_date()));

    if let Some(r) = article.reddit() {
        f.insert(F_REDDIT_SCORE.to_string(), Value::from(r.score));
        f.insert(F_REDDIT_COMMENTS.to_string(), Value::from(r.comments));
        put_str(&mut f, F_SUBREDDIT, &r.subreddit);
    }
    f
}
