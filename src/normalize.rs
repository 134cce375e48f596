// src/normalize.rs
//! Text cleaning, relevance filter, fingerprinting and tag extraction shared by
//! every collector.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

/// A text is relevant when it contains any of these (case-insensitive substring).
pub const RELEVANCE_KEYWORDS: &[&str] = &[
    "climate",
    "environment",
    "sustainability",
    "renewable",
    "carbon",
    "green",
    "eco",
    "pollution",
    "conservation",
    "biodiversity",
    "recycling",
    "solar",
    "wind",
    "emission",
    "energy",
    "water",
    "nature",
    "forest",
    "ocean",
    "earth",
    "warming",
    "change",
    "clean",
    "electric",
    "sustainable",
    "waste",
    "plastic",
    "oil",
    "gas",
    "coal",
    "battery",
];

/// Keywords turned into tags when found in a title.
pub const TAG_KEYWORDS: &[&str] = &[
    "climate",
    "renewable",
    "solar",
    "wind",
    "carbon",
    "emission",
    "sustainability",
    "green",
    "eco",
    "pollution",
    "conservation",
    "biodiversity",
    "recycling",
    "plastic",
    "ocean",
    "forest",
];

/// Collapse whitespace runs (newlines and NBSP included) into one space and trim.
pub fn clean_text(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").unwrap());
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Remove HTML tags and decode entities. Whitespace is left for `clean_text`.
pub fn strip_html(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let without_tags = re_tags.replace_all(s, "");
    html_escape::decode_html_entities(&without_tags).to_string()
}

/// Keep at most `max` chars, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

pub fn is_relevant(text: &str) -> bool {
    let lower = text.to_lowercase();
    RELEVANCE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// 128-bit hex fingerprint of `title ++ url`; the only dedup key.
pub fn fingerprint(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Native categories (kept as given) plus title keyword hits (lowercase).
pub fn extract_tags<S: AsRef<str>>(native: &[S], title: &str) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = native
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let title_lower = title.to_lowercase();
    for kw in TAG_KEYWORDS {
        if title_lower.contains(kw) {
            tags.insert((*kw).to_string());
        }
    }
    tags
}
