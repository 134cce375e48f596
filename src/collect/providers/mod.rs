// src/collect/providers/mod.rs
pub mod http_feed;
pub mod reddit_api;

pub use http_feed::HttpFeedFetcher;
pub use reddit_api::RedditApiClient;
