// src/collect/providers/reddit_api.rs
//! Application-only OAuth client for subreddit listings.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::collect::reddit::{ListingQuery, RawPost, RedditSource};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires")]
    expires_in: u64,
}

fn default_expires() -> u64 {
    3600
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    data: RawPost,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditApiClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditApiClient {
    pub fn new(client_id: &str, client_secret: &str, user_agent: &str) -> Result<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            bail!("Reddit client id and secret are required");
        }
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building reddit http client")?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        let rsp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token request")?
            .error_for_status()
            .context("reddit token status")?;
        rsp.json::<TokenResponse>()
            .await
            .context("reddit token body")
    }

    /// Cached bearer token, refreshed a minute before expiry.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(t) = guard.as_ref() {
            if Instant::now() < t.expires_at {
                return Ok(t.value.clone());
            }
        }
        let fresh = self.request_token().await?;
        let ttl = Duration::from_secs(fresh.expires_in.saturating_sub(60));
        let value = fresh.access_token;
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }
}

#[async_trait]
impl RedditSource for RedditApiClient {
    async fn fetch_listing(&self, subreddit: &str, query: &ListingQuery) -> Result<Vec<RawPost>> {
        let token = self.access_token().await?;
        let url = format!("{API_BASE}/r/{subreddit}/{}", query.sort.as_str());

        let mut params: Vec<(&str, String)> = vec![
            ("limit", query.limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(t) = &query.time_filter {
            params.push(("t", t.clone()));
        }

        let rsp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("reddit listing r/{subreddit}"))?
            .error_for_status()
            .with_context(|| format!("reddit listing status r/{subreddit}"))?;
        let listing: Listing = rsp.json().await.context("reddit listing body")?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    async fn verify(&self) -> Result<()> {
        self.access_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_credentials() {
        assert!(RedditApiClient::new("", "s", "ua").is_err());
        assert!(RedditApiClient::new("id", "s", "ua").is_ok());
    }

    #[test]
    fn listing_json_deserializes() {
        let json = r#"{"kind":"Listing","data":{"children":[
            {"kind":"t3","data":{"title":"Solar","url":"https://x","permalink":"/r/a/1",
             "created_utc":1700000000.0,"author":"bob","score":5,"num_comments":2,
             "upvote_ratio":0.8,"is_self":false,"stickied":false,"removed_by_category":null,
             "link_flair_text":"News","selftext":""}}]}}"#;
        let l: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(l.data.children.len(), 1);
        assert_eq!(l.data.children[0].data.num_comments, 2);
    }
}
