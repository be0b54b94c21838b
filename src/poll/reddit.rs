// src/poll/reddit.rs
//! Reddit OAuth (client credentials) + `/r/{sub}/new` listings.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::scrape::{ScrapeClient, ScrapeError, ScrapedItem};
use crate::ingest::{normalize_text, ContentItem, ContentType, Platform};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const WEB_BASE: &str = "https://www.reddit.com";

pub struct RedditClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    base_url: String,
    token: Mutex<Option<(String, Instant)>>,
}

#[derive(Deserialize)]
struct TokenResp {
    access_token: String,
    #[serde(default = "default_ttl")]
    expires_in: u64,
}

fn default_ttl() -> u64 {
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
    data: Post,
}

#[derive(Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    created_utc: f64,
    #[serde(default)]
    author: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
}

impl RedditClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScrapeError::Http(e.to_string()))?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: AUTH_URL.to_string(),
            base_url: API_BASE.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ScrapeError> {
        let mut guard = self.token.lock().await;
        if let Some((tok, expires)) = guard.as_ref() {
            if Instant::now() < *expires {
                return Ok(tok.clone());
            }
        }
        let resp = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ScrapeError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ScrapeError::Auth(format!("{status}: {}", body.chars().take(200).collect::<String>())));
        }
        let tr: TokenResp = serde_json::from_str(&body).map_err(|e| ScrapeError::Decode(e.to_string()))?;
        // refresh a minute early
        let ttl = Duration::from_secs(tr.expires_in.saturating_sub(60).max(60));
        *guard = Some((tr.access_token.clone(), Instant::now() + ttl));
        Ok(tr.access_token)
    }
}

/// Reddit ids are base36 strings.
pub fn reddit_id_to_u64(id: &str) -> Option<u64> {
    let id = id.trim().trim_start_matches("t3_");
    u64::from_str_radix(&id.to_ascii_lowercase(), 36).ok()
}

/// `Title: ...` plus `Body:` when the post has text.
pub fn compose_body(title: &str, selftext: &str) -> String {
    let mut body = format!("Title: {}", title.trim());
    if !selftext.trim().is_empty() {
        body.push_str("\n\nBody:\n");
        body.push_str(selftext.trim());
    }
    normalize_text(&body)
}

fn to_item(p: Post) -> Option<ScrapedItem> {
    let id = reddit_id_to_u64(&p.id)?;
    let secs = p.created_utc.trunc() as i64;
    let created_at = DateTime::<Utc>::from_timestamp(secs, 0)?.fixed_offset();
    let metrics: BTreeMap<String, u64> = [
        ("score".to_string(), p.score.max(0) as u64),
        ("num_comments".to_string(), p.num_comments),
    ]
    .into_iter()
    .collect();
    Some(ScrapedItem {
        id,
        item: ContentItem {
            url: format!("{WEB_BASE}{}", p.permalink),
            body: compose_body(&p.title, &p.selftext),
            conversation_id: p.id.clone(),
            source_id: p.id,
            platform: Platform::Reddit,
            content_type: ContentType::Post,
            created_at,
            metrics,
            author_display_name: p.author.clone(),
            author: p.author,
            subreddit: p.subreddit,
            source_rows: 1,
        },
    })
}

#[async_trait]
impl ScrapeClient for RedditClient {
    async fn fetch_recent(&self, source: &str, since_id: u64, limit: usize) -> Result<Vec<ScrapedItem>, ScrapeError> {
        let token = self.access_token().await?;
        let url = format!("{}/r/{}/new", self.base_url, source);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit.clamp(1, 100).to_string()), ("raw_json", "1".to_string())])
            .send()
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ScrapeError::Http(e.to_string()))?;
        if status.as_u16() == 404 {
            return Err(ScrapeError::NotFound(source.to_string()));
        }
        if !status.is_success() {
            return Err(ScrapeError::from_status(status, &body));
        }
        let listing: Listing = serde_json::from_str(&body).map_err(|e| ScrapeError::Decode(e.to_string()))?;
        let items: Vec<ScrapedItem> = listing
            .data
            .children
            .into_iter()
            .filter_map(|c| to_item(c.data))
            .filter(|s| s.id > since_id)
            .collect();
        debug!(target: "poll", source, fetched = items.len(), "listing fetched");
        Ok(items)
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_ids_order_like_their_age() {
        assert_eq!(reddit_id_to_u64("z"), Some(35));
        assert_eq!(reddit_id_to_u64("t3_10"), Some(36));
        assert!(reddit_id_to_u64("1abcde").unwrap() < reddit_id_to_u64("1abcdf").unwrap());
        assert_eq!(reddit_id_to_u64("not-an-id"), None);
    }

    #[test]
    fn body_has_title_and_optional_text() {
        assert_eq!(compose_body("Hello", ""), "Title: Hello");
        assert_eq!(compose_body("Q &amp; A", " details \n"), "Title: Q & A\n\nBody:\ndetails");
    }

    #[test]
    fn listing_json_maps_to_posts() {
        let raw = r#"{"data":{"children":[{"data":{"id":"1cq2xyz","title":"Rust in prod","selftext":"",
            "permalink":"/r/rust/comments/1cq2xyz/rust_in_prod/","created_utc":1714557600.0,
            "author":"ferris","subreddit":"rust","score":42,"num_comments":7}}]}}"#;
        let l: Listing = serde_json::from_str(raw).unwrap();
        let items: Vec<ScrapedItem> = l.data.children.into_iter().filter_map(|c| to_item(c.data)).collect();
        assert_eq!(items.len(), 1);
        let it = &items[0].item;
        assert_eq!(it.url, "https://www.reddit.com/r/rust/comments/1cq2xyz/rust_in_prod/");
        assert_eq!(it.metric("score"), 42);
        assert_eq!(it.content_type, ContentType::Post);
        assert_eq!(it.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
