// src/poll/twitter.rs
//! Twitter API v2: user lookup + user timeline, bearer token auth.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::scrape::{ScrapeClient, ScrapeError, ScrapedItem};
use crate::ingest::{normalize_text, ContentItem, ContentType, Platform};

const API_BASE: &str = "https://api.twitter.com/2";

pub struct TwitterClient {
    http: Client,
    bearer: String,
    base_url: String,
    /// username → (user id, display name)
    users: Mutex<HashMap<String, (String, String)>>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    data: Option<User>,
}

#[derive(Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct TimelineEnvelope {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    referenced_tweets: Vec<Reference>,
}

#[derive(Deserialize, Default)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    quote_count: u64,
    #[serde(default)]
    bookmark_count: u64,
    #[serde(default)]
    impression_count: u64,
}

#[derive(Deserialize)]
struct Reference {
    #[serde(rename = "type")]
    kind: String,
}

impl TwitterClient {
    pub fn new(bearer: impl Into<String>) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .user_agent(concat!("content-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScrapeError::Http(e.to_string()))?;
        Ok(Self {
            http,
            bearer: bearer.into(),
            base_url: API_BASE.to_string(),
            users: Mutex::new(HashMap::new()),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ScrapeError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.bearer)
            .query(query)
            .send()
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ScrapeError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ScrapeError::from_status(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ScrapeError::Decode(e.to_string()))
    }

    async fn user(&self, username: &str) -> Result<(String, String), ScrapeError> {
        if let Some(u) = self.users.lock().await.get(username) {
            return Ok(u.clone());
        }
        let url = format!("{}/users/by/username/{}", self.base_url, username);
        let env: UserEnvelope = self.get_json(&url, &[("user.fields", "name".to_string())]).await?;
        let user = env.data.ok_or_else(|| ScrapeError::NotFound(username.to_string()))?;
        let entry = (user.id, user.name);
        self.users.lock().await.insert(username.to_string(), entry.clone());
        Ok(entry)
    }
}

fn tweet_type(refs: &[Reference]) -> ContentType {
    let has = |k: &str| refs.iter().any(|r| r.kind == k);
    if has("retweeted") {
        ContentType::Retweet
    } else if has("quoted") {
        ContentType::Quote
    } else if has("replied_to") {
        ContentType::Reply
    } else {
        ContentType::OriginalTweet
    }
}

fn to_item(username: &str, display_name: &str, t: Tweet) -> Option<ScrapedItem> {
    let id: u64 = t.id.parse().ok()?;
    let m = t.public_metrics.unwrap_or_default();
    let metrics: BTreeMap<String, u64> = [
        ("likes", m.like_count),
        ("retweets", m.retweet_count),
        ("replies", m.reply_count),
        ("quotes", m.quote_count),
        ("bookmarks", m.bookmark_count),
        ("views", m.impression_count),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Some(ScrapedItem {
        id,
        item: ContentItem {
            url: format!("https://x.com/{username}/status/{}", t.id),
            source_id: t.id,
            platform: Platform::Twitter,
            content_type: tweet_type(&t.referenced_tweets),
            body: normalize_text(&t.text),
            created_at: t.created_at.fixed_offset(),
            metrics,
            author: username.to_string(),
            author_display_name: display_name.to_string(),
            conversation_id: t.conversation_id.unwrap_or_default(),
            subreddit: String::new(),
            source_rows: 1,
        },
    })
}

#[async_trait]
impl ScrapeClient for TwitterClient {
    async fn fetch_recent(&self, source: &str, since_id: u64, limit: usize) -> Result<Vec<ScrapedItem>, ScrapeError> {
        let (user_id, display_name) = self.user(source).await?;
        let url = format!("{}/users/{}/tweets", self.base_url, user_id);
        let mut query = vec![
            ("max_results", limit.clamp(5, 100).to_string()),
            (
                "tweet.fields",
                "created_at,public_metrics,conversation_id,referenced_tweets".to_string(),
            ),
        ];
        if since_id > 0 {
            query.push(("since_id", since_id.to_string()));
        }
        let env: TimelineEnvelope = self.get_json(&url, &query).await?;
        let items: Vec<ScrapedItem> = env
            .data
            .into_iter()
            .filter_map(|t| to_item(source, &display_name, t))
            .take(limit)
            .collect();
        debug!(target: "poll", source, fetched = items.len(), "timeline fetched");
        Ok(items)
    }

    fn platform(&self) -> Platform {
        Platform::Twitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_json_maps_to_items() {
        let raw = r#"{"data":[
            {"id":"1790000000000000002","text":"Shipping a tokio release &amp; notes","created_at":"2024-05-01T10:00:00.000Z",
             "conversation_id":"1790000000000000002",
             "public_metrics":{"like_count":12,"retweet_count":3,"reply_count":1,"quote_count":0,"bookmark_count":2,"impression_count":900}},
            {"id":"1790000000000000003","text":"RT @x: hi","created_at":"2024-05-01T10:05:00.000Z",
             "referenced_tweets":[{"type":"retweeted","id":"1"}]}
        ]}"#;
        let env: TimelineEnvelope = serde_json::from_str(raw).unwrap();
        let items: Vec<ScrapedItem> = env.data.into_iter().filter_map(|t| to_item("alice", "Alice", t)).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1_790_000_000_000_000_002);
        assert_eq!(items[0].item.url, "https://x.com/alice/status/1790000000000000002");
        assert_eq!(items[0].item.body, "Shipping a tokio release & notes");
        assert_eq!(items[0].item.metric("views"), 900);
        assert_eq!(items[0].item.content_type, ContentType::OriginalTweet);
        assert_eq!(items[1].item.content_type, ContentType::Retweet);
    }
}
