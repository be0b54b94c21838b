// src/ingest/types.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Twitter => "twitter",
        }
    }

    /// Content types that are worth rewriting for this platform.
    pub fn default_allowed_types(&self) -> Vec<ContentType> {
        match self {
            Platform::Reddit => vec![ContentType::Post],
            Platform::Twitter => vec![ContentType::OriginalTweet, ContentType::Thread],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Reply,
    Retweet,
    Quote,
    Thread,
    OriginalTweet,
}

impl ContentType {
    /// Label written to the spreadsheet ("Content Type" / "Tweet Type" columns).
    pub fn sheet_label(&self) -> &'static str {
        match self {
            ContentType::Post => "Reddit Post",
            ContentType::Reply => "Reply",
            ContentType::Retweet => "Retweet",
            ContentType::Quote => "Quote Tweet",
            ContentType::Thread => "Thread",
            ContentType::OriginalTweet => "Original Tweet",
        }
    }

    /// Accepts both sheet labels and snake_case names.
    pub fn from_label(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "reddit_post" | "post" => Some(ContentType::Post),
            "reply" => Some(ContentType::Reply),
            "retweet" => Some(ContentType::Retweet),
            "quote_tweet" | "quote" => Some(ContentType::Quote),
            "thread" => Some(ContentType::Thread),
            "original_tweet" | "tweet" => Some(ContentType::OriginalTweet),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_label())
    }
}

/// One scraped unit (a post, a tweet, or a consolidated thread).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub source_id: String,
    /// Canonical URL; the dedup key.
    pub url: String,
    pub platform: Platform,
    pub content_type: ContentType,
    pub body: String,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub metrics: BTreeMap<String, u64>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_display_name: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub subreddit: String,
    /// Raw rows folded into this item (1 unless it is a thread).
    #[serde(default = "one")]
    pub source_rows: u32,
}

fn one() -> u32 {
    1
}

impl ContentItem {
    pub fn metric(&self, name: &str) -> u64 {
        self.metrics.get(name).copied().unwrap_or(0)
    }
}
