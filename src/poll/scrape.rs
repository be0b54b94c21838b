// src/poll/scrape.rs
use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::{ContentItem, Platform};

/// A fetched item plus its numeric id, used for cursor comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedItem {
    pub id: u64,
    pub item: ContentItem,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("source {0:?} not found")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited")]
    RateLimited,
    #[error("network error: {0}")]
    Http(String),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ScrapeError {
    pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message: String = body.chars().take(200).collect();
        match status.as_u16() {
            401 | 403 => ScrapeError::Auth(message),
            429 => ScrapeError::RateLimited,
            code => ScrapeError::Api { status: code, message },
        }
    }
}

/// Source of recent posts for one platform. Sessions and credentials stay
/// inside the implementation.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    /// Up to `limit` of the newest items of `source` with id greater than
    /// `since_id` (0 = no lower bound). Order is unspecified.
    async fn fetch_recent(&self, source: &str, since_id: u64, limit: usize) -> Result<Vec<ScrapedItem>, ScrapeError>;

    fn platform(&self) -> Platform;
}
