//! Rewritten records: what the local store persists and what the target sheet receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::ContentItem;

/// Column holding the dedup key in the target sheet.
pub const URL_COLUMN: &str = "First Tweet URL";

/// Header of the analyzed (target) sheet.
pub const TARGET_COLUMNS: [&str; 24] = [
    "Processed Timestamp",
    "Status",
    "Platform",
    "Source ID",
    "Original Username",
    "Original Display Name",
    "First Tweet Timestamp",
    "Combined Original Text",
    URL_COLUMN,
    "Content Type",
    "Conversation ID",
    "Source Row Count",
    "Likes",
    "Retweets",
    "Replies",
    "Quotes",
    "Bookmarks",
    "Views",
    "Subreddit",
    "Score",
    "Num Comments",
    "Rewritten EN",
    "Rewritten RU",
    "Rewrite Error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    RewriteFailed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::RewriteFailed => "rewrite_failed",
        }
    }
}

/// A content item plus both rewrites. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedRecord {
    #[serde(flatten)]
    pub item: ContentItem,
    /// Empty when the English call failed.
    pub rewritten_en: String,
    /// Empty when the Russian call failed.
    pub rewritten_ru: String,
    pub processed_at: DateTime<Utc>,
    pub status: RecordStatus,
    /// First failure message, if any language failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessedRecord {
    pub fn url(&self) -> &str {
        &self.item.url
    }

    /// Row for the target sheet, in `TARGET_COLUMNS` order.
    pub fn to_sheet_row(&self) -> Vec<String> {
        let it = &self.item;
        vec![
            self.processed_at.to_rfc3339(),
            self.status.as_str().to_string(),
            it.platform.as_str().to_string(),
            it.source_id.clone(),
            it.author.clone(),
            it.author_display_name.clone(),
            it.created_at.to_rfc3339(),
            it.body.clone(),
            it.url.clone(),
            it.content_type.sheet_label().to_string(),
            it.conversation_id.clone(),
            it.source_rows.to_string(),
            it.metric("likes").to_string(),
            it.metric("retweets").to_string(),
            it.metric("replies").to_string(),
            it.metric("quotes").to_string(),
            it.metric("bookmarks").to_string(),
            it.metric("views").to_string(),
            it.subreddit.clone(),
            it.metric("score").to_string(),
            it.metric("num_comments").to_string(),
            self.rewritten_en.clone(),
            self.rewritten_ru.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{parse_timestamp, ContentType, Platform};

    #[test]
    fn sheet_row_matches_header_width_and_url_position() {
        let rec = ProcessedRecord {
            item: ContentItem {
                source_id: "1abc".into(),
                url: "https://www.reddit.com/r/rust/comments/1abc/x/".into(),
                platform: Platform::Reddit,
                content_type: ContentType::Post,
                body: "Title: x".into(),
                created_at: parse_timestamp("2024-05-01T10:00:00Z").unwrap(),
                metrics: [("score".to_string(), 7u64)].into_iter().collect(),
                author: "u".into(),
                author_display_name: "u".into(),
                conversation_id: "1abc".into(),
                subreddit: "rust".into(),
                source_rows: 1,
            },
            rewritten_en: "en".into(),
            rewritten_ru: String::new(),
            processed_at: Utc::now(),
            status: RecordStatus::RewriteFailed,
            error: Some("ru: policy".into()),
        };
        let row = rec.to_sheet_row();
        assert_eq!(row.len(), TARGET_COLUMNS.len());
        let url_idx = TARGET_COLUMNS.iter().position(|c| *c == URL_COLUMN).unwrap();
        assert_eq!(row[url_idx], rec.item.url);
        assert_eq!(row[19], "7");
        assert_eq!(row[1], "rewrite_failed");
    }
}
