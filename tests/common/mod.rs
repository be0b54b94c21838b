// tests/common/mod.rs
// Shared builders for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use content_relay::ingest::{parse_timestamp, RAW_COLUMNS};
use content_relay::{ContentItem, ContentType, Platform, ProcessedRecord, RecordStatus};

pub fn reddit_item(url: &str, body: &str) -> ContentItem {
    ContentItem {
        source_id: url.rsplit('/').next().unwrap_or("1").to_string(),
        url: url.to_string(),
        platform: Platform::Reddit,
        content_type: ContentType::Post,
        body: body.to_string(),
        created_at: parse_timestamp("2024-05-01T10:00:00Z").unwrap(),
        metrics: BTreeMap::new(),
        author: "ferris".into(),
        author_display_name: "ferris".into(),
        conversation_id: String::new(),
        subreddit: "rust".into(),
        source_rows: 1,
    }
}

pub fn record(url: &str, status: RecordStatus) -> ProcessedRecord {
    ProcessedRecord {
        item: reddit_item(url, "Title: something about rust"),
        rewritten_en: "en".into(),
        rewritten_ru: if status == RecordStatus::Success { "ru".into() } else { String::new() },
        processed_at: Utc::now(),
        status,
        error: None,
    }
}

/// Raw Reddit sheet (poller header) with one row per (url, text).
pub fn raw_reddit_sheet(posts: &[(&str, &str)]) -> Vec<Vec<String>> {
    let mut rows = vec![RAW_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>()];
    for (i, (url, text)) in posts.iter().enumerate() {
        let mut row = vec![String::new(); RAW_COLUMNS.len()];
        let mut set = |col: &str, v: String| {
            if let Some(idx) = RAW_COLUMNS.iter().position(|c| *c == col) {
                row[idx] = v;
            }
        };
        set("Platform", "reddit".into());
        set("Username", "ferris".into());
        set("Tweet Timestamp", format!("2024-05-01 10:{:02}:00 UTC+0000", i % 60));
        set("Tweet Text", text.to_string());
        set("Tweet URL", url.to_string());
        set("Tweet Type", "Reddit Post".into());
        set("Subreddit", "rust".into());
        set("Score", "10".into());
        rows.push(row);
    }
    rows
}

/// `len` chars of filler with `keyword` in the middle.
pub fn body_with(keyword: &str, len: usize) -> String {
    let pad = len.saturating_sub(keyword.len() + 2);
    let left = pad / 2;
    format!("{} {} {}", "a".repeat(left), keyword, "b".repeat(pad - left))
}
