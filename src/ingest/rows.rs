// src/ingest/rows.rs
//! Spreadsheet rows <-> `ContentItem`.
//!
//! Source sheets are read by header name, not by position. Two header
//! vocabularies are in circulation (the scraper's `Tweet URL` and the older
//! `First Tweet URL` style), so every field has a list of accepted aliases.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use once_cell::sync::OnceCell;
use regex::Regex;

use super::normalize_text;
use super::types::{ContentItem, ContentType, Platform};

/// Header written by the poller to raw sheets.
pub const RAW_COLUMNS: [&str; 18] = [
    "Platform",
    "Username",
    "Display Name",
    "Tweet Timestamp",
    "Tweet Text",
    "Tweet URL",
    "Likes",
    "Retweets",
    "Replies",
    "Quotes",
    "Bookmarks",
    "Views",
    "Tweet Type",
    "Conversation ID",
    "Subreddit",
    "Score",
    "Num Comments",
    "Post ID",
];

/// Engagement counters and the headers they may appear under.
pub(crate) const METRIC_COLUMNS: [(&str, &[&str]); 8] = [
    ("likes", &["Likes", "Likes (First Tweet)"]),
    ("retweets", &["Retweets", "Retweets (First Tweet)"]),
    ("replies", &["Replies", "Replies (First Tweet)"]),
    ("quotes", &["Quotes", "Quotes (First Tweet)"]),
    ("bookmarks", &["Bookmarks", "Bookmarks (First Tweet)"]),
    ("views", &["Views", "Views (First Tweet)"]),
    ("score", &["Score"]),
    ("num_comments", &["Num Comments"]),
];

const URL_HEADERS: &[&str] = &["Tweet URL", "First Tweet URL", "URL"];
const TEXT_HEADERS: &[&str] = &["Tweet Text", "Combined Original Text", "Text"];
const TS_HEADERS: &[&str] = &["Tweet Timestamp", "First Tweet Timestamp", "Timestamp"];
const TYPE_HEADERS: &[&str] = &["Tweet Type", "Content Type"];
const USER_HEADERS: &[&str] = &["Username", "Original Username"];
const DISPLAY_HEADERS: &[&str] = &["Display Name", "Original Display Name"];
const ID_HEADERS: &[&str] = &["Post ID", "Tweet ID", "Source ID"];

const THREAD_SEPARATOR: &str = "\n\n---\n\n";

/// Result of parsing one sheet.
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub items: Vec<ContentItem>,
    /// Rows skipped because they were unusable (no url, bad timestamp, unknown type).
    pub dropped: usize,
}

struct Header {
    index: HashMap<String, usize>,
}

impl Header {
    fn new(cells: &[String]) -> Self {
        let mut index = HashMap::new();
        for (i, c) in cells.iter().enumerate() {
            index.entry(c.trim().to_ascii_lowercase()).or_insert(i);
        }
        Self { index }
    }

    fn get<'a>(&self, row: &'a [String], aliases: &[&str]) -> &'a str {
        aliases
            .iter()
            .filter_map(|a| self.index.get(&a.to_ascii_lowercase()))
            .filter_map(|&i| row.get(i))
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// Parse sheet values (first row = header) into content items for `platform`.
/// Rows tagged with another platform in a `Platform` column are ignored.
pub fn parse_rows(platform: Platform, rows: &[Vec<String>]) -> ParsedRows {
    let mut out = ParsedRows::default();
    let Some((header_row, data)) = rows.split_first() else {
        return out;
    };
    let header = Header::new(header_row);

    for (n, row) in data.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let row_platform = header.get(row, &["Platform"]);
        if !row_platform.is_empty() && row_platform.parse::<Platform>().ok() != Some(platform) {
            continue;
        }
        match parse_row(platform, &header, row) {
            Ok(item) => out.items.push(item),
            Err(reason) => {
                tracing::warn!(target: "ingest", row = n + 2, reason, "dropping source row");
                out.dropped += 1;
            }
        }
    }
    out
}

fn parse_row(platform: Platform, header: &Header, row: &[String]) -> Result<ContentItem, &'static str> {
    let url = header.get(row, URL_HEADERS);
    if url.is_empty() {
        return Err("missing url");
    }
    let created_at = parse_timestamp(header.get(row, TS_HEADERS)).ok_or("unparseable timestamp")?;

    let type_label = header.get(row, TYPE_HEADERS);
    let content_type = if type_label.is_empty() {
        match platform {
            Platform::Reddit => ContentType::Post,
            Platform::Twitter => ContentType::OriginalTweet,
        }
    } else {
        ContentType::from_label(type_label).ok_or("unknown content type")?
    };

    let mut metrics = BTreeMap::new();
    for (name, aliases) in METRIC_COLUMNS {
        let raw = header.get(row, aliases);
        if !raw.is_empty() {
            metrics.insert(name.to_string(), parse_count(raw));
        }
    }

    let conversation_id = match header.get(row, &["Conversation ID"]) {
        "N/A" => "",
        other => other,
    };
    let mut source_id = header.get(row, ID_HEADERS).to_string();
    if source_id.is_empty() {
        source_id = id_from_url(url).unwrap_or(conversation_id).to_string();
    }

    Ok(ContentItem {
        source_id,
        url: url.to_string(),
        platform,
        content_type,
        body: normalize_text(header.get(row, TEXT_HEADERS)),
        created_at,
        metrics,
        author: header.get(row, USER_HEADERS).to_string(),
        author_display_name: header.get(row, DISPLAY_HEADERS).to_string(),
        conversation_id: conversation_id.to_string(),
        subreddit: header.get(row, &["Subreddit"]).to_string(),
        source_rows: 1,
    })
}

/// Render an item as a raw-sheet row in `RAW_COLUMNS` order.
pub fn to_raw_row(item: &ContentItem) -> Vec<String> {
    vec![
        item.platform.as_str().to_string(),
        item.author.clone(),
        item.author_display_name.clone(),
        item.created_at.to_rfc3339(),
        item.body.clone(),
        item.url.clone(),
        item.metric("likes").to_string(),
        item.metric("retweets").to_string(),
        item.metric("replies").to_string(),
        item.metric("quotes").to_string(),
        item.metric("bookmarks").to_string(),
        item.metric("views").to_string(),
        item.content_type.sheet_label().to_string(),
        item.conversation_id.clone(),
        item.subreddit.clone(),
        item.metric("score").to_string(),
        item.metric("num_comments").to_string(),
        item.source_id.clone(),
    ]
}

/// Fold Twitter rows into threads.
///
/// Rows are grouped by (author, conversation). Rows that open with a mention of
/// somebody other than the author are replies to others and are dropped. A group
/// left with more than one row becomes a single `Thread` item carrying the
/// earliest row's id, url and counters; a group of one keeps its own type.
pub fn consolidate(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut groups: BTreeMap<(String, String), Vec<ContentItem>> = BTreeMap::new();
    for it in items {
        let conv = if it.conversation_id.is_empty() {
            // no conversation id: never merge with anything else
            format!("~{}", it.source_id)
        } else {
            it.conversation_id.clone()
        };
        groups.entry((it.author.clone(), conv)).or_default().push(it);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        group.sort_by_key(|it| it.created_at);
        let core: Vec<ContentItem> = group
            .into_iter()
            .filter(|it| !is_reply_to_other(&it.body, &it.author))
            .collect();

        match core.len() {
            0 => {}
            1 => out.extend(core),
            n => {
                let body = core
                    .iter()
                    .map(|it| it.body.as_str())
                    .collect::<Vec<_>>()
                    .join(THREAD_SEPARATOR);
                if let Some(mut head) = core.into_iter().next() {
                    head.content_type = ContentType::Thread;
                    head.body = body;
                    head.source_rows = n as u32;
                    out.push(head);
                }
            }
        }
    }
    out
}

/// `@someone ...` where `someone` is not the author.
pub fn is_reply_to_other(body: &str, author: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*@(\w{1,15})").unwrap());
    match re.captures(body) {
        Some(c) => !c[1].eq_ignore_ascii_case(author.trim_start_matches('@')),
        None => false,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS [ZONE][+HHMM]`, and the bare naive form (UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let mut parts = s.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let naive =
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = zone_offset(parts.next().unwrap_or(""))?;
    offset.from_local_datetime(&naive).single()
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let Some(i) = zone.rfind(['+', '-']) else {
        // bare abbreviation ("UTC", "CET"): the offset is unknown, read as UTC
        return FixedOffset::east_opt(0);
    };
    let digits = &zone[i + 1..];
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let h: i32 = digits[..2].parse().ok()?;
    let m: i32 = digits[2..].parse().ok()?;
    let sign = if zone[i..].starts_with('-') { -1 } else { 1 };
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

/// Lenient counter parse: "1,204" and "12.0" are fine, garbage is 0.
fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned
        .parse::<u64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0)
}

fn id_from_url(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
}
