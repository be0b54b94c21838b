// src/ingest/mod.rs
pub mod rows;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use rows::{consolidate, parse_rows, parse_timestamp, to_raw_row, ParsedRows, RAW_COLUMNS};
pub use types::{ContentItem, ContentType, Platform};

/// Normalize scraped text for storage: decode HTML entities, unify line endings,
/// trim trailing spaces on each line and cap runs of blank lines at one.
/// Unlike [`clean_for_filter`] this keeps paragraphs and links intact.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode (Reddit returns `&amp;`, `&gt;` ... in selftext)
    let decoded = html_escape::decode_html_entities(s).to_string();

    // 2) Normalize line endings and non-breaking spaces
    let unified = decoded.replace("\r\n", "\n").replace('\u{00A0}', " ");

    // 3) Trim each line, keep at most one empty line in a row
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

/// Text used for length checks: URLs and `---` thread separators removed,
/// whitespace collapsed.
pub fn clean_for_filter(s: &str) -> String {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re_url = RE_URL.get_or_init(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
    let without_urls = re_url.replace_all(s, "");
    let without_sep = without_urls.replace("---", "");
    without_sep.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_entities_and_keeps_paragraphs() {
        let s = "Title: Rust &amp; AI\r\n\r\n\r\n\r\nBody:\n  line one  \n";
        let out = normalize_text(s);
        assert_eq!(out, "Title: Rust & AI\n\nBody:\n  line one");
    }

    #[test]
    fn clean_for_filter_drops_urls_and_separators() {
        let s = "first part https://t.co/abc\n\n---\n\nsecond   www.example.com part";
        assert_eq!(clean_for_filter(s), "first part second part");
    }
}
