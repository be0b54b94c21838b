// src/config/lists.rs
//! Keyword and source lists kept in small TOML/JSON files.
//!
//! Accepted shapes:
//! - TOML: `keywords = [...]` or `sources = [...]`
//! - JSON: a bare array, or an object with `keywords`, `sources` or `target_users`
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;

const ENV_KEYWORDS_PATH: &str = "FILTER_KEYWORDS_PATH";

/// Load a list from an explicit path. The extension hints the format; the other
/// format is tried when the hinted one does not parse.
pub fn load_list_from(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_list(&content, &ext).ok_or_else(|| ConfigError::Format {
        path: path.to_path_buf(),
    })
}

/// Usernames or subreddits to poll. A leading `@` or `r/` is stripped.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = load_list_from(path)?;
    Ok(clean_list(raw.into_iter().map(|s| {
        let t = s.trim();
        t.strip_prefix('@')
            .or_else(|| t.strip_prefix("r/"))
            .unwrap_or(t)
            .to_string()
    })))
}

/// Filter keywords using env var + fallbacks:
/// 1) $FILTER_KEYWORDS_PATH
/// 2) config/filter_keywords.toml
/// 3) config/filter_keywords.json
///
/// `Ok(None)` when nothing is configured (the built-in list applies).
pub fn load_keywords_default() -> Result<Option<Vec<String>>, ConfigError> {
    if let Some(p) = super::env_opt(ENV_KEYWORDS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(ConfigError::MissingFile(ENV_KEYWORDS_PATH));
        }
        return load_list_from(&pb).map(Some);
    }
    for candidate in ["config/filter_keywords.toml", "config/filter_keywords.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_list_from(&pb).map(Some);
        }
    }
    Ok(None)
}

fn parse_list(s: &str, hint_ext: &str) -> Option<Vec<String>> {
    if hint_ext == "toml" {
        parse_toml(s).or_else(|| parse_json(s))
    } else {
        parse_json(s).or_else(|| parse_toml(s))
    }
}

#[derive(serde::Deserialize)]
struct Keyed {
    #[serde(default, alias = "target_users", alias = "sources")]
    keywords: Option<Vec<String>>,
}

fn parse_toml(s: &str) -> Option<Vec<String>> {
    let v: Keyed = toml::from_str(s).ok()?;
    v.keywords.map(clean_list)
}

fn parse_json(s: &str) -> Option<Vec<String>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum JsonList {
        Bare(Vec<String>),
        Keyed(Keyed),
    }
    match serde_json::from_str::<JsonList>(s).ok()? {
        JsonList::Bare(v) => Some(clean_list(v)),
        JsonList::Keyed(k) => k.keywords.map(clean_list),
    }
}

fn clean_list(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
