//! Startup configuration, read once from the environment.
//!
//! Both binaries call `dotenvy::dotenv()` first, then build an immutable
//! config struct that is passed by reference for the rest of the run.

pub mod lists;
pub mod pipeline;
pub mod poller;

use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use regex::Regex;
use thiserror::Error;

pub use lists::{load_keywords_default, load_list_from, load_sources_from};
pub use pipeline::{PipelineConfig, RewriteConfig, TelegramConfig};
pub use poller::{PlatformCredentials, PollerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: unsupported list format (expected TOML or JSON)")]
    Format { path: PathBuf },
    #[error("{0} points to a non-existent path")]
    MissingFile(&'static str),
}

/// Trimmed value, `None` when unset or blank.
pub(crate) fn env_opt(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_required(var: &'static str) -> Result<String, ConfigError> {
    env_opt(var).ok_or(ConfigError::Missing(var))
}

pub(crate) fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(var) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Comma separated list, blanks dropped.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Spreadsheet id from a full Google Sheets URL, or the value itself when it
/// already looks like a bare id.
pub fn spreadsheet_id_from(url_or_id: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").unwrap());
    let s = url_or_id.trim();
    if let Some(c) = re.captures(s) {
        return Some(c[1].to_string());
    }
    let bare = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    bare.then(|| s.to_string())
}

/// `GOOGLE_SHEETS_URL` (or `GOOGLE_SHEETS_ID`) resolved to a spreadsheet id.
pub(crate) fn spreadsheet_id_from_env() -> Result<String, ConfigError> {
    if let Some(url) = env_opt("GOOGLE_SHEETS_URL") {
        return spreadsheet_id_from(&url).ok_or(ConfigError::Invalid {
            var: "GOOGLE_SHEETS_URL",
            value: url,
            reason: "no spreadsheet id in url".into(),
        });
    }
    env_opt("GOOGLE_SHEETS_ID").ok_or(ConfigError::Missing("GOOGLE_SHEETS_URL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spreadsheet_id_is_extracted_from_url_or_taken_bare() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-d_9xYz/edit#gid=0";
        assert_eq!(spreadsheet_id_from(url).as_deref(), Some("1AbC-d_9xYz"));
        assert_eq!(spreadsheet_id_from(" 1AbC-d_9xYz ").as_deref(), Some("1AbC-d_9xYz"));
        assert_eq!(spreadsheet_id_from("https://example.com/nothing"), None);
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(split_list(" Sheet1, ,Raw_2 ,"), vec!["Sheet1", "Raw_2"]);
    }
}
