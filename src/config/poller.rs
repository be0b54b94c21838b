// src/config/poller.rs
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use super::pipeline::TelegramConfig;
use super::{env_opt, env_parse, env_required, load_sources_from, spreadsheet_id_from_env, split_list, ConfigError};
use crate::ingest::Platform;

const DEFAULT_SUBREDDITS: &str = "MachineLearning,programming,technology,startups,artificial";

/// Scrape credentials. Only the scrape client looks inside.
#[derive(Clone)]
pub enum PlatformCredentials {
    Twitter {
        bearer_token: String,
    },
    Reddit {
        client_id: String,
        client_secret: String,
        user_agent: String,
    },
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformCredentials::Twitter { .. } => f.write_str("Twitter { .. }"),
            PlatformCredentials::Reddit { user_agent, .. } => {
                write!(f, "Reddit {{ user_agent: {user_agent:?}, .. }}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub platform: Platform,
    pub spreadsheet_id: String,
    pub sheets_access_token: String,
    /// Raw sheet new items are appended to.
    pub raw_sheet: String,
    /// Usernames or subreddits, polled in this order.
    pub sources: Vec<String>,
    pub cursor_file: PathBuf,
    pub fetch_limit: usize,
    pub delay_between_sources: Duration,
    pub base_sleep: Duration,
    pub sleep_range: Duration,
    pub credentials: PlatformCredentials,
    pub telegram: TelegramConfig,
}

fn hours(var: &'static str, default: f64) -> Result<Duration, ConfigError> {
    let h: f64 = env_parse(var, default)?;
    if !h.is_finite() || h < 0.0 {
        return Err(ConfigError::Invalid {
            var,
            value: h.to_string(),
            reason: "expected a non-negative number of hours".into(),
        });
    }
    Duration::try_from_secs_f64(h * 3600.0).map_err(|e| ConfigError::Invalid {
        var,
        value: h.to_string(),
        reason: format!("too many hours: {e}"),
    })
}

impl PollerConfig {
    /// No credentials, no delays; for tests and offline runs with injected clients.
    pub fn offline(platform: Platform, sources: Vec<String>, cursor_file: impl Into<PathBuf>) -> Self {
        let credentials = match platform {
            Platform::Twitter => PlatformCredentials::Twitter { bearer_token: String::new() },
            Platform::Reddit => PlatformCredentials::Reddit {
                client_id: String::new(),
                client_secret: String::new(),
                user_agent: String::new(),
            },
        };
        let raw_sheet = match platform {
            Platform::Twitter => "Sheet1",
            Platform::Reddit => "Sheet_Reddit_Raw",
        };
        Self {
            platform,
            spreadsheet_id: String::new(),
            sheets_access_token: String::new(),
            raw_sheet: raw_sheet.to_string(),
            sources,
            cursor_file: cursor_file.into(),
            fetch_limit: 30,
            delay_between_sources: Duration::ZERO,
            base_sleep: Duration::from_secs(4 * 3600),
            sleep_range: Duration::from_secs(3600),
            credentials,
            telegram: TelegramConfig::default(),
        }
    }

    pub fn from_env(platform: Platform) -> Result<Self, ConfigError> {
        let (sources, raw_sheet, fetch_limit, credentials) = match platform {
            Platform::Twitter => {
                let sources = match env_opt("TWITTER_USERNAMES") {
                    Some(list) => split_list(&list),
                    None => {
                        let file = env_opt("USERNAMES_FILE").unwrap_or_else(|| "usernames.json".into());
                        load_sources_from(&PathBuf::from(file))?
                    }
                };
                (
                    sources,
                    env_opt("TWITTER_RAW_SHEET_NAME").unwrap_or_else(|| "Sheet1".into()),
                    env_parse("TWEET_FETCH_LIMIT", 30usize)?,
                    PlatformCredentials::Twitter {
                        bearer_token: env_required("TWITTER_BEARER_TOKEN")?,
                    },
                )
            }
            Platform::Reddit => {
                let sources = match env_opt("REDDIT_SUBREDDITS_FILE") {
                    Some(file) => load_sources_from(&PathBuf::from(file))?,
                    None => split_list(&env_opt("REDDIT_SUBREDDITS").unwrap_or_else(|| DEFAULT_SUBREDDITS.into())),
                };
                (
                    sources,
                    env_opt("REDDIT_TARGET_SHEET_NAME").unwrap_or_else(|| "Sheet_Reddit_Raw".into()),
                    env_parse("REDDIT_POST_LIMIT", 25usize)?,
                    PlatformCredentials::Reddit {
                        client_id: env_required("REDDIT_CLIENT_ID")?,
                        client_secret: env_required("REDDIT_CLIENT_SECRET")?,
                        user_agent: env_required("REDDIT_USER_AGENT")?,
                    },
                )
            }
        };
        if sources.is_empty() {
            return Err(ConfigError::Invalid {
                var: "sources",
                value: String::new(),
                reason: "no usernames or subreddits configured".into(),
            });
        }

        let cursor_var = match platform {
            Platform::Twitter => "TWITTER_CURSOR_FILE",
            Platform::Reddit => "REDDIT_CURSOR_FILE",
        };
        let cursor_file = env_opt(cursor_var)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("state/{platform}_last_seen.json")));

        let cfg = Self {
            platform,
            spreadsheet_id: spreadsheet_id_from_env()?,
            sheets_access_token: env_required("GOOGLE_SHEETS_ACCESS_TOKEN")?,
            raw_sheet,
            sources,
            cursor_file,
            fetch_limit: fetch_limit.max(1),
            delay_between_sources: Duration::from_secs(env_parse("DELAY_BETWEEN_USERS_SECONDS", 10u64)?),
            base_sleep: hours("BASE_SLEEP_INTERVAL_HOURS", 4.0)?,
            sleep_range: hours("RANDOM_SLEEP_RANGE_HOURS", 1.0)?,
            credentials,
            telegram: TelegramConfig::from_env(),
        };
        info!(
            target: "poll",
            %platform,
            sources = cfg.sources.len(),
            raw_sheet = %cfg.raw_sheet,
            cursor = %cfg.cursor_file.display(),
            "configuration loaded"
        );
        Ok(cfg)
    }
}
