// src/config/pipeline.rs
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use super::{env_opt, env_parse, env_required, spreadsheet_id_from_env, split_list, ConfigError};
use crate::filter::{FilterConfig, DEFAULT_MIN_LENGTH};
use crate::ingest::Platform;
use crate::rewrite::gemini::DEFAULT_MODEL;
use crate::rewrite::RetryPolicy;

pub const DEFAULT_SYNC_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Max generation calls in flight. Never below 1.
    pub concurrency: usize,
    /// Pause held inside the permit after each call.
    pub spacing: Duration,
    pub retry: RetryPolicy,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            spacing: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

impl RewriteConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // 0 and negatives mean "no parallelism", not "no calls"
        let concurrency = env_parse::<i64>("GEMINI_CONCURRENT_REQUESTS", 1)?.max(1) as usize;
        let spacing = Duration::from_millis(env_parse("GEMINI_CALL_SPACING_MS", 1000u64)?);
        let retry = RetryPolicy {
            max_attempts: env_parse("GEMINI_MAX_ATTEMPTS", 3u32)?.max(1),
            base_delay: Duration::from_millis(env_parse("GEMINI_BACKOFF_BASE_MS", 1000u64)?),
            max_delay: Duration::from_millis(env_parse("GEMINI_BACKOFF_MAX_MS", 30_000u64)?),
        };
        Ok(Self { concurrency, spacing, retry })
    }
}

/// Telegram credentials; notifications are off unless both are set.
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn from_env() -> Self {
        Self {
            bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            chat_id: env_opt("TELEGRAM_CHAT_ID"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub platform: Platform,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub rewrite: RewriteConfig,
    pub spreadsheet_id: String,
    pub sheets_access_token: String,
    /// Raw sheets to read, in order.
    pub source_sheets: Vec<String>,
    pub target_sheet: String,
    pub state_file: PathBuf,
    pub filter: FilterConfig,
    pub sync_batch_size: usize,
    pub telegram: TelegramConfig,
}

/// Env var prefix for per-platform settings.
fn prefix(platform: Platform) -> &'static str {
    match platform {
        Platform::Twitter => "TWITTER",
        Platform::Reddit => "REDDIT",
    }
}

/// (raw source sheet, analyzed target sheet)
fn default_sheets(platform: Platform) -> (&'static str, &'static str) {
    match platform {
        Platform::Twitter => ("Sheet1", "Analyzed_Twitter"),
        Platform::Reddit => ("Sheet_Reddit_Raw", "Analyzed_Reddit"),
    }
}

impl PipelineConfig {
    /// Defaults for `platform` without credentials, state under `state_file`.
    /// Used by tests and offline runs against an in-memory sheet.
    pub fn offline(platform: Platform, state_file: impl Into<PathBuf>) -> Self {
        let (source, target) = default_sheets(platform);
        Self {
            platform,
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_MODEL.to_string(),
            rewrite: RewriteConfig::default(),
            spreadsheet_id: String::new(),
            sheets_access_token: String::new(),
            source_sheets: vec![source.to_string()],
            target_sheet: target.to_string(),
            state_file: state_file.into(),
            filter: FilterConfig::for_platform(platform),
            sync_batch_size: DEFAULT_SYNC_BATCH_SIZE,
            telegram: TelegramConfig::default(),
        }
    }

    pub fn from_env(platform: Platform) -> Result<Self, ConfigError> {
        let p = prefix(platform);
        let (default_sources, default_target) = default_sheets(platform);

        let source_sheets = split_list(
            &env_opt(&format!("{p}_SOURCE_SHEET_NAMES")).unwrap_or_else(|| default_sources.to_string()),
        );
        let source_sheets = if source_sheets.is_empty() {
            vec![default_sources.to_string()]
        } else {
            source_sheets
        };
        let target_sheet =
            env_opt(&format!("{p}_ANALYZED_SHEET_NAME")).unwrap_or_else(|| default_target.to_string());
        let state_file = env_opt(&format!("{p}_LOCAL_STATE_FILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("state/{platform}_processed.jsonl")));

        let mut filter = FilterConfig::for_platform(platform)
            .with_min_length(env_parse("FILTER_MIN_LENGTH", DEFAULT_MIN_LENGTH)?);
        if let Some(keywords) = super::load_keywords_default()? {
            filter = filter.with_keywords(keywords);
        }

        let cfg = Self {
            platform,
            gemini_api_key: env_required("GEMINI_API_KEY")?,
            gemini_model: env_opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            rewrite: RewriteConfig::from_env()?,
            spreadsheet_id: spreadsheet_id_from_env()?,
            sheets_access_token: env_required("GOOGLE_SHEETS_ACCESS_TOKEN")?,
            source_sheets,
            target_sheet,
            state_file,
            filter,
            sync_batch_size: env_parse("SYNC_BATCH_SIZE", DEFAULT_SYNC_BATCH_SIZE)?.max(1),
            telegram: TelegramConfig::from_env(),
        };
        info!(
            target: "pipeline",
            %platform,
            sources = ?cfg.source_sheets,
            target = %cfg.target_sheet,
            state = %cfg.state_file.display(),
            concurrency = cfg.rewrite.concurrency,
            keywords = cfg.filter.keywords.len(),
            "configuration loaded"
        );
        Ok(cfg)
    }
}
