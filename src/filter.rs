//! # Content Filter
//! Pure admit/reject decision for a content item against the processed set.
//! No I/O and no clock: identical inputs always give the identical decision.
//!
//! Checks run in a fixed order and the first failing one wins:
//! duplicate → wrong type → too short → no keyword → structured content.

use std::fmt;

use crate::ingest::{clean_for_filter, ContentItem, ContentType, Platform};
use crate::state::ProcessedSet;

/// Keywords used when no keyword file is configured.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "ai", "agi", "openai", "google", "gemini", "claude", "mistral", "llm", "model",
    "automation", " n8n", "python", "api", "workflow", "data", "tech", "business", "startup",
    "rahmetlabs", "scraping", "analyze", "process", "update", "news", "release", "research",
    "paper", "opinion", "thought", "develop", "build", "future", "risk", "safety", "alignment",
    "code", "coding", "launch", "feature", "limit", "rate limit", "context window", "token",
    "prompt", "engineer", "benchmark", "test",
];

/// Markers of pasted prompt templates.
pub const PROMPT_MARKERS: &[&str] = &["# prompt", "<role>", "<instructions>", "<context>"];

pub const DEFAULT_MIN_LENGTH: usize = 50;

/// More fences than this means more than one code block.
const MAX_CODE_FENCES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Duplicate,
    WrongType,
    TooShort,
    NoKeywordMatch,
    StructuredContent,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Duplicate => "duplicate",
            RejectReason::WrongType => "wrong_type",
            RejectReason::TooShort => "too_short",
            RejectReason::NoKeywordMatch => "no_keyword_match",
            RejectReason::StructuredContent => "structured_content",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub allowed_types: Vec<ContentType>,
    /// Minimum length in chars of the cleaned body.
    pub min_length: usize,
    /// Lowercased; empty disables the keyword check.
    pub keywords: Vec<String>,
}

impl FilterConfig {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            allowed_types: platform.default_allowed_types(),
            min_length: DEFAULT_MIN_LENGTH,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ContentFilter {
    cfg: FilterConfig,
}

impl ContentFilter {
    pub fn new(cfg: FilterConfig) -> Self {
        Self { cfg }
    }

    pub fn admit(&self, item: &ContentItem, processed: &ProcessedSet) -> Decision {
        if processed.contains(&item.url) {
            return Decision::Reject(RejectReason::Duplicate);
        }
        if !self.cfg.allowed_types.contains(&item.content_type) {
            return Decision::Reject(RejectReason::WrongType);
        }
        if clean_for_filter(&item.body).chars().count() < self.cfg.min_length {
            return Decision::Reject(RejectReason::TooShort);
        }
        let lower = item.body.to_lowercase();
        if !self.cfg.keywords.is_empty() && !self.cfg.keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Decision::Reject(RejectReason::NoKeywordMatch);
        }
        if looks_structured(&lower) {
            return Decision::Reject(RejectReason::StructuredContent);
        }
        Decision::Accept
    }
}

/// Prompt templates and code dumps do not rewrite into readable posts.
fn looks_structured(lower_body: &str) -> bool {
    PROMPT_MARKERS.iter().any(|m| lower_body.contains(m))
        || lower_body.matches("```").count() > MAX_CODE_FENCES
}
