// src/rewrite/mod.rs
//! Rewrite Engine: two generation calls per item (EN, RU) behind a shared gate.
//!
//! The gate is a FIFO semaphore sized by `RewriteConfig::concurrency`. A permit
//! covers exactly one attempt (plus the optional spacing pause after it), so
//! items waiting out a backoff do not block others.

pub mod client;
pub mod gemini;
pub mod retry;
pub mod style;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::RewriteConfig;
use crate::ingest::ContentItem;
use crate::record::{ProcessedRecord, RecordStatus};

pub use client::{GenerateError, Generator, ScriptedGenerator};
pub use gemini::GeminiGenerator;
pub use retry::{retry, RetryPolicy};
pub use style::{prompt_for, Language, PERSONA};

#[derive(Clone)]
pub struct RewriteEngine {
    generator: Arc<dyn Generator>,
    gate: Arc<Semaphore>,
    spacing: Duration,
    retry: RetryPolicy,
}

impl RewriteEngine {
    pub fn new(generator: Arc<dyn Generator>, cfg: &RewriteConfig) -> Self {
        Self {
            generator,
            gate: Arc::new(Semaphore::new(cfg.concurrency.max(1))),
            spacing: cfg.spacing,
            retry: cfg.retry,
        }
    }

    /// Rewrite one item into both languages. Never fails as a whole: each
    /// language that could not be produced leaves its text empty and marks
    /// the record `RewriteFailed`.
    pub async fn rewrite(&self, item: ContentItem) -> ProcessedRecord {
        if item.body.trim().is_empty() {
            warn!(target: "rewrite", url = %item.url, "empty body, nothing to rewrite");
            counter!("rewrite_failures_total", "lang" => "all").increment(1);
            return ProcessedRecord {
                item,
                rewritten_en: String::new(),
                rewritten_ru: String::new(),
                processed_at: Utc::now(),
                status: RecordStatus::RewriteFailed,
                error: Some("empty body".into()),
            };
        }

        let (en, ru) = tokio::join!(
            self.rewrite_lang(Language::En, &item.body),
            self.rewrite_lang(Language::Ru, &item.body)
        );

        let mut errors = Vec::new();
        let mut text = |lang: Language, res: Result<String, GenerateError>| match res {
            Ok(t) => t,
            Err(e) => {
                counter!("rewrite_failures_total", "lang" => lang.code()).increment(1);
                errors.push(format!("{lang}: {e}"));
                String::new()
            }
        };
        let rewritten_en = text(Language::En, en);
        let rewritten_ru = text(Language::Ru, ru);

        let status = if errors.is_empty() {
            RecordStatus::Success
        } else {
            RecordStatus::RewriteFailed
        };
        info!(target: "rewrite", url = %item.url, status = status.as_str(), "item rewritten");

        ProcessedRecord {
            item,
            rewritten_en,
            rewritten_ru,
            processed_at: Utc::now(),
            status,
            error: errors.into_iter().next(),
        }
    }

    /// Start every item; results come out in completion order.
    pub fn rewrite_all(&self, items: Vec<ContentItem>) -> FuturesUnordered<BoxFuture<'_, ProcessedRecord>> {
        items
            .into_iter()
            .map(|it| -> BoxFuture<'_, ProcessedRecord> { Box::pin(self.rewrite(it)) })
            .collect()
    }

    async fn rewrite_lang(&self, lang: Language, body: &str) -> Result<String, GenerateError> {
        let prompt = prompt_for(lang, body);
        let out = retry(&self.retry, GenerateError::is_transient, |attempt| {
            let prompt = prompt.as_str();
            async move {
                let _permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|_| GenerateError::Unavailable("rewrite gate closed".into()))?;
                counter!("rewrite_calls_total", "lang" => lang.code()).increment(1);
                let started = Instant::now();
                let res = self.generator.generate(prompt, PERSONA).await;
                histogram!("rewrite_call_ms").record(started.elapsed().as_millis() as f64);
                debug!(target: "rewrite", generator = self.generator.name(), %lang, attempt, ok = res.is_ok(), "generation call finished");
                if !self.spacing.is_zero() {
                    tokio::time::sleep(self.spacing).await;
                }
                res
            }
        })
        .await?;

        if out.trim().is_empty() {
            return Err(GenerateError::Unavailable("empty completion".into()));
        }
        Ok(out)
    }
}
