// src/poll/mod.rs
//! Poll loop: per source fetch the delta past the cursor, append it to the raw
//! sheet, then advance and persist the cursor. Sleeps a randomized interval
//! between cycles.

pub mod cursor;
pub mod reddit;
pub mod scrape;
pub mod twitter;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use metrics::{counter, gauge};
use rand::Rng;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::PollerConfig;
use crate::ingest::{to_raw_row, RAW_COLUMNS};
use crate::notify::{notify_best_effort, Notifier};
use crate::sheets::SpreadsheetClient;
use crate::telemetry::ensure_metrics_described;

pub use cursor::CursorStore;
pub use reddit::RedditClient;
pub use scrape::{ScrapeClient, ScrapeError, ScrapedItem};
pub use twitter::TwitterClient;

pub const MIN_SLEEP: Duration = Duration::from_secs(60);
/// Errors listed in the cycle notification.
const ERRORS_IN_SUMMARY: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub appended: usize,
    /// (source, items appended) for sources that succeeded.
    pub per_source: Vec<(String, usize)>,
    /// (source, error) for sources skipped this cycle.
    pub errors: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn summary_message(&self, platform: &str) -> String {
        let mut msg = format!(
            "📥 Poll cycle ({platform}): {} new item(s) from {} source(s) in {:.0}s",
            self.appended,
            self.per_source.len(),
            self.elapsed.as_secs_f64()
        );
        if !self.errors.is_empty() {
            msg.push_str(&format!("\n⚠️ {} error(s):", self.errors.len()));
            for (src, e) in self.errors.iter().take(ERRORS_IN_SUMMARY) {
                msg.push_str(&format!("\n- {src}: {e}"));
            }
            if self.errors.len() > ERRORS_IN_SUMMARY {
                msg.push_str(&format!("\n… and {} more", self.errors.len() - ERRORS_IN_SUMMARY));
            }
        }
        msg
    }
}

/// Sleep before the next cycle: a uniform draw from
/// `[max(60s, base - range), base + range]` minus the time the cycle took,
/// never below 60s. `unit` is the draw in `[0, 1]`.
pub fn sleep_after(base: Duration, range: Duration, cycle: Duration, unit: f64) -> Duration {
    let lo = base.saturating_sub(range).max(MIN_SLEEP);
    let hi = base.saturating_add(range).max(lo);
    let span = (hi - lo).as_secs_f64();
    let pick = Duration::try_from_secs_f64(span * unit.clamp(0.0, 1.0))
        .ok()
        .and_then(|d| lo.checked_add(d))
        .map_or(hi, |p| p.min(hi));
    pick.saturating_sub(cycle).max(MIN_SLEEP)
}

pub struct PollLoop<'a> {
    cfg: &'a PollerConfig,
    scraper: &'a dyn ScrapeClient,
    sheets: &'a dyn SpreadsheetClient,
    notifier: &'a dyn Notifier,
    cursor: CursorStore,
}

impl<'a> PollLoop<'a> {
    pub async fn new(
        cfg: &'a PollerConfig,
        scraper: &'a dyn ScrapeClient,
        sheets: &'a dyn SpreadsheetClient,
        notifier: &'a dyn Notifier,
    ) -> Result<Self> {
        ensure_metrics_described();
        anyhow::ensure!(
            scraper.platform() == cfg.platform,
            "scraper serves {} but the poller is configured for {}",
            scraper.platform().as_str(),
            cfg.platform.as_str()
        );
        let cursor = CursorStore::load(&cfg.cursor_file)
            .await
            .with_context(|| format!("loading cursor {}", cfg.cursor_file.display()))?;
        Ok(Self { cfg, scraper, sheets, notifier, cursor })
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }

    /// One pass over all sources. Never fails as a whole; per-source problems
    /// land in `CycleReport::errors` and leave that source's cursor alone.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let cfg = self.cfg;
        let started = Instant::now();
        let mut report = CycleReport::default();

        if let Err(e) = self.sheets.ensure_sheet_exists(&cfg.raw_sheet, &RAW_COLUMNS).await {
            warn!(target: "poll", sheet = %cfg.raw_sheet, error = %e, "raw sheet not ready, skipping cycle");
            report.errors.push((cfg.raw_sheet.clone(), e.to_string()));
            report.elapsed = started.elapsed();
            return report;
        }

        let n = cfg.sources.len();
        for (i, source) in cfg.sources.iter().enumerate() {
            match self.poll_source(source).await {
                Ok(appended) => {
                    report.appended += appended;
                    report.per_source.push((source.clone(), appended));
                }
                Err(e) => {
                    counter!("poll_source_errors_total").increment(1);
                    warn!(target: "poll", source = %source, error = %format!("{e:#}"), "source skipped this cycle");
                    report.errors.push((source.clone(), format!("{e:#}")));
                }
            }
            if i + 1 < n && !cfg.delay_between_sources.is_zero() {
                tokio::time::sleep(cfg.delay_between_sources).await;
            }
        }

        report.elapsed = started.elapsed();
        gauge!("poll_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        info!(
            target: "poll",
            appended = report.appended,
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cycle finished"
        );
        report
    }

    /// Fetch → append → advance cursor → persist cursor, for one source.
    async fn poll_source(&mut self, source: &str) -> Result<usize> {
        let since = self.cursor.get(source);
        let mut fresh: Vec<ScrapedItem> = self
            .scraper
            .fetch_recent(source, since, self.cfg.fetch_limit)
            .await
            .context("fetch")?
            .into_iter()
            .filter(|s| s.id > since)
            .collect();
        counter!("poll_items_fetched_total").increment(fresh.len() as u64);

        let Some(max_id) = fresh.iter().map(|s| s.id).max() else {
            return Ok(0);
        };
        fresh.sort_by_key(|s| (s.item.created_at, s.id));
        let rows: Vec<Vec<String>> = fresh.iter().map(|s| to_raw_row(&s.item)).collect();
        self.sheets
            .append_rows(&self.cfg.raw_sheet, rows)
            .await
            .context("append to raw sheet")?;

        self.cursor.advance(source, max_id);
        self.cursor.save().await.context("persist cursor")?;
        info!(target: "poll", source, appended = fresh.len(), last_seen = max_id, "source polled");
        Ok(fresh.len())
    }

    /// Cycle until `shutdown` flips to true (checked between cycles and while
    /// sleeping). With `once`, exactly one cycle runs.
    pub async fn run(&mut self, once: bool, mut shutdown: watch::Receiver<bool>) {
        let platform = self.cfg.platform;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let report = self.run_cycle().await;
            notify_best_effort(self.notifier, &report.summary_message(platform.as_str())).await;
            if once {
                break;
            }

            let unit: f64 = rand::rng().random();
            let wait = sleep_after(self.cfg.base_sleep, self.cfg.sleep_range, report.elapsed, unit);
            info!(target: "poll", sleep_s = wait.as_secs(), "sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(target: "poll", "poll loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u64 = 3600;

    #[test]
    fn sleep_window_and_floor() {
        let base = Duration::from_secs(4 * H);
        let range = Duration::from_secs(H);
        let zero = Duration::ZERO;
        assert_eq!(sleep_after(base, range, zero, 0.0), Duration::from_secs(3 * H));
        assert_eq!(sleep_after(base, range, zero, 1.0), Duration::from_secs(5 * H));
        assert_eq!(
            sleep_after(base, range, Duration::from_secs(600), 0.0),
            Duration::from_secs(3 * H - 600)
        );
        // cycle longer than the drawn interval
        assert_eq!(sleep_after(base, range, Duration::from_secs(6 * H), 0.5), MIN_SLEEP);
        // range larger than base: lower bound clamps to 60s
        assert_eq!(
            sleep_after(Duration::from_secs(30), Duration::from_secs(H), zero, 0.0),
            MIN_SLEEP
        );
        // huge configured values saturate instead of overflowing
        assert_eq!(sleep_after(Duration::MAX, Duration::MAX, zero, 1.0), Duration::MAX);
    }

    #[test]
    fn summary_lists_first_five_errors() {
        let report = CycleReport {
            appended: 3,
            per_source: vec![("a".into(), 3)],
            errors: (0..7).map(|i| (format!("s{i}"), "boom".to_string())).collect(),
            elapsed: Duration::from_secs(12),
        };
        let msg = report.summary_message("twitter");
        assert!(msg.contains("3 new item(s)"));
        assert!(msg.contains("s4: boom"));
        assert!(!msg.contains("s5: boom"));
        assert!(msg.contains("and 2 more"));
    }
}
