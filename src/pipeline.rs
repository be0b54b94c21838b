//! One analyzer pass: source sheets → filter → rewrite → local state → target sheet.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::StreamExt;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::filter::{ContentFilter, Decision, RejectReason};
use crate::ingest::{consolidate, parse_rows, ContentItem, Platform};
use crate::notify::{notify_best_effort, Notifier};
use crate::record::{RecordStatus, TARGET_COLUMNS};
use crate::rewrite::RewriteEngine;
use crate::sheets::SpreadsheetClient;
use crate::state::StateStore;
use crate::sync::reconcile;
use crate::telemetry::ensure_metrics_described;

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub platform: Option<Platform>,
    /// Items built from source rows (after thread consolidation).
    pub fetched: usize,
    pub dropped_rows: usize,
    pub rejected: BTreeMap<&'static str, usize>,
    pub admitted: usize,
    pub rewritten_ok: usize,
    pub rewritten_failed: usize,
    pub synced: usize,
    pub sync_error: Option<String>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn filtered(&self) -> usize {
        self.rejected.values().sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let platform = self.platform.map(|p| p.as_str()).unwrap_or("?");
        writeln!(f, "✅ Analyzer run finished ({platform}) in {:.0}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Fetched: {} (unusable rows: {})", self.fetched, self.dropped_rows)?;
        write!(f, "Filtered out: {}", self.filtered())?;
        if !self.rejected.is_empty() {
            let parts: Vec<String> = self.rejected.iter().map(|(r, n)| format!("{r}={n}")).collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "Rewritten: {} ok, {} failed", self.rewritten_ok, self.rewritten_failed)?;
        write!(f, "Synced to sheet: {}", self.synced)?;
        if let Some(e) = &self.sync_error {
            write!(f, "\n⚠️ Sync failed: {e}")?;
        }
        Ok(())
    }
}

/// Read every configured source sheet. A missing sheet is skipped; any other
/// read failure is fatal for the pass.
async fn fetch_items(
    cfg: &PipelineConfig,
    sheets: &dyn SpreadsheetClient,
    summary: &mut RunSummary,
) -> Result<Vec<ContentItem>> {
    let mut items = Vec::new();
    for name in &cfg.source_sheets {
        let rows = match sheets.read_sheet(name).await {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                warn!(target: "pipeline", sheet = %name, "source sheet missing, skipping");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("reading source sheet {name}")),
        };
        let parsed = parse_rows(cfg.platform, &rows);
        info!(target: "pipeline", sheet = %name, items = parsed.items.len(), dropped = parsed.dropped, "source sheet read");
        summary.dropped_rows += parsed.dropped;
        items.extend(parsed.items);
    }

    if cfg.platform == Platform::Twitter {
        let before = items.len();
        items = consolidate(items);
        info!(target: "pipeline", rows = before, items = items.len(), "threads consolidated");
    }
    Ok(items)
}

/// Apply the filter to the whole batch before anything is rewritten.
/// A url repeated inside the batch counts as a duplicate after its first occurrence.
fn admit_batch(filter: &ContentFilter, store: &StateStore, items: Vec<ContentItem>, summary: &mut RunSummary) -> Vec<ContentItem> {
    let mut in_batch = HashSet::new();
    let mut admitted = Vec::new();
    for item in items {
        let decision = if in_batch.contains(&item.url) {
            Decision::Reject(RejectReason::Duplicate)
        } else {
            filter.admit(&item, store.processed())
        };
        match decision {
            Decision::Accept => {
                in_batch.insert(item.url.clone());
                admitted.push(item);
            }
            Decision::Reject(reason) => {
                debug!(target: "pipeline", url = %item.url, %reason, "filtered out");
                counter!("filter_rejected_total", "reason" => reason.as_str()).increment(1);
                *summary.rejected.entry(reason.as_str()).or_default() += 1;
            }
        }
    }
    counter!("filter_accepted_total").increment(admitted.len() as u64);
    admitted
}

/// Run one full pass and send the summary notification.
///
/// Errors are fatal setup problems (target sheet cannot be prepared, a source
/// sheet cannot be read, local state cannot be written). Per-item rewrite
/// failures and a failed sync end up in the summary instead.
pub async fn run_pass(
    cfg: &PipelineConfig,
    sheets: &dyn SpreadsheetClient,
    engine: &RewriteEngine,
    store: &mut StateStore,
    notifier: &dyn Notifier,
) -> Result<RunSummary> {
    ensure_metrics_described();
    let started = Instant::now();
    let mut summary = RunSummary {
        platform: Some(cfg.platform),
        ..RunSummary::default()
    };

    if sheets
        .ensure_sheet_exists(&cfg.target_sheet, &TARGET_COLUMNS)
        .await
        .with_context(|| format!("preparing target sheet {}", cfg.target_sheet))?
    {
        info!(target: "pipeline", sheet = %cfg.target_sheet, "target sheet header written");
    }

    let items = fetch_items(cfg, sheets, &mut summary).await?;
    summary.fetched = items.len();
    counter!("pipeline_items_fetched_total").increment(items.len() as u64);
    counter!("pipeline_rows_dropped_total").increment(summary.dropped_rows as u64);

    let filter = ContentFilter::new(cfg.filter.clone());
    let admitted = admit_batch(&filter, store, items, &mut summary);
    summary.admitted = admitted.len();
    info!(
        target: "pipeline",
        fetched = summary.fetched,
        admitted = summary.admitted,
        filtered = summary.filtered(),
        "filtering done"
    );

    // Results are persisted in completion order, one durable append each.
    let mut results = engine.rewrite_all(admitted);
    while let Some(record) = results.next().await {
        let status = record.status;
        let url = record.item.url.clone();
        let appended = store
            .append(record)
            .await
            .with_context(|| format!("persisting {url}"))?;
        if !appended {
            debug!(target: "pipeline", url = %url, "repeated failure not stored again");
        }
        match status {
            RecordStatus::Success => summary.rewritten_ok += 1,
            RecordStatus::RewriteFailed => summary.rewritten_failed += 1,
        }
    }

    match reconcile(store.records(), sheets, &cfg.target_sheet, cfg.sync_batch_size).await {
        Ok(report) => summary.synced = report.appended,
        Err(e) => {
            warn!(target: "pipeline", error = %format!("{e:#}"), "sync to target sheet failed; will retry next run");
            summary.sync_error = Some(format!("{e:#}"));
        }
    }

    summary.elapsed = started.elapsed();
    info!(
        target: "pipeline",
        ok = summary.rewritten_ok,
        failed = summary.rewritten_failed,
        synced = summary.synced,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "pass finished"
    );
    notify_best_effort(notifier, &summary.to_string()).await;
    Ok(summary)
}
