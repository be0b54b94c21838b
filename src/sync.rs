//! Local state → target sheet reconciliation.
//!
//! Append-only and keyed by (url, status): rows the sheet already has are
//! never touched, rows it lacks are appended in local order. A failed attempt
//! and the later success for the same url are separate rows. Running it twice
//! in a row writes nothing the second time.

use std::collections::HashSet;

use anyhow::{Context, Result};
use metrics::counter;
use tracing::{info, warn};

use crate::record::{ProcessedRecord, RecordStatus, TARGET_COLUMNS, URL_COLUMN};
use crate::sheets::SpreadsheetClient;

const STATUS_COLUMN: &str = "Status";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Data rows found in the target sheet before appending.
    pub remote_rows: usize,
    /// Local records missing remotely.
    pub missing: usize,
    pub appended: usize,
}

/// Rows already in the target sheet.
#[derive(Debug, Default)]
struct RemoteRows {
    urls: HashSet<String>,
    /// (url, lowercased status); empty when the header has no status column.
    keyed: HashSet<(String, String)>,
    has_status: bool,
}

impl RemoteRows {
    fn parse(rows: &[Vec<String>]) -> Self {
        let Some((header, data)) = rows.split_first() else {
            return Self::default();
        };
        let column = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let url_idx = column(URL_COLUMN).unwrap_or_else(|| {
            warn!(target: "sync", column = URL_COLUMN, "url column missing from target header, using default position");
            TARGET_COLUMNS.iter().position(|c| *c == URL_COLUMN).unwrap_or(0)
        });
        let status_idx = column(STATUS_COLUMN);

        let mut out = Self { has_status: status_idx.is_some(), ..Self::default() };
        for row in data {
            let Some(url) = row.get(url_idx).map(|u| u.trim()).filter(|u| !u.is_empty()) else {
                continue;
            };
            out.urls.insert(url.to_string());
            if let Some(status) = status_idx.and_then(|i| row.get(i)) {
                out.keyed.insert((url.to_string(), status.trim().to_ascii_lowercase()));
            }
        }
        out
    }

    fn has(&self, url: &str, status: RecordStatus) -> bool {
        if !self.has_status {
            return self.urls.contains(url);
        }
        let key = |s: RecordStatus| (url.to_string(), s.as_str().to_string());
        self.keyed.contains(&key(status)) || self.keyed.contains(&key(RecordStatus::Success))
    }
}

/// Append every local record whose (url, status) is absent from `sheet`, `batch_size`
/// rows per call. An unreadable sheet aborts before anything is written; a
/// failed chunk stops the run, leaving earlier chunks in place.
pub async fn reconcile(
    local: &[ProcessedRecord],
    remote: &dyn SpreadsheetClient,
    sheet: &str,
    batch_size: usize,
) -> Result<ReconcileReport> {
    let rows = remote
        .read_sheet(sheet)
        .await
        .with_context(|| format!("reading target sheet {sheet}"))?;
    let present = RemoteRows::parse(&rows);

    // Failed records of a url that later succeeded locally are skipped.
    let succeeded: HashSet<&str> = local
        .iter()
        .filter(|r| r.status == RecordStatus::Success)
        .map(ProcessedRecord::url)
        .collect();
    let mut queued = HashSet::new();
    let missing: Vec<Vec<String>> = local
        .iter()
        .filter(|r| r.status == RecordStatus::Success || !succeeded.contains(r.url()))
        .filter(|r| !present.has(r.url(), r.status))
        .filter(|r| queued.insert((r.url(), r.status)))
        .map(ProcessedRecord::to_sheet_row)
        .collect();

    let mut report = ReconcileReport {
        remote_rows: rows.len().saturating_sub(1),
        missing: missing.len(),
        appended: 0,
    };
    if missing.is_empty() {
        info!(target: "sync", sheet, local = local.len(), "target sheet up to date");
        return Ok(report);
    }

    for chunk in missing.chunks(batch_size.max(1)) {
        remote
            .append_rows(sheet, chunk.to_vec())
            .await
            .with_context(|| {
                format!(
                    "appending {} rows to {sheet} ({} of {} already appended)",
                    chunk.len(),
                    report.appended,
                    report.missing
                )
            })?;
        report.appended += chunk.len();
        counter!("sync_rows_appended_total").increment(chunk.len() as u64);
    }

    info!(target: "sync", sheet, appended = report.appended, remote = report.remote_rows, "target sheet reconciled");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_column_is_found_by_header_case_insensitively() {
        let rows = vec![
            vec!["Status".into(), "first tweet url".into()],
            vec!["success".into(), " https://a ".into()],
            vec!["success".into()],
            vec!["success".into(), "".into()],
        ];
        let remote = RemoteRows::parse(&rows);
        assert_eq!(remote.urls.len(), 1);
        assert!(remote.has("https://a", RecordStatus::Success));
        assert!(!remote.has("https://b", RecordStatus::Success));
    }

    #[test]
    fn remote_failure_row_does_not_hide_a_success() {
        let rows = vec![
            vec!["STATUS".into(), "First Tweet URL".into()],
            vec!["rewrite_failed".into(), "https://a".into()],
        ];
        let remote = RemoteRows::parse(&rows);
        assert!(remote.has("https://a", RecordStatus::RewriteFailed));
        assert!(!remote.has("https://a", RecordStatus::Success));
    }

    #[test]
    fn without_status_column_the_url_alone_counts() {
        let rows = vec![vec!["First Tweet URL".into()], vec!["https://a".into()]];
        let remote = RemoteRows::parse(&rows);
        assert!(remote.has("https://a", RecordStatus::Success));
        assert!(remote.has("https://a", RecordStatus::RewriteFailed));
    }
}
