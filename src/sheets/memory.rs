// src/sheets/memory.rs
//! In-process spreadsheet for tests and dry runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{header_row, Rows, SheetError, SpreadsheetClient};

#[derive(Default)]
struct Inner {
    sheets: BTreeMap<String, Rows>,
    failing_reads: HashSet<String>,
    /// Successful append calls left before appends start failing.
    appends_budget: Option<usize>,
    append_calls: usize,
}

#[derive(Clone, Default)]
pub struct MemorySheets {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace a sheet's contents.
    pub fn put(&self, name: &str, rows: Rows) {
        self.lock().sheets.insert(name.to_string(), rows);
    }

    pub fn rows(&self, name: &str) -> Option<Rows> {
        self.lock().sheets.get(name).cloned()
    }

    /// Make `read_sheet(name)` fail with an API error.
    pub fn fail_reads(&self, name: &str) {
        self.lock().failing_reads.insert(name.to_string());
    }

    pub fn heal_reads(&self) {
        self.lock().failing_reads.clear();
    }

    /// Let `n` more append calls succeed, then fail the rest.
    pub fn fail_appends_after(&self, n: usize) {
        self.lock().appends_budget = Some(n);
    }

    pub fn heal_appends(&self) {
        self.lock().appends_budget = None;
    }

    /// Append calls that reached the sheet (successful ones only).
    pub fn append_calls(&self) -> usize {
        self.lock().append_calls
    }
}

#[async_trait]
impl SpreadsheetClient for MemorySheets {
    async fn read_sheet(&self, name: &str) -> Result<Rows, SheetError> {
        let inner = self.lock();
        if inner.failing_reads.contains(name) {
            return Err(SheetError::Api {
                status: 503,
                message: format!("read of {name} failed"),
            });
        }
        inner
            .sheets
            .get(name)
            .cloned()
            .ok_or_else(|| SheetError::NotFound(name.to_string()))
    }

    async fn append_rows(&self, name: &str, rows: Rows) -> Result<(), SheetError> {
        let mut inner = self.lock();
        if let Some(budget) = inner.appends_budget.as_mut() {
            if *budget == 0 {
                return Err(SheetError::Api {
                    status: 503,
                    message: format!("append to {name} failed"),
                });
            }
            *budget -= 1;
        }
        let sheet = inner
            .sheets
            .get_mut(name)
            .ok_or_else(|| SheetError::NotFound(name.to_string()))?;
        sheet.extend(rows);
        inner.append_calls += 1;
        Ok(())
    }

    async fn ensure_sheet_exists(&self, name: &str, header: &[&str]) -> Result<bool, SheetError> {
        let mut inner = self.lock();
        let sheet = inner.sheets.entry(name.to_string()).or_default();
        if sheet.is_empty() {
            sheet.push(header_row(header));
            return Ok(true);
        }
        Ok(false)
    }
}
