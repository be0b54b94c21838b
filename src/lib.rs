// src/lib.rs
// Public library surface for the two binaries and integration tests.

pub mod config;
pub mod filter;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod poll;
pub mod record;
pub mod rewrite;
pub mod sheets;
pub mod state;
pub mod sync;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::filter::{ContentFilter, Decision, FilterConfig, RejectReason};
pub use crate::ingest::{ContentItem, ContentType, Platform};
pub use crate::pipeline::{run_pass, RunSummary};
pub use crate::record::{ProcessedRecord, RecordStatus};
pub use crate::state::{ProcessedSet, StateStore};
pub use crate::sync::{reconcile, ReconcileReport};
