//! Logging and metric descriptors shared by both binaries.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Events carry per-subsystem targets rather than module paths, so each is listed.
const DEFAULT_FILTER: &str = "content_relay=info,analyzer=info,poller=info,pipeline=info,ingest=info,\
rewrite=info,state=info,sync=info,sheets=info,poll=info,notify=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LOG_FORMAT=json` switches to one JSON object per line.
/// Safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_fetched_total", "Content items read from source sheets.");
        describe_counter!("pipeline_rows_dropped_total", "Source rows dropped as unusable.");
        describe_counter!("filter_rejected_total", "Items rejected by the content filter, by reason.");
        describe_counter!("filter_accepted_total", "Items admitted for rewriting.");
        describe_counter!("rewrite_calls_total", "Generation calls issued (attempts included).");
        describe_counter!("rewrite_retries_total", "Generation attempts retried after a transient error.");
        describe_counter!("rewrite_failures_total", "Languages that ended without text.");
        describe_histogram!("rewrite_call_ms", "Generation call latency in milliseconds.");
        describe_counter!("store_appends_total", "Records durably appended to local state.");
        describe_counter!("sync_rows_appended_total", "Rows appended to the target sheet.");
        describe_counter!("poll_items_fetched_total", "Items fetched from scrape sources.");
        describe_counter!("poll_source_errors_total", "Sources that failed during a poll cycle.");
        describe_gauge!("poll_last_cycle_ts", "Unix ts when the last poll cycle finished.");
    });
}
