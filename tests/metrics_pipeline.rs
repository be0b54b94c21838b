// tests/metrics_pipeline.rs
#![cfg(feature = "strict-metrics")]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{body_with, raw_reddit_sheet};
use content_relay::config::PipelineConfig;
use content_relay::notify::NoopNotifier;
use content_relay::rewrite::{RewriteEngine, ScriptedGenerator};
use content_relay::sheets::MemorySheets;
use content_relay::{run_pass, Platform, StateStore};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::test]
async fn metrics_exposed_after_a_pass() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let mut cfg = PipelineConfig::offline(Platform::Reddit, &state);
    cfg.filter = cfg.filter.with_keywords(["rust"]);
    cfg.rewrite.spacing = Duration::ZERO;

    let sheets = MemorySheets::new();
    sheets.put(
        "Sheet_Reddit_Raw",
        raw_reddit_sheet(&[("https://r/1", &body_with("rust", 120)), ("https://r/2", "too short")]),
    );
    let engine = RewriteEngine::new(Arc::new(ScriptedGenerator::fixed("ok")), &cfg.rewrite);
    let mut store = StateStore::open(&state).await.unwrap();
    run_pass(&cfg, &sheets, &engine, &mut store, &NoopNotifier).await.unwrap();

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    assert!(out.contains("pipeline_items_fetched_total"));
    assert!(out.contains("filter_rejected_total"));
    assert!(out.contains("reason=\"too_short\""));
    assert!(out.contains("rewrite_calls_total"));
    assert!(out.contains("rewrite_call_ms"));
    assert!(out.contains("store_appends_total"));
    assert!(out.contains("sync_rows_appended_total"));
}
