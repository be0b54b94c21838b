// tests/pipeline_e2e.rs
// Full analyzer passes against an in-memory spreadsheet and a scripted generator.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{body_with, raw_reddit_sheet};
use content_relay::config::{PipelineConfig, RewriteConfig};
use content_relay::ingest::RAW_COLUMNS;
use content_relay::notify::RecordingNotifier;
use content_relay::record::{TARGET_COLUMNS, URL_COLUMN};
use content_relay::rewrite::{GenerateError, RetryPolicy, RewriteEngine, ScriptedGenerator};
use content_relay::sheets::MemorySheets;
use content_relay::{run_pass, ContentType, Platform, RecordStatus, StateStore};

const RAW: &str = "Sheet_Reddit_Raw";
const TARGET: &str = "Analyzed_Reddit";

fn config(state: &std::path::Path, min_length: usize) -> PipelineConfig {
    let mut cfg = PipelineConfig::offline(Platform::Reddit, state);
    cfg.filter = cfg.filter.with_min_length(min_length).with_keywords(["rust"]);
    cfg.rewrite = RewriteConfig {
        concurrency: 2,
        spacing: Duration::ZERO,
        retry: RetryPolicy::immediate(3),
    };
    cfg
}

/// Raw Twitter sheet: (url, minute, body) rows by one author in one conversation.
fn raw_twitter_thread(author: &str, conversation: &str, tweets: &[(&str, u32, &str)]) -> Vec<Vec<String>> {
    let mut rows = vec![RAW_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>()];
    for (url, minute, body) in tweets {
        let mut row = vec![String::new(); RAW_COLUMNS.len()];
        let mut set = |col: &str, v: String| {
            let idx = RAW_COLUMNS.iter().position(|c| *c == col).unwrap();
            row[idx] = v;
        };
        set("Platform", "twitter".into());
        set("Username", author.into());
        set("Tweet Timestamp", format!("2024-05-01 10:{minute:02}:00 UTC+0000"));
        set("Tweet Text", body.to_string());
        set("Tweet URL", url.to_string());
        set("Tweet Type", "Original Tweet".into());
        set("Conversation ID", conversation.into());
        rows.push(row);
    }
    rows
}

fn engine(generator: &ScriptedGenerator, cfg: &PipelineConfig) -> RewriteEngine {
    RewriteEngine::new(Arc::new(generator.clone()), &cfg.rewrite)
}

#[tokio::test]
async fn keyword_post_is_rewritten_stored_and_synced_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let cfg = config(&state, 200);

    let sheets = MemorySheets::new();
    let body = body_with("rust", 250);
    sheets.put(RAW, raw_reddit_sheet(&[("https://www.reddit.com/r/rust/comments/1", &body)]));
    let generator = ScriptedGenerator::fixed("rewritten");
    let notifier = RecordingNotifier::new();

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &notifier)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.rewritten_ok, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(generator.calls(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].status, RecordStatus::Success);

    // target sheet was created with the header, then got the row
    let target = sheets.rows(TARGET).unwrap();
    assert_eq!(target[0].len(), TARGET_COLUMNS.len());
    let url_idx = TARGET_COLUMNS.iter().position(|c| *c == URL_COLUMN).unwrap();
    assert_eq!(target[1][url_idx], "https://www.reddit.com/r/rust/comments/1");

    let sent = notifier.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Rewritten: 1 ok, 0 failed"));

    // second run on the unchanged source: nothing new anywhere
    drop(store);
    let mut store = StateStore::open(&state).await.unwrap();
    let again = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &notifier)
        .await
        .unwrap();
    assert_eq!(again.admitted, 0);
    assert_eq!(again.rejected.get("duplicate"), Some(&1));
    assert_eq!(again.synced, 0);
    assert_eq!(generator.calls(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(sheets.rows(TARGET).unwrap().len(), 2);
}

#[tokio::test]
async fn short_generic_post_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let cfg = config(&state, 200);

    let sheets = MemorySheets::new();
    sheets.put(RAW, raw_reddit_sheet(&[("https://r/short", &"x".repeat(140))]));
    let generator = ScriptedGenerator::fixed("unused");

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();

    assert_eq!(summary.rejected.get("too_short"), Some(&1));
    assert_eq!(generator.calls(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn failed_rewrite_is_retried_by_a_later_run_until_it_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let cfg = config(&state, 50);

    let sheets = MemorySheets::new();
    sheets.put(
        RAW,
        raw_reddit_sheet(&[
            ("https://r/ok", &body_with("rust", 120)),
            ("https://r/blocked", &body_with("rust unsafe", 120)),
        ]),
    );
    // The Russian rewrite of the "unsafe" post is refused for the first six calls overall.
    let generator = ScriptedGenerator::new(|p, idx| {
        if idx < 6 && p.contains("unsafe") && p.contains("in Russian") {
            Err(GenerateError::PolicyRejected("SAFETY".into()))
        } else {
            Ok("fine".into())
        }
    });
    let url_idx = TARGET_COLUMNS.iter().position(|c| *c == URL_COLUMN).unwrap();
    let status_idx = TARGET_COLUMNS.iter().position(|c| *c == "Status").unwrap();

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(summary.rewritten_ok, 1);
    assert_eq!(summary.rewritten_failed, 1);
    assert_eq!(summary.synced, 2);
    assert_eq!(generator.calls(), 4);

    let failed = store.records().iter().find(|r| r.url() == "https://r/blocked").unwrap();
    assert_eq!(failed.status, RecordStatus::RewriteFailed);
    assert_eq!(failed.rewritten_en, "fine");
    assert_eq!(failed.rewritten_ru, "");
    assert!(!store.contains("https://r/blocked"));

    // still refused: attempted again, but the identical failure is not stored twice
    let second = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(second.admitted, 1);
    assert_eq!(second.rejected.get("duplicate"), Some(&1));
    assert_eq!(second.rewritten_failed, 1);
    assert_eq!(second.synced, 0);
    assert_eq!(generator.calls(), 6);
    assert_eq!(store.len(), 2);

    // healthy again: the success lands next to the failure, locally and remotely
    drop(store);
    let mut store = StateStore::open(&state).await.unwrap();
    let third = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(third.admitted, 1);
    assert_eq!(third.rewritten_ok, 1);
    assert_eq!(third.synced, 1);
    assert_eq!(generator.calls(), 8);
    assert_eq!(store.len(), 3);
    assert!(store.contains("https://r/blocked"));

    let target = sheets.rows(TARGET).unwrap();
    assert_eq!(target.len(), 4);
    let blocked: Vec<&str> = target[1..]
        .iter()
        .filter(|r| r[url_idx] == "https://r/blocked")
        .map(|r| r[status_idx].as_str())
        .collect();
    assert_eq!(blocked, ["rewrite_failed", "success"]);

    let fourth = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(fourth.admitted, 0);
    assert_eq!(fourth.rejected.get("duplicate"), Some(&2));
    assert_eq!(fourth.synced, 0);
    assert_eq!(generator.calls(), 8);
}

#[tokio::test]
async fn twitter_self_thread_is_rewritten_once_without_the_reply_to_someone_else() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("twitter.jsonl");
    let mut cfg = PipelineConfig::offline(Platform::Twitter, &state);
    cfg.filter = cfg.filter.with_min_length(50).with_keywords(["rust"]);
    cfg.rewrite = config(&state, 50).rewrite;
    assert_eq!(cfg.source_sheets, ["Sheet1"]);

    let first = body_with("rust", 80);
    let second = format!("and the follow-up {}", body_with("borrowck", 60));
    let sheets = MemorySheets::new();
    // rows out of order on purpose; the reply sits between the two own tweets
    sheets.put(
        "Sheet1",
        raw_twitter_thread(
            "ferris",
            "100",
            &[
                ("https://x.com/ferris/status/102", 2, &second),
                ("https://x.com/ferris/status/101", 1, "@someone_else totally unrelated rust reply that is long enough"),
                ("https://x.com/ferris/status/100", 0, &first),
            ],
        ),
    );
    let generator = ScriptedGenerator::fixed("thread rewritten");

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.rewritten_ok, 1);
    assert_eq!(generator.calls(), 2);

    assert_eq!(store.len(), 1);
    let rec = &store.records()[0];
    assert_eq!(rec.item.content_type, ContentType::Thread);
    assert_eq!(rec.item.source_rows, 2);
    assert_eq!(rec.url(), "https://x.com/ferris/status/100");
    assert!(rec.item.body.starts_with(first.as_str()));
    assert!(rec.item.body.ends_with(second.as_str()));
    assert!(!rec.item.body.contains("someone_else"));

    // both language prompts carry the whole thread
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().all(|p| p.contains(first.as_str()) && p.contains(second.as_str())));

    let target = sheets.rows(&cfg.target_sheet).unwrap();
    assert_eq!(target.len(), 2);
    let type_idx = TARGET_COLUMNS.iter().position(|c| *c == "Content Type").unwrap();
    let rows_idx = TARGET_COLUMNS.iter().position(|c| *c == "Source Row Count").unwrap();
    assert_eq!(target[1][type_idx], "Thread");
    assert_eq!(target[1][rows_idx], "2");
}

#[tokio::test]
async fn url_repeated_within_one_batch_is_rewritten_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let cfg = config(&state, 50);

    let sheets = MemorySheets::new();
    let body = body_with("rust", 120);
    sheets.put(
        RAW,
        raw_reddit_sheet(&[("https://r/same", &body), ("https://r/same", &body)]),
    );
    let generator = ScriptedGenerator::fixed("fine");

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.rejected.get("duplicate"), Some(&1));
    assert_eq!(summary.rewritten_ok, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(generator.calls(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(sheets.rows(TARGET).unwrap().len(), 2);
}

#[tokio::test]
async fn sync_failure_is_reported_and_recovered_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let cfg = config(&state, 50);

    let sheets = MemorySheets::new();
    sheets.put(RAW, raw_reddit_sheet(&[("https://r/1", &body_with("rust", 120))]));
    let generator = ScriptedGenerator::fixed("fine");

    sheets.fail_appends_after(0);
    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(summary.rewritten_ok, 1);
    assert_eq!(summary.synced, 0);
    assert!(summary.sync_error.is_some());
    assert_eq!(store.len(), 1);

    sheets.heal_appends();
    let again = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(again.synced, 1);
    assert_eq!(generator.calls(), 2);
    assert_eq!(sheets.rows(TARGET).unwrap().len(), 2);
}

#[tokio::test]
async fn missing_source_sheet_is_skipped_but_unreadable_one_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("reddit.jsonl");
    let mut cfg = config(&state, 50);
    cfg.source_sheets = vec!["Nope".into(), RAW.into()];

    let sheets = MemorySheets::new();
    sheets.put(RAW, raw_reddit_sheet(&[("https://r/1", &body_with("rust", 120))]));
    let generator = ScriptedGenerator::fixed("fine");

    let mut store = StateStore::open(&state).await.unwrap();
    let summary = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new())
        .await
        .unwrap();
    assert_eq!(summary.fetched, 1);

    sheets.fail_reads(RAW);
    let err = run_pass(&cfg, &sheets, &engine(&generator, &cfg), &mut store, &RecordingNotifier::new()).await;
    assert!(err.is_err());
}
