//! Analyzer: binary entrypoint.
//! One pass: read raw sheets, filter, rewrite (EN + RU), persist locally,
//! sync to the analyzed sheet, notify. Exits non-zero only on fatal setup errors.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use content_relay::config::{PipelineConfig, TelegramConfig};
use content_relay::ingest::Platform;
use content_relay::notify::{notify_best_effort, Notifier, TelegramNotifier};
use content_relay::pipeline::{run_pass, RunSummary};
use content_relay::rewrite::{GeminiGenerator, RewriteEngine};
use content_relay::sheets::GoogleSheets;
use content_relay::state::StateStore;
use content_relay::telemetry;

#[derive(Parser, Debug)]
#[command(name = "analyzer")]
#[command(about = "Filter and rewrite collected posts, then sync them to the analyzed sheet")]
#[command(version)]
struct Cli {
    /// reddit | twitter
    #[arg(long, env = "PLATFORM")]
    platform: Platform,
}

async fn run(platform: Platform, notifier: &dyn Notifier) -> Result<RunSummary> {
    let cfg = PipelineConfig::from_env(platform).context("loading configuration")?;
    notify_best_effort(notifier, &format!("🚀 Analyzer started ({platform})")).await;

    let sheets = GoogleSheets::new(&cfg.spreadsheet_id, &cfg.sheets_access_token)
        .context("building spreadsheet client")?;
    let generator = GeminiGenerator::new(&cfg.gemini_api_key, &cfg.gemini_model)
        .context("building Gemini client")?;
    let engine = RewriteEngine::new(Arc::new(generator), &cfg.rewrite);
    let mut store = StateStore::open(&cfg.state_file)
        .await
        .with_context(|| format!("opening local state {}", cfg.state_file.display()))?;
    info!(target: "analyzer", processed = store.len(), "local state loaded");

    run_pass(&cfg, &sheets, &engine, &mut store, notifier).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let notifier = TelegramNotifier::new(&TelegramConfig::from_env());

    match run(cli.platform, &notifier).await {
        Ok(summary) => {
            info!(target: "analyzer", "{}", summary.to_string().replace('\n', "; "));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(target: "analyzer", error = %format!("{e:#}"), "analyzer aborted");
            notify_best_effort(&notifier, &format!("🚨 Analyzer ({}) aborted: {e:#}", cli.platform)).await;
            ExitCode::FAILURE
        }
    }
}
