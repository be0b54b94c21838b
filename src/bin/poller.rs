//! Poller: fetches new posts per source and appends them to the raw sheet,
//! then sleeps a randomized interval. Ctrl-C stops it between cycles.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use content_relay::config::{PlatformCredentials, PollerConfig, TelegramConfig};
use content_relay::ingest::Platform;
use content_relay::notify::{notify_best_effort, Notifier, TelegramNotifier};
use content_relay::poll::{PollLoop, RedditClient, ScrapeClient, TwitterClient};
use content_relay::sheets::GoogleSheets;
use content_relay::telemetry;

#[derive(Parser, Debug)]
#[command(name = "poller")]
#[command(about = "Poll Twitter users or subreddits and append new posts to the raw sheet")]
#[command(version)]
struct Cli {
    /// reddit | twitter
    #[arg(long, env = "PLATFORM")]
    platform: Platform,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
}

fn scraper_for(cfg: &PollerConfig) -> Result<Box<dyn ScrapeClient>> {
    Ok(match &cfg.credentials {
        PlatformCredentials::Twitter { bearer_token } => {
            Box::new(TwitterClient::new(bearer_token.clone()).context("building Twitter client")?)
        }
        PlatformCredentials::Reddit { client_id, client_secret, user_agent } => Box::new(
            RedditClient::new(client_id.clone(), client_secret.clone(), user_agent)
                .context("building Reddit client")?,
        ),
    })
}

async fn run(cli: &Cli, notifier: &dyn Notifier) -> Result<()> {
    let cfg = PollerConfig::from_env(cli.platform).context("loading configuration")?;
    let scraper = scraper_for(&cfg)?;
    let sheets = GoogleSheets::new(&cfg.spreadsheet_id, &cfg.sheets_access_token)
        .context("building spreadsheet client")?;

    let mut poll = PollLoop::new(&cfg, scraper.as_ref(), &sheets, notifier).await?;
    notify_best_effort(
        notifier,
        &format!("🚀 Poller started ({}, {} sources)", cli.platform, cfg.sources.len()),
    )
    .await;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: "poller", "shutdown requested, finishing current cycle");
                let _ = tx.send(true);
            }
            Err(e) => {
                warn!(target: "poller", error = %e, "cannot listen for Ctrl-C");
                // park with the sender alive: a closed channel would stop the loop
                std::future::pending::<()>().await
            }
        }
    });

    poll.run(cli.once, rx).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let notifier = TelegramNotifier::new(&TelegramConfig::from_env());

    match run(&cli, &notifier).await {
        Ok(()) => {
            notify_best_effort(&notifier, &format!("🛑 Poller stopped ({})", cli.platform)).await;
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(target: "poller", error = %format!("{e:#}"), "poller aborted");
            notify_best_effort(&notifier, &format!("🚨 Poller ({}) aborted: {e:#}", cli.platform)).await;
            ExitCode::FAILURE
        }
    }
}
