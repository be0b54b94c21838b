//! Chat notifications: start, fatal error and end-of-run summaries.
//! Delivery is best effort; a failed send is logged and never propagated.

pub mod telegram;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

pub use telegram::TelegramNotifier;

/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const TRUNCATION_MARK: &str = "\n… (truncated)";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Drops every message.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Keeps sent messages in memory. Handy in tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send records the message, then fails.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        if let Ok(mut m) = self.sent.lock() {
            m.push(message.to_string());
        }
        if self.fail {
            anyhow::bail!("notifier configured to fail");
        }
        Ok(())
    }
}

/// Cut `message` to at most `MAX_MESSAGE_CHARS` chars, marking the cut.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARK.chars().count();
    let mut out: String = message.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARK);
    out
}

/// Send and swallow the error.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    let msg = truncate_message(message);
    if let Err(e) = notifier.send(&msg).await {
        tracing::warn!(target: "notify", error = %e, "notification not delivered");
    }
}
