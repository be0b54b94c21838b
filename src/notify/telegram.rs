use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::Notifier;
use crate::config::TelegramConfig;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    /// `None` when token or chat id is missing: every send is a no-op.
    target: Option<(String, String)>,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Self {
        let target = match (&cfg.bot_token, &cfg.chat_id) {
            (Some(t), Some(c)) => Some((t.clone(), c.clone())),
            _ => None,
        };
        Self {
            target,
            client: Client::new(),
            base_url: API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let Some((token, chat_id)) = &self.target else {
            tracing::debug!(target: "notify", "Telegram disabled (no TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID)");
            return Ok(());
        };
        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let payload = SendMessage {
            chat_id,
            text: message,
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(_) => return Ok(()),
                    // the token is part of the url; keep it out of the error
                    Err(e) => anyhow!("Telegram HTTP error: {}", e.without_url()),
                },
                Err(e) => anyhow!("Telegram request failed: {}", e.without_url()),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_notifier_is_a_noop() {
        let n = TelegramNotifier::new(&TelegramConfig {
            bot_token: Some("t".into()),
            chat_id: None,
        });
        assert!(!n.is_enabled());
        assert!(n.send("hello").await.is_ok());
    }
}
