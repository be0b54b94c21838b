// src/rewrite/client.rs
//! Generation provider seam plus a scripted provider for tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("rate limited")]
    RateLimited,
    #[error("timed out")]
    Timeout,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rejected by content policy: {0}")]
    PolicyRejected(String),
}

impl GenerateError {
    /// Worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerateError::RateLimited | GenerateError::Timeout | GenerateError::Unavailable(_)
        )
    }
}

/// One text generation call. `style` is the system instruction, `prompt` the user turn.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, style: &str) -> Result<String, GenerateError>;

    fn name(&self) -> &'static str;
}

type Responder = dyn Fn(&str, usize) -> Result<String, GenerateError> + Send + Sync;

/// Answers from a closure `(prompt, call_index) -> result`.
/// Counts calls and the peak number of concurrent calls.
#[derive(Clone)]
pub struct ScriptedGenerator {
    responder: Arc<Responder>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, GenerateError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always returns `text`.
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _style: &str) -> Result<String, GenerateError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let out = (self.responder)(prompt, idx);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GenerateError::RateLimited.is_transient());
        assert!(GenerateError::Timeout.is_transient());
        assert!(GenerateError::Unavailable("503".into()).is_transient());
        assert!(!GenerateError::InvalidInput("bad".into()).is_transient());
        assert!(!GenerateError::PolicyRejected("SAFETY".into()).is_transient());
    }
}
