// src/rewrite/gemini.rs
//! Gemini `generateContent` over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::client::{GenerateError, Generator};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("content-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_BASE.to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<RespContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// HTTP status → error kind.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> GenerateError {
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        429 => GenerateError::RateLimited,
        408 | 504 => GenerateError::Timeout,
        500..=599 => GenerateError::Unavailable(format!("{status}: {snippet}")),
        _ => GenerateError::InvalidInput(format!("{status}: {snippet}")),
    }
}

/// Successful response → text, or a policy rejection when the model refused.
fn extract_text(resp: Resp) -> Result<String, GenerateError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerateError::PolicyRejected(reason));
    }
    let Some(first) = resp.candidates.into_iter().next() else {
        return Err(GenerateError::PolicyRejected("no candidates".into()));
    };
    let text: String = first
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();
    let finish = first.finish_reason.unwrap_or_default();
    if !text.trim().is_empty() {
        return Ok(text.trim().to_string());
    }
    let blocked = matches!(
        finish.as_str(),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
    );
    if blocked {
        Err(GenerateError::PolicyRejected(finish))
    } else {
        Err(GenerateError::Unavailable("empty completion".into()))
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str, style: &str) -> Result<String, GenerateError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let req = Req {
            system_instruction: Content { role: None, parts: vec![Part { text: style }] },
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| GenerateError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        let parsed: Resp = serde_json::from_str(&body)
            .map_err(|e| GenerateError::Unavailable(format!("unreadable response: {e}")))?;
        extract_text(parsed)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS, ""), GenerateError::RateLimited);
        assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT, ""), GenerateError::Timeout);
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "down").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad").is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, "key").is_transient());
    }

    #[test]
    fn blocked_prompt_is_a_policy_rejection() {
        let r: Resp = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(extract_text(r), Err(GenerateError::PolicyRejected("SAFETY".into())));

        let r: Resp = serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(extract_text(r), Err(GenerateError::PolicyRejected("SAFETY".into())));
    }

    #[test]
    fn parts_are_joined_and_trimmed() {
        let r: Resp = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":" Hello "},{"text":"world\n"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(r).unwrap(), "Hello world");
    }
}
