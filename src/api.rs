//! Generative-AI API interaction with exponential backoff retry logic.
//!
//! This module provides the interface the enrichment and translation stages
//! use to talk to the model. It includes automatic retry logic with
//! exponential backoff and jitter for rate limiting.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async prompt → text interaction
//! - [`GeminiClient`]: calls the Gemini `generateContent` endpoint
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync`
//! - [`ask_structured`]: asks and parses the reply into a typed value
//!
//! # Retry Strategy
//!
//! - HTTP 429: `min(base * 2^(attempt-1), max) + jitter`
//! - Transport errors and 5xx: fixed delay
//! - Anything else (4xx, missing key): no retry

use crate::config::AiConfig;
use crate::utils::{looks_truncated, truncate_for_log};
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Failures talking to, or understanding, the model.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API key configured for the AI endpoint")]
    MissingKey,

    #[error("invalid AI endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("rate limited by AI provider (HTTP 429)")]
    RateLimited,

    #[error("AI provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI response had no text candidate")]
    MissingText,

    #[error("AI response is not the expected JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected {expected} scored articles, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("AI response rejected: {0}")]
    Rejected(String),
}

impl AiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AiError::RateLimited)
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::RateLimited | AiError::Transport(_) | AiError::MissingText => true,
            AiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Trait for async model interaction.
///
/// Implementors send a prompt and return the model's text reply. This
/// abstraction lets the retry decorator and test doubles stand in for the
/// real endpoint.
#[allow(async_fn_in_trait)]
pub trait AskAsync {
    async fn ask(&self, prompt: &str) -> Result<String, AiError>;
}

/// Delays used by [`RetryAsk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter_max: Duration,
    /// Wait after a retryable failure that is not a rate limit.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Backoff before the attempt following failed attempt number `attempt`
    /// (1-based), without jitter.
    pub fn rate_limit_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.backoff_base
            .saturating_mul(1u32 << shift)
            .min(self.backoff_max)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rng().random_range(0..=max_ms))
    }
}

/// Wrapper that adds retry logic to any [`AskAsync`] implementation.
///
/// ```text
/// 429:       delay = min(base * 2^(attempt-1), max) + random_jitter(0..=jitter_max)
/// transient: delay = retry_delay
/// ```
pub struct RetryAsk<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &str) -> Result<String, AiError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let e = match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
            let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

            if !e.is_retryable() {
                error!(attempt, elapsed_ms_total, error = %e, "ask() failed with a permanent error");
                return Err(e);
            }
            if attempt >= self.policy.max_attempts {
                error!(
                    attempt,
                    max = self.policy.max_attempts,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    error = %e,
                    "ask() exhausted retries"
                );
                return Err(e);
            }

            let delay = if e.is_rate_limit() {
                self.policy.rate_limit_delay(attempt) + self.policy.jitter()
            } else {
                self.policy.retry_delay
            };

            warn!(
                attempt,
                max = self.policy.max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                ?delay,
                error = %e,
                "ask() attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Requests ask for a JSON response mime type; the reply text is returned
/// with any Markdown code fence stripped.
///
/// Without an API key every call fails with [`AiError::MissingKey`], which
/// fails the categories that need the model but not the run.
pub struct GeminiClient {
    http: reqwest::Client,
    url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url.as_str())
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        config: &AiConfig,
        api_key: Option<String>,
    ) -> Result<Self, AiError> {
        let url = Url::parse(&format!(
            "{}/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        ))?;
        Ok(GeminiClient {
            http,
            url,
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl AskAsync for GeminiClient {
    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingKey)?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "response_mime_type": "application/json" }
        });

        let t0 = Instant::now();
        let resp = self
            .http
            .post(self.url.clone())
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            status = status.as_u16(),
            bytes = text.len(),
            "Gemini responded"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&text, 300),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        let reply = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or(AiError::MissingText)?;
        Ok(extract_json_text(&reply))
    }
}

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("static regex")
});

/// Strip a Markdown code fence around a JSON reply, if present.
pub fn extract_json_text(reply: &str) -> String {
    match FENCED.captures(reply).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => reply.trim().to_string(),
    }
}

/// Ask the model and parse its reply as `T`.
///
/// A reply that was cut off mid-JSON is asked for once more; any other parse
/// failure is returned as [`AiError::Malformed`].
#[instrument(level = "info", skip_all)]
pub async fn ask_structured<A, T>(ai: &A, prompt: &str) -> Result<T, AiError>
where
    A: AskAsync,
    T: DeserializeOwned,
{
    let reply = ai.ask(prompt).await?;
    match serde_json::from_str::<T>(&reply) {
        Ok(v) => Ok(v),
        Err(e) if looks_truncated(&e) => {
            warn!(error = %e, "EOF while parsing; re-asking once");
            let reply = ai.ask(prompt).await?;
            serde_json::from_str::<T>(&reply).map_err(|e| {
                warn!(error = %e, response_preview = %truncate_for_log(&reply, 300), "Re-asked reply still not parseable");
                AiError::Malformed(e)
            })
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&reply, 300),
                "Model returned non-conforming JSON"
            );
            Err(AiError::Malformed(e))
        }
    }
}
