//! Bounded JSON-over-HTTP calls shared by the remote providers.
//!
//! Every attempt runs under [`tokio::time::timeout`]. Only a timed-out
//! attempt may be repeated, and only when `max_retries > 0`:
//! - Timeout → retry with exponential backoff, then [`RemoteFailure::Timeout`]
//! - HTTP 4xx, 429, 5xx and network errors → fail immediately
//!
//! Backoff doubles from [`RetryPolicy::base_delay`], capped at 2^5 times it.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Upper bound on a single attempt.
    pub timeout: Duration,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            base_delay: Duration::from_secs(1),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

/// Why a remote call gave up.
#[derive(Debug)]
pub enum RemoteFailure {
    Timeout(Duration),
    Failed(String),
}

impl RemoteFailure {
    /// Convert into the service error for `capability`, using `unavailable`
    /// for non-timeout failures.
    pub fn into_error(self, capability: &'static str, unavailable: fn(String) -> Error) -> Error {
        match self {
            RemoteFailure::Timeout(limit) => Error::ExternalTimeout {
                capability,
                secs: limit.as_secs(),
            },
            RemoteFailure::Failed(msg) => unavailable(msg),
        }
    }
}

/// Send the request built by `build` and decode a JSON response body.
///
/// `build` is called once per attempt since a sent request cannot be reused.
pub async fn send_json<F>(label: &str, policy: RetryPolicy, build: F) -> Result<Value, RemoteFailure>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            debug!(label, attempt, ?delay, "retrying timed-out remote call");
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.timeout, attempt_once(label, build())).await {
            Ok(result) => return result.map_err(RemoteFailure::Failed),
            Err(_) => warn!(label, attempt, timeout = ?policy.timeout, "remote call timed out"),
        }
    }

    Err(RemoteFailure::Timeout(policy.timeout))
}

async fn attempt_once(label: &str, request: reqwest::RequestBuilder) -> Result<Value, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("{} request error: {}", label, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(format!("{} API error {}: {}", label, status, body_text));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| format!("{} returned invalid JSON: {}", label, e))
}

/// Read a required API key from the environment.
pub fn api_key(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} not set", var))
}
