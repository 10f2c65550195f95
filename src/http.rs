//! Shared retry loop for outbound HTTP calls.
//!
//! Used by the commit fetcher and both model providers:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - other non-success statuses → fail immediately
//! - network errors (including client timeouts) → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

/// Why a request ultimately failed.
#[derive(Debug)]
pub enum HttpFailure {
    Status { status: u16, body: String },
    Network(String),
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpFailure::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            HttpFailure::Network(reason) => write!(f, "{}", reason),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// Send the request built by `build`, retrying transient failures.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by `send`. At most `max_retries + 1` requests are made.
pub async fn send_with_retry<F>(
    label: &str,
    max_retries: u32,
    build: F,
) -> Result<reqwest::Response, HttpFailure>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::debug!(label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let failure = HttpFailure::Status {
                    status: status.as_u16(),
                    body,
                };

                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(label, %status, "transient HTTP failure");
                    last_err = Some(failure);
                    continue;
                }

                return Err(failure);
            }
            Err(e) => {
                tracing::warn!(label, error = %e, "request error");
                last_err = Some(HttpFailure::Network(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| HttpFailure::Network(format!("{}: no attempt made", label))))
}

/// Build a client with the given per-request timeout.
pub fn client_with_timeout(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("commit-rag/", env!("CARGO_PKG_VERSION")))
        .build()
}
