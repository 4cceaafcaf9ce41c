//! HTTP retry helpers for transient errors.
//!
//! Every endpoint in [`crate::client`] goes through [`send_json`] instead
//! of calling `reqwest::RequestBuilder::send()` directly, so each request
//! gets automatic retry with exponential backoff for transient failures
//! (timeouts, connection resets, server errors, rate limiting) and the
//! same status classification.
//!
//! ```ignore
//! let body = retry::send_json(&policy, || client.post(&url).json(&payload)).await?;
//! ```

use std::time::Duration;

use crate::ApiError;

/// Maximum length of the response body kept in errors and logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Markers that identify an upstream database outage in an error body.
const CONNECTION_REFUSED_MARKERS: &[&str] = &["econnrefused", "connection refused"];

/// How many times, and how patiently, to retry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Retries connection errors, timeouts, HTTP 429 and HTTP 5xx. Does **not**
/// retry other 4xx responses; 404 comes back as [`ApiError::NotFound`]
/// right away. A body carrying a connection-refused marker is reported as
/// [`ApiError::DatabaseUnavailable`] whatever its status, and is not
/// retried.
///
/// # Errors
///
/// Returns [`ApiError`] if the request fails after all retries, the server
/// returns a non-retryable status, or the body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(policy: &RetryPolicy, build_request: F) -> Result<serde_json::Value, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<ApiError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{} in {delay:?}...", policy.max_retries);
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && attempt < policy.max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(ApiError::Http(e));
                    continue;
                }
                return Err(ApiError::Http(e));
            }
        };

        let url = response.url().to_string();
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                if attempt < policy.max_retries {
                    log::warn!("  response body read failed for {url}: {e}");
                    last_error = Some(ApiError::Http(e));
                    continue;
                }
                return Err(ApiError::Http(e));
            }
        };

        match classify(status, &url, &text) {
            Outcome::Success => {
                return serde_json::from_str(&text).map_err(|e| {
                    log::error!(
                        "JSON parse failed.\n  url: {url}\n  status: {status}\n  \
                         parse error: {e}\n  body preview: {}",
                        preview(&text)
                    );
                    ApiError::Json(e)
                });
            }
            Outcome::Retry(err) if attempt < policy.max_retries => {
                log::warn!("  HTTP {status} from {url}");
                last_error = Some(err);
            }
            Outcome::Retry(err) | Outcome::Fail(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| ApiError::Status {
        status: 0,
        url: String::new(),
        body: "request failed after all retries".to_string(),
    }))
}

/// What to do with a response that arrived.
#[derive(Debug)]
enum Outcome {
    Success,
    Retry(ApiError),
    Fail(ApiError),
}

fn classify(status: reqwest::StatusCode, url: &str, body: &str) -> Outcome {
    if is_connection_refused(body) {
        return Outcome::Fail(ApiError::DatabaseUnavailable {
            url: url.to_string(),
        });
    }

    if status.is_success() || status.is_redirection() {
        return Outcome::Success;
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Outcome::Fail(ApiError::NotFound {
            url: url.to_string(),
        });
    }

    let err = ApiError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        body: preview(body),
    };

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Outcome::Retry(err)
    } else {
        Outcome::Fail(err)
    }
}

/// Returns `true` if `body` reports that the API could not reach its
/// database.
#[must_use]
pub fn is_connection_refused(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    CONNECTION_REFUSED_MARKERS.iter().any(|m| lower.contains(m))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() > BODY_PREVIEW_LEN {
        let mut end = BODY_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}
