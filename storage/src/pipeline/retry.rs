use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Exponential back-off policy applied to every storage request.
///
/// The defaults mirror the Azure SDK client defaults: three retries, 800 ms
/// initial delay doubling on every attempt, capped at one minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Upper bound for any single delay, including server-provided ones
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryOptions {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next retry, preferring the server's `Retry-After`.
    pub fn delay_for_response(&self, attempt: u32, headers: &HeaderMap) -> Duration {
        retry_after(headers)
            .map(|d| d.min(self.max_delay))
            .unwrap_or_else(|| self.delay_for(attempt))
    }
}

/// Status codes the storage services document as transient.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Server-provided delay from `retry-after-ms`, `x-ms-retry-after-ms` or
/// `Retry-After` (seconds).
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = header_number(headers, name) {
            return Some(Duration::from_millis(ms));
        }
    }
    header_number(headers, RETRY_AFTER.as_str()).map(Duration::from_secs)
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
