//! Rate-limit handling at the flow transport layer.
//!
//! The transport retries a rate-limited round indefinitely; *when* it is safe
//! to retry is owned by an injected [`RateLimitStrategy`]. The default
//! strategy sleeps until the window reset the endpoint advertises.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::warn;

use crate::flow::FlowRequest;

/// Context handed to a rate-limit strategy when the endpoint throttles.
#[derive(Debug)]
pub struct RateLimitEvent<'a> {
    /// Redacted projection of the throttled request
    pub request: FlowRequest,

    /// Status of the throttling response (429 or equivalent)
    pub status: StatusCode,

    /// Response headers, including any rate-limit window metadata
    pub headers: &'a HeaderMap,

    /// How many times this request has been throttled so far, starting at 1
    pub attempt: u32,
}

/// Externally supplied throttling policy.
///
/// `backoff` returns once it is safe to resubmit the triggering request. It
/// may suspend for an unbounded amount of wall-clock time; callers that need
/// an upper bound apply their own timeout around the login attempt.
#[async_trait]
pub trait RateLimitStrategy: Send + Sync {
    async fn backoff(&self, event: &RateLimitEvent<'_>);
}

/// Rate limit window metadata from `x-rate-limit-*` response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    /// Maximum number of requests allowed in the window
    pub limit: Option<u32>,

    /// Remaining requests in the current window
    pub remaining: Option<u32>,

    /// Unix timestamp when the rate limit resets
    pub reset: Option<u64>,
}

impl RateLimitInfo {
    /// Parse rate limit info from response headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_number(headers, "x-rate-limit-limit"),
            remaining: header_number(headers, "x-rate-limit-remaining"),
            reset: header_number(headers, "x-rate-limit-reset"),
        }
    }

    /// Check if the window is exhausted (remaining == 0).
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Get the duration until the window resets.
    #[must_use]
    pub fn time_until_reset(&self) -> Option<Duration> {
        let reset = self.reset?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();

        if reset > now {
            Some(Duration::from_secs(reset - now))
        } else {
            None
        }
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Default strategy: sleep until the advertised window reset.
///
/// Falls back to a fixed delay when the reset header is absent or already in
/// the past, and caps a single wait so a garbage reset timestamp cannot park
/// the login for hours.
#[derive(Debug, Clone)]
pub struct WaitUntilReset {
    /// Delay used when no usable reset timestamp is present
    pub fallback: Duration,

    /// Upper bound for a single wait
    pub max_wait: Duration,
}

impl WaitUntilReset {
    #[must_use]
    pub const fn new(fallback: Duration, max_wait: Duration) -> Self {
        Self { fallback, max_wait }
    }
}

impl Default for WaitUntilReset {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(15 * 60))
    }
}

#[async_trait]
impl RateLimitStrategy for WaitUntilReset {
    async fn backoff(&self, event: &RateLimitEvent<'_>) {
        let info = RateLimitInfo::from_headers(event.headers);
        let delay = info
            .time_until_reset()
            .unwrap_or(self.fallback)
            .min(self.max_wait);

        warn!(
            attempt = event.attempt,
            delay_ms = delay.as_millis() as u64,
            reset = ?info.reset,
            "rate limited by flow endpoint, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
