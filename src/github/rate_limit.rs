//! Rate limit tracking for GitHub API responses.
//!
//! GitHub discloses the remaining call budget of the current window through
//! the `X-RateLimit-*` headers on every response. [`RateLimitTracker`] keeps
//! the most recent window for one client and decides whether a rate-limited
//! response should be retried after a bounded wait or surfaced as
//! [`GitHubError::RateLimitExceeded`](super::GitHubError::RateLimitExceeded).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::warn;

use crate::telemetry::{NoopTelemetrySink, TelemetryEvent, TelemetrySink};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Remaining calls below which a warning is emitted.
pub const LOW_WATER_MARK: u32 = 10;

/// Longest wait the client accepts before giving up on a rate-limited call.
pub const DEFAULT_RETRY_HORIZON: Duration = Duration::from_secs(300);

/// Rate limit information extracted from GitHub API response headers.
///
/// # Example
///
/// ```
/// use devsync_github::github::rate_limit::RateLimitInfo;
///
/// let info = RateLimitInfo::new(5000, 4999, 1700000000);
/// assert!(!info.is_exhausted());
/// assert_eq!(info.remaining(), 4999);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the current window.
    limit: u32,
    /// Remaining requests in the current window.
    remaining: u32,
    /// Unix timestamp when the rate limit resets.
    reset_at: u64,
}

impl RateLimitInfo {
    /// Creates a new rate limit info instance.
    #[must_use]
    pub const fn new(limit: u32, remaining: u32, reset_at: u64) -> Self {
        Self {
            limit,
            remaining,
            reset_at,
        }
    }

    /// Reads the window from response headers.
    ///
    /// Returns `None` unless both `X-RateLimit-Remaining` and
    /// `X-RateLimit-Reset` are present and numeric. A missing limit header
    /// falls back to the remaining count.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_number::<u32>(headers, REMAINING_HEADER)?;
        let reset_at = header_number::<u64>(headers, RESET_HEADER)?;
        let limit = header_number::<u32>(headers, LIMIT_HEADER).unwrap_or(remaining);
        Some(Self::new(limit, remaining, reset_at))
    }

    /// Returns the maximum requests allowed in the current window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the remaining requests in the current window.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns the Unix timestamp when the rate limit resets.
    #[must_use]
    pub const fn reset_at(&self) -> u64 {
        self.reset_at
    }

    /// Returns the reset instant as a UTC timestamp.
    #[must_use]
    pub fn reset_time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.reset_at)
            .ok()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
    }

    /// Returns true if the rate limit has been exhausted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Calculates seconds until the rate limit resets.
    ///
    /// Returns 0 if the reset time has already passed or if the system time
    /// cannot be determined.
    #[must_use]
    pub fn seconds_until_reset(&self) -> u64 {
        self.seconds_until_reset_at(now_unix_seconds())
    }

    /// Calculates seconds until the rate limit resets, relative to `now_unix`.
    #[must_use]
    pub const fn seconds_until_reset_at(&self, now_unix: u64) -> u64 {
        self.reset_at.saturating_sub(now_unix)
    }
}

/// Outcome of inspecting a response for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The response was not a rate limit refusal.
    NotRateLimited,
    /// Sleep for the given duration, then retry the call once.
    WaitAndRetry(Duration),
    /// The window resets too far in the future (or is unknown); fail the call.
    GiveUp,
}

/// Holds the most recent rate limit window of one client.
///
/// The window sits behind a mutex so that workers sharing a client never lose
/// updates. No lock is held while a caller sleeps.
pub struct RateLimitTracker {
    window: Mutex<Option<RateLimitInfo>>,
    horizon: Duration,
    telemetry: RwLock<Arc<dyn TelemetrySink>>,
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RateLimitTracker")
            .field("window", &*self.window.lock())
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_HORIZON, Arc::new(NoopTelemetrySink))
    }
}

impl RateLimitTracker {
    /// Creates a tracker that accepts waits shorter than `horizon`.
    #[must_use]
    pub fn new(horizon: Duration, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            window: Mutex::new(None),
            horizon,
            telemetry: RwLock::new(telemetry),
        }
    }

    /// Routes future signals to `telemetry`, keeping the observed window.
    pub fn set_telemetry(&self, telemetry: Arc<dyn TelemetrySink>) {
        *self.telemetry.write() = telemetry;
    }

    /// Returns the most recently observed window.
    #[must_use]
    pub fn current(&self) -> Option<RateLimitInfo> {
        *self.window.lock()
    }

    /// Records the window disclosed by a response.
    ///
    /// Emits [`TelemetryEvent::RateLimitLow`] and a warning when fewer than
    /// [`LOW_WATER_MARK`] calls remain. The current call is never interrupted.
    pub fn observe(&self, headers: &HeaderMap) -> Option<RateLimitInfo> {
        let info = RateLimitInfo::from_headers(headers)?;
        *self.window.lock() = Some(info);

        if info.remaining() < LOW_WATER_MARK {
            warn!(
                remaining = info.remaining(),
                reset_at = info.reset_at(),
                "GitHub rate limit budget is nearly exhausted"
            );
            self.telemetry.read().record(TelemetryEvent::RateLimitLow {
                remaining: info.remaining(),
                reset_at: info.reset_at(),
            });
        }

        Some(info)
    }

    /// Decides whether a response should be retried after a bounded sleep.
    #[must_use]
    pub fn should_retry_after_rate_limited(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &str,
    ) -> RateLimitDecision {
        self.should_retry_after_rate_limited_at(status, headers, body, now_unix_seconds())
    }

    /// Same as [`Self::should_retry_after_rate_limited`] with an explicit
    /// clock reading.
    ///
    /// The wait comes from the refused response's own headers, never from the
    /// shared window, which a concurrent call may already have replaced.
    #[must_use]
    pub fn should_retry_after_rate_limited_at(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &str,
        now_unix: u64,
    ) -> RateLimitDecision {
        if !is_rate_limited(status, headers, body) {
            return RateLimitDecision::NotRateLimited;
        }

        let wait_seconds = RateLimitInfo::from_headers(headers)
            .filter(RateLimitInfo::is_exhausted)
            .map(|info| info.seconds_until_reset_at(now_unix))
            .or_else(|| header_number::<u64>(headers, RETRY_AFTER_HEADER));

        match wait_seconds.map(Duration::from_secs) {
            Some(wait) if wait < self.horizon => RateLimitDecision::WaitAndRetry(wait),
            _ => RateLimitDecision::GiveUp,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GitHubMessage {
    message: Option<String>,
    documentation_url: Option<String>,
}

/// Checks whether a response is a rate limit refusal based on the HTTP status
/// and the message, documentation URL, or exhausted budget header.
#[must_use]
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap, body: &str) -> bool {
    if !matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) {
        return false;
    }

    let parsed: GitHubMessage = serde_json::from_str(body).unwrap_or_default();
    let message_indicates_rate_limit = parsed
        .message
        .as_deref()
        .unwrap_or(body)
        .to_lowercase()
        .contains("rate limit")
        || parsed
            .documentation_url
            .as_deref()
            .is_some_and(|url| url.contains("rate-limit"));

    let budget_exhausted = header_number::<u32>(headers, REMAINING_HEADER) == Some(0);

    message_indicates_rate_limit || budget_exhausted
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse::<T>().ok())
}

pub(crate) fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
