//! Error types exposed by the GitHub integration core.

use thiserror::Error;

use super::rate_limit::RateLimitInfo;

/// Errors surfaced by the OAuth handshake and the GitHub REST client.
///
/// Messages never contain access tokens, client secrets, or authorization
/// codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitHubError {
    /// The OAuth `state` value could not be decoded.
    #[error("invalid OAuth state: {reason}")]
    InvalidState {
        /// Why the state was rejected.
        reason: String,
    },

    /// The authorization code could not be exchanged for a credential.
    #[error("GitHub token exchange failed: {message}")]
    AuthExchangeFailed {
        /// Failure detail (HTTP status or GitHub error code).
        message: String,
    },

    /// Networking failed and the bounded retries were exhausted.
    #[error("network error talking to GitHub: {message}")]
    TransientNetwork {
        /// Transport-level error detail.
        message: String,
    },

    /// GitHub rate limited the request beyond the bounded retry horizon.
    #[error("GitHub API rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Most recent rate limit window, when GitHub disclosed one.
        rate_limit: Option<RateLimitInfo>,
        /// Description of the refusal.
        message: String,
    },

    /// GitHub answered with a status that is neither success nor retryable.
    #[error("GitHub API returned status {status}{}", format_body(.body.as_deref()))]
    PermanentApi {
        /// HTTP status code.
        status: u16,
        /// Truncated response body; only populated outside production.
        body: Option<String>,
    },

    /// A successful response carried a body that could not be decoded.
    #[error("GitHub response could not be parsed: {message}")]
    Parse {
        /// Decoder error detail.
        message: String,
    },

    /// The caller cancelled the request or its pending backoff.
    #[error("GitHub request cancelled")]
    Cancelled,

    /// Required configuration is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// A repository reference did not match `owner/repo`.
    #[error("repository must be written as owner/repo: {value}")]
    InvalidRepository {
        /// The rejected input.
        value: String,
    },

    /// The access token was blank.
    #[error("access token is required")]
    MissingToken,

    /// Writing operator output failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail.
        message: String,
    },
}

fn format_body(body: Option<&str>) -> String {
    body.map_or_else(String::new, |text| format!(": {text}"))
}

impl GitHubError {
    /// Returns true when the failure was caused by the transport and may
    /// succeed if the caller tries again later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }

    /// Returns true when GitHub reported that the resource does not exist or
    /// is not visible to the credential.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::PermanentApi { status: 404, .. })
    }
}
