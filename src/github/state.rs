//! Stateless OAuth `state` values.
//!
//! The state round-tripped through the GitHub redirect is a URL-safe base64
//! encoding of a compact JSON object carrying the initiating user's public
//! identifier, a random nonce, and the issue time. Decoding needs no server
//! side storage, so any replica can complete a callback.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rand::RngCore as _;
use serde::{Deserialize, Serialize};

use super::error::GitHubError;

/// Nonce length in bytes (128 bits of entropy).
const NONCE_BYTES: usize = 16;

/// How long a state stays acceptable for [`decode_fresh_state`] by default.
pub const DEFAULT_STATE_MAX_AGE: Duration = Duration::from_secs(600);

/// URL-safe decoder that tolerates both padded and unpadded input.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Public identifier of the user who started the authorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawUserId", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Wraps an identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Identifiers arrive as text from this crate and as integers from older
/// encoders; both normalise to text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawUserId> for UserId {
    fn from(raw: RawUserId) -> Self {
        match raw {
            RawUserId::Text(text) => Self(text),
            RawUserId::Unsigned(number) => Self(number.to_string()),
            RawUserId::Signed(number) => Self(number.to_string()),
        }
    }
}

/// Decoded content of an OAuth `state` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    user_id: UserId,
    nonce: String,
    issued_at_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    user_id: Option<UserId>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default, alias = "timestamp")]
    issued_at: Option<u64>,
}

impl OAuthState {
    /// Creates a state for `user_id` with a fresh random nonce.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            nonce: fresh_nonce(),
            issued_at_ms: Some(now_unix_millis()),
        }
    }

    /// Returns the user who started the authorization.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the random nonce.
    #[must_use]
    pub const fn nonce(&self) -> &str {
        self.nonce.as_str()
    }

    /// Returns the issue time in Unix milliseconds, when recorded.
    #[must_use]
    pub const fn issued_at_ms(&self) -> Option<u64> {
        self.issued_at_ms
    }

    /// Serialises the state to compact JSON and encodes it as unpadded
    /// URL-safe base64.
    #[must_use]
    pub fn encode(&self) -> String {
        let payload = serde_json::json!({
            "userId": self.user_id.as_str(),
            "nonce": self.nonce,
            "issuedAt": self.issued_at_ms,
        });
        URL_SAFE_NO_PAD.encode(payload.to_string())
    }

    /// Decodes a state produced by [`OAuthState::encode`].
    ///
    /// Standard-alphabet and padded input is accepted as well, so states
    /// produced by a browser `btoa` call decode too.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidState`] when the value is not base64,
    /// does not contain JSON, or lacks a non-empty `userId`.
    pub fn decode(state: &str) -> Result<Self, GitHubError> {
        let normalised: String = state
            .trim()
            .chars()
            .map(|character| match character {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();

        let bytes = LENIENT_URL_SAFE
            .decode(normalised.as_bytes())
            .map_err(|error| invalid_state(format!("not base64: {error}")))?;

        let raw: RawState = serde_json::from_slice(&bytes)
            .map_err(|error| invalid_state(format!("not JSON: {error}")))?;

        let user_id = raw
            .user_id
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or_else(|| invalid_state("userId is missing".to_owned()))?;

        Ok(Self {
            user_id,
            nonce: raw.nonce.unwrap_or_default(),
            issued_at_ms: raw.issued_at,
        })
    }
}

/// Encodes a fresh state for `user_id`.
#[must_use]
pub fn encode_state(user_id: &UserId) -> String {
    OAuthState::new(user_id.clone()).encode()
}

/// Recovers the initiating user from a state value.
///
/// Decoding is pure: nothing is looked up or invalidated.
///
/// # Errors
///
/// Returns [`GitHubError::InvalidState`] for malformed input.
pub fn decode_state(state: &str) -> Result<UserId, GitHubError> {
    OAuthState::decode(state).map(|decoded| decoded.user_id)
}

/// Recovers the initiating user and rejects states older than `max_age`.
///
/// `now_ms` is the current Unix time in milliseconds.
///
/// # Errors
///
/// Returns [`GitHubError::InvalidState`] for malformed input, for states
/// without an issue time, and for expired states.
pub fn decode_fresh_state(
    state: &str,
    max_age: Duration,
    now_ms: u64,
) -> Result<UserId, GitHubError> {
    let decoded = OAuthState::decode(state)?;
    let issued_at = decoded
        .issued_at_ms
        .ok_or_else(|| invalid_state("state carries no issue time".to_owned()))?;

    let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
    if now_ms.saturating_sub(issued_at) > max_age_ms {
        return Err(invalid_state("state has expired".to_owned()));
    }

    Ok(decoded.user_id)
}

/// Current Unix time in milliseconds.
#[must_use]
pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

const fn invalid_state(reason: String) -> GitHubError {
    GitHubError::InvalidState { reason }
}
