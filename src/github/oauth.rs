//! GitHub OAuth2 authorization-code flow.
//!
//! [`OAuthFlow`] renders the authorize URL users are redirected to and trades
//! the single-use `code` GitHub sends back for a [`Credential`]. The exchange
//! is never retried: a used or expired code cannot succeed a second time.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::StatusCode;
use http::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::error::GitHubError;
use super::locator::AccessToken;

/// GitHub's public web host.
pub const DEFAULT_AUTHORIZE_BASE_URL: &str = "https://github.com";

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["repo", "user"];

const AUTHORIZE_PATH: &str = "/login/oauth/authorize";
const TOKEN_PATH: &str = "/login/oauth/access_token";
const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth application registration details.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// OAuth application client identifier.
    pub client_id: String,
    /// OAuth application client secret. Never logged.
    pub client_secret: String,
    /// Callback URL registered with the application.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Web host serving `/login/oauth/*`, without a trailing slash.
    pub authorize_base_url: String,
    /// Timeout applied to the token exchange request.
    pub timeout: Duration,
}

impl OAuthSettings {
    /// Creates settings for github.com with the default scopes.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
            authorize_base_url: DEFAULT_AUTHORIZE_BASE_URL.to_owned(),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Overrides the web host, for GitHub Enterprise or tests.
    #[must_use]
    pub fn with_authorize_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.authorize_base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Overrides the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the token exchange timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Token endpoint derived from the web host.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.authorize_base_url)
    }
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorize_base_url", &self.authorize_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builds the GitHub authorize URL.
///
/// Parameters are concatenated as given; the state produced by
/// [`encode_state`](super::state::encode_state) is already URL-safe.
///
/// # Example
///
/// ```
/// use devsync_github::github::oauth::build_authorization_url;
///
/// let url = build_authorization_url("https://github.com", "abc", "https://x/cb", "s1", &["repo"]);
/// assert_eq!(
///     url,
///     "https://github.com/login/oauth/authorize?client_id=abc&redirect_uri=https://x/cb&state=s1&scope=repo"
/// );
/// ```
#[must_use]
pub fn build_authorization_url<S: AsRef<str>>(
    authorize_base_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    scopes: &[S],
) -> String {
    let scope = scopes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("+");
    format!(
        "{base}{AUTHORIZE_PATH}?client_id={client_id}&redirect_uri={redirect_uri}&state={state}&scope={scope}",
        base = authorize_base_url.trim_end_matches('/'),
    )
}

/// Credential returned by a successful token exchange.
///
/// The caller owns persistence; this crate never stores it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token for API calls.
    pub access_token: AccessToken,
    /// Refresh token, issued for expiring GitHub App user tokens.
    pub refresh_token: Option<AccessToken>,
    /// Granted scopes as reported by GitHub.
    pub scope: String,
    /// Token type, normally `bearer`.
    pub token_type: String,
    /// Expiry, when GitHub reported `expires_in`.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Returns true once `expires_at` has passed. Tokens without an expiry
    /// never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("access_token", &self.access_token)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parses the token endpoint's JSON body.
///
/// # Errors
///
/// Returns [`GitHubError::AuthExchangeFailed`] when the body carries an
/// `error` field or lacks `access_token`.
pub fn parse_token_response(json: &Value, now: DateTime<Utc>) -> Result<Credential, GitHubError> {
    if let Some(error) = json.get("error").filter(|value| !value.is_null()) {
        let code = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_owned);
        let description = json
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(GitHubError::AuthExchangeFailed {
            message: format!("{code}: {description}"),
        });
    }

    let text = |field: &str| json.get(field).and_then(Value::as_str);

    let access_token = text("access_token")
        .and_then(|token| AccessToken::new(token).ok())
        .ok_or_else(|| GitHubError::AuthExchangeFailed {
            message: "response is missing access_token".to_owned(),
        })?;

    let expires_at = json
        .get("expires_in")
        .and_then(Value::as_i64)
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime));

    Ok(Credential {
        access_token,
        refresh_token: text("refresh_token").and_then(|token| AccessToken::new(token).ok()),
        scope: text("scope").unwrap_or_default().to_owned(),
        token_type: text("token_type").unwrap_or("bearer").to_owned(),
        expires_at,
    })
}

/// Exchanges an authorization code for a credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trades a single-use authorization code for a credential.
    async fn exchange_code_for_token(&self, code: &str) -> Result<Credential, GitHubError>;
}

/// Authorization-code flow bound to one OAuth application.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    settings: OAuthSettings,
    http: reqwest::Client,
}

impl OAuthFlow {
    /// Creates a flow for the given application.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::Configuration`] when the HTTP client cannot be
    /// built.
    pub fn new(settings: OAuthSettings) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| GitHubError::Configuration {
                message: format!("build HTTP client failed: {error}"),
            })?;
        Ok(Self { settings, http })
    }

    /// Returns the application settings.
    #[must_use]
    pub const fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Authorize URL for an encoded `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(
            &self.settings.authorize_base_url,
            &self.settings.client_id,
            &self.settings.redirect_uri,
            state,
            &self.settings.scopes,
        )
    }
}

#[async_trait]
impl TokenExchange for OAuthFlow {
    #[instrument(skip_all, fields(client_id = %self.settings.client_id))]
    async fn exchange_code_for_token(&self, code: &str) -> Result<Credential, GitHubError> {
        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.settings.token_url())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|error| {
                let stripped = error.without_url();
                warn!(error = %stripped, "token exchange request failed");
                GitHubError::TransientNetwork {
                    message: stripped.to_string(),
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, "token endpoint rejected the exchange");
            return Err(GitHubError::AuthExchangeFailed {
                message: format!("token endpoint returned status {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|error| {
            warn!("token endpoint returned a malformed body");
            GitHubError::AuthExchangeFailed {
                message: format!("malformed token response: {}", error.without_url()),
            }
        })?;

        let credential = parse_token_response(&body, Utc::now()).inspect_err(|error| {
            warn!(%error, "token exchange failed");
        })?;

        debug!(
            token = %credential.access_token.preview(),
            scope = %credential.scope,
            "token exchange succeeded"
        );
        Ok(credential)
    }
}
