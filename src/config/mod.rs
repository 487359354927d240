//! Integration configuration loaded from CLI, environment, and files.
//!
//! # Precedence
//!
//! Configuration values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – github.com endpoints, `repo user` scope, 10 second
//!    timeout, 300/300/600 second cache lifetimes
//! 2. **Configuration file** – `.devsync-github.toml` in the current
//!    directory, home directory, or XDG config directory
//! 3. **Environment variables** – `DEVSYNC_CLIENT_ID`, `DEVSYNC_CLIENT_SECRET`,
//!    `DEVSYNC_REDIRECT_URI`, ... with legacy fallbacks to `GITHUB_CLIENT_ID`,
//!    `GITHUB_CLIENT_SECRET`, `GITHUB_REDIRECT_URI`, and `GITHUB_TOKEN`
//! 4. **Command-line arguments** – `--client-id`, `--user-id`/`-u`, ...
//!
//! # Configuration File
//!
//! ```toml
//! client_id = "Iv1.0123456789abcdef"
//! client_secret = "0123456789abcdef0123456789abcdef01234567"
//! redirect_uri = "https://devsync.example/api/github/callback"
//! scope = "repo user"
//! api_base_url = "https://api.github.com"
//! request_timeout_seconds = 10
//! production = true
//! ```

use std::env;
use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::github::cache::CachePolicy;
use crate::github::client::{ClientConfig, DEFAULT_API_BASE_URL};
use crate::github::error::GitHubError;
use crate::github::locator::AccessToken;
use crate::github::oauth::{DEFAULT_AUTHORIZE_BASE_URL, OAuthSettings};

/// What the operator CLI has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Print the authorize URL for a user.
    AuthorizationUrl,
    /// Complete a callback from `code` and `state`.
    CompleteCallback,
    /// Inspect the account behind an access token.
    InspectAccount,
    /// Nothing actionable was supplied.
    Usage,
}

/// Configuration for the GitHub integration.
///
/// # Example
///
/// ```no_run
/// use devsync_github::GitHubIntegrationConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = GitHubIntegrationConfig::load().expect("failed to load configuration");
/// let settings = config.oauth_settings().expect("OAuth application must be configured");
/// ```
#[derive(Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "DEVSYNC",
    discovery(
        dotfile_name = ".devsync-github.toml",
        config_file_name = "devsync-github.toml",
        app_name = "devsync-github"
    )
)]
pub struct GitHubIntegrationConfig {
    /// OAuth application client identifier (`GITHUB_CLIENT_ID` as fallback).
    #[ortho_config()]
    pub client_id: Option<String>,

    /// OAuth application client secret (`GITHUB_CLIENT_SECRET` as fallback).
    #[ortho_config()]
    pub client_secret: Option<String>,

    /// Registered callback URL (`GITHUB_REDIRECT_URI` as fallback).
    #[ortho_config()]
    pub redirect_uri: Option<String>,

    /// Space or comma separated OAuth scopes.
    #[ortho_config()]
    pub scope: String,

    /// Web host serving the OAuth endpoints.
    #[ortho_config()]
    pub authorize_base_url: String,

    /// REST API root.
    #[ortho_config()]
    pub api_base_url: String,

    /// Per-request timeout, in seconds.
    #[ortho_config()]
    pub request_timeout_seconds: u64,

    /// Cache lifetime for the user profile, in seconds.
    #[ortho_config()]
    pub profile_cache_ttl_seconds: u64,

    /// Cache lifetime for repository, issue, and pull request listings, in
    /// seconds.
    #[ortho_config()]
    pub list_cache_ttl_seconds: u64,

    /// Cache lifetime for single repository lookups, in seconds.
    #[ortho_config()]
    pub repository_cache_ttl_seconds: u64,

    /// Hides GitHub response bodies from errors.
    ///
    /// Note: `ortho_config` does not load boolean values from the
    /// environment; use the file or `--production`.
    #[ortho_config()]
    pub production: bool,

    /// Application user to build an authorize URL for.
    #[ortho_config(cli_short = 'u')]
    pub user_id: Option<String>,

    /// Authorization code from the callback.
    #[ortho_config()]
    pub code: Option<String>,

    /// `state` value from the callback.
    #[ortho_config()]
    pub state: Option<String>,

    /// Access token to inspect (`GITHUB_TOKEN` as fallback).
    #[ortho_config(cli_short = 't')]
    pub token: Option<String>,
}

const DEFAULT_SCOPE: &str = "repo user";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_LIST_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_PROFILE_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_REPOSITORY_CACHE_TTL_SECONDS: u64 = 600;

impl Default for GitHubIntegrationConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scope: DEFAULT_SCOPE.to_owned(),
            authorize_base_url: DEFAULT_AUTHORIZE_BASE_URL.to_owned(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            profile_cache_ttl_seconds: DEFAULT_PROFILE_CACHE_TTL_SECONDS,
            list_cache_ttl_seconds: DEFAULT_LIST_CACHE_TTL_SECONDS,
            repository_cache_ttl_seconds: DEFAULT_REPOSITORY_CACHE_TTL_SECONDS,
            production: false,
            user_id: None,
            code: None,
            state: None,
            token: None,
        }
    }
}

fn redacted(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "<redacted>")
}

impl fmt::Debug for GitHubIntegrationConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GitHubIntegrationConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(self.client_secret.as_ref()))
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("authorize_base_url", &self.authorize_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("profile_cache_ttl_seconds", &self.profile_cache_ttl_seconds)
            .field("list_cache_ttl_seconds", &self.list_cache_ttl_seconds)
            .field(
                "repository_cache_ttl_seconds",
                &self.repository_cache_ttl_seconds,
            )
            .field("production", &self.production)
            .field("user_id", &self.user_id)
            .field("code", &redacted(self.code.as_ref()))
            .field("state", &self.state)
            .field("token", &redacted(self.token.as_ref()))
            .finish()
    }
}

fn configured_or_legacy(value: Option<&String>, legacy_variable: &str) -> Option<String> {
    value
        .cloned()
        .or_else(|| env::var(legacy_variable).ok())
        .filter(|text| !text.trim().is_empty())
}

fn missing(field: &str, variable: &str, legacy: &str) -> GitHubError {
    GitHubError::Configuration {
        message: format!("{field} is required (set {variable} or {legacy})"),
    }
}

impl GitHubIntegrationConfig {
    /// Scopes parsed from [`Self::scope`].
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .split(|character: char| character.is_whitespace() || character == ',')
            .filter(|scope| !scope.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Builds the OAuth application settings.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::Configuration`] when the client id, client
    /// secret, or redirect URI cannot be resolved from any source.
    pub fn oauth_settings(&self) -> Result<OAuthSettings, GitHubError> {
        let client_id = configured_or_legacy(self.client_id.as_ref(), "GITHUB_CLIENT_ID")
            .ok_or_else(|| missing("client id", "DEVSYNC_CLIENT_ID", "GITHUB_CLIENT_ID"))?;
        let client_secret =
            configured_or_legacy(self.client_secret.as_ref(), "GITHUB_CLIENT_SECRET").ok_or_else(
                || missing("client secret", "DEVSYNC_CLIENT_SECRET", "GITHUB_CLIENT_SECRET"),
            )?;
        let redirect_uri = configured_or_legacy(self.redirect_uri.as_ref(), "GITHUB_REDIRECT_URI")
            .ok_or_else(|| missing("redirect URI", "DEVSYNC_REDIRECT_URI", "GITHUB_REDIRECT_URI"))?;

        Ok(OAuthSettings::new(client_id, client_secret, redirect_uri)
            .with_authorize_base_url(self.authorize_base_url.as_str())
            .with_scopes(self.scopes())
            .with_timeout(self.request_timeout()))
    }

    /// Builds the REST client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.request_timeout(),
            include_error_bodies: !self.production,
            cache_policy: CachePolicy {
                profile_ttl: Duration::from_secs(self.profile_cache_ttl_seconds),
                list_ttl: Duration::from_secs(self.list_cache_ttl_seconds),
                repository_ttl: Duration::from_secs(self.repository_cache_ttl_seconds),
            },
            ..ClientConfig::for_api_base(self.api_base_url.as_str())
        }
    }

    /// Resolves the access token from configuration or the legacy
    /// `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::MissingToken`] when no source provides a value.
    pub fn resolve_token(&self) -> Result<AccessToken, GitHubError> {
        configured_or_legacy(self.token.as_ref(), "GITHUB_TOKEN")
            .ok_or(GitHubError::MissingToken)
            .and_then(AccessToken::new)
    }

    /// Determines the operation mode from the supplied inputs.
    ///
    /// A complete callback (`code` and `state`) wins over a token, which wins
    /// over a user id.
    #[must_use]
    pub const fn operation_mode(&self) -> OperationMode {
        if self.code.is_some() && self.state.is_some() {
            OperationMode::CompleteCallback
        } else if self.token.is_some() {
            OperationMode::InspectAccount
        } else if self.user_id.is_some() {
            OperationMode::AuthorizationUrl
        } else {
            OperationMode::Usage
        }
    }

    const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests;
