//! Authenticated GitHub REST client with caching and bounded retries.
//!
//! Every call follows the same sequence: serve idempotent reads from the
//! [`ResponseCache`] when fresh, send the request with the bound token,
//! retry transport failures a bounded number of times, record the rate limit
//! window, wait out short rate limit refusals once, and map everything else to
//! a [`GitHubError`]. Waits are cancellable through a [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::cache::{CacheKey, CachePolicy, ResponseCache};
use super::error::GitHubError;
use super::locator::{AccessToken, RepositorySlug};
use super::models::{GitHubUser, Issue, IssueComment, ItemState, PullRequest, Repository};
use super::rate_limit::{DEFAULT_RETRY_HORIZON, RateLimitDecision, RateLimitInfo, RateLimitTracker};
use crate::telemetry::{NoopTelemetrySink, TelemetryEvent, TelemetrySink};

/// Public github.com REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Versioned JSON media type sent with every request.
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REPOSITORY_AFFILIATION: &str = "owner,collaborator,organization_member";
const ERROR_BODY_LIMIT: usize = 160;

/// Tunables for [`GitHubClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST API root, for example `https://ghe.example.com/api/v3`.
    pub api_base: String,
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
    /// Additional attempts after a connection failure or timeout.
    pub max_transient_retries: u32,
    /// Fixed delay between transport retries.
    pub transient_backoff: Duration,
    /// Rate limit waits at or beyond this duration fail immediately.
    pub rate_limit_horizon: Duration,
    /// Whether `PermanentApi` errors carry a truncated response body.
    pub include_error_bodies: bool,
    /// Cache lifetimes per operation.
    pub cache_policy: CachePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE_URL.to_owned(),
            timeout: Duration::from_secs(10),
            max_transient_retries: 2,
            transient_backoff: Duration::from_secs(1),
            rate_limit_horizon: DEFAULT_RETRY_HORIZON,
            include_error_bodies: false,
            cache_policy: CachePolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `api_base`.
    #[must_use]
    pub fn for_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }
}

/// Parses an API root and guarantees a trailing slash so relative paths
/// join beneath it.
///
/// # Errors
///
/// Returns [`GitHubError::Configuration`] for unparseable or non-HTTP URLs.
pub fn normalise_api_base(api_base: &str) -> Result<Url, GitHubError> {
    let trimmed = api_base.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|error| GitHubError::Configuration {
        message: format!("invalid API base URL {trimmed}: {error}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GitHubError::Configuration {
            message: format!("API base URL must use http or https: {trimmed}"),
        });
    }
    Ok(url)
}

/// Successful response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Json(Value),
    NoContent,
}

/// GitHub REST client bound to one access token.
///
/// Cheap to share behind an `Arc`: the cache and rate limit window are
/// internally synchronised, and no lock is held across a request or a wait.
/// Clones share both.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    token: AccessToken,
    config: ClientConfig,
    cache: Arc<ResponseCache>,
    rate_limit: Arc<RateLimitTracker>,
    telemetry: Arc<dyn TelemetrySink>,
    cancellation: CancellationToken,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GitHubClient")
            .field("token", &self.token)
            .field("config", &self.config)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::Configuration`] when the API base is invalid,
    /// the token cannot be used as a header value, or the HTTP client cannot
    /// be built.
    pub fn new(token: AccessToken, config: ClientConfig) -> Result<Self, GitHubError> {
        let api_base = normalise_api_base(&config.api_base)?;
        let mut authorization = HeaderValue::from_str(&format!("token {}", token.value()))
            .map_err(|_| GitHubError::Configuration {
                message: format!("access token {} contains invalid characters", token.preview()),
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|error| GitHubError::Configuration {
                message: format!("build HTTP client failed: {error}"),
            })?;

        let telemetry: Arc<dyn TelemetrySink> = Arc::new(NoopTelemetrySink);
        Ok(Self {
            http,
            api_base,
            token,
            rate_limit: Arc::new(RateLimitTracker::new(
                config.rate_limit_horizon,
                Arc::clone(&telemetry),
            )),
            config,
            cache: Arc::new(ResponseCache::new()),
            telemetry,
            cancellation: CancellationToken::new(),
        })
    }

    /// Shares `cache` with other clients bound to the same credential.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Routes rate limit and retry signals to `telemetry`.
    ///
    /// The observed window is kept. Earlier clones share the rate limit
    /// tracker, so their low budget signals follow the new sink too.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.rate_limit.set_telemetry(Arc::clone(&telemetry));
        self.telemetry = telemetry;
        self
    }

    /// Aborts in-flight requests and pending waits once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Most recently observed rate limit window.
    #[must_use]
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.rate_limit.current()
    }

    /// The response cache backing idempotent reads.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches the authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call.
    #[instrument(skip(self))]
    pub async fn get_user_profile(&self) -> Result<GitHubUser, GitHubError> {
        self.read("user", &[], self.config.cache_policy.profile_ttl)
            .await
    }

    /// Lists repositories the user owns, collaborates on, or reaches through
    /// an organisation, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call.
    #[instrument(skip(self))]
    pub async fn list_user_repositories(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GitHubError> {
        let page_text = page.to_string();
        let per_page_text = per_page.to_string();
        self.read(
            "user/repos",
            &[
                ("page", page_text.as_str()),
                ("per_page", per_page_text.as_str()),
                ("sort", "updated"),
                ("affiliation", REPOSITORY_AFFILIATION),
            ],
            self.config.cache_policy.list_ttl,
        )
        .await
    }

    /// Fetches one repository.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call; a missing or
    /// hidden repository is a `PermanentApi` error with status 404.
    #[instrument(skip(self, repository), fields(repository = %repository))]
    pub async fn get_repository(
        &self,
        repository: &RepositorySlug,
    ) -> Result<Repository, GitHubError> {
        self.read(
            &repository_path(repository, ""),
            &[],
            self.config.cache_policy.repository_ttl,
        )
        .await
    }

    /// Lists issues (pull requests included, see
    /// [`Issue::is_pull_request`]).
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call.
    #[instrument(skip(self, repository), fields(repository = %repository))]
    pub async fn list_issues(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Issue>, GitHubError> {
        self.list_items(repository, "/issues", state, page, per_page)
            .await
    }

    /// Lists pull requests.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call.
    #[instrument(skip(self, repository), fields(repository = %repository))]
    pub async fn list_pull_requests(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        self.list_items(repository, "/pulls", state, page, per_page)
            .await
    }

    /// Posts a comment on an issue or pull request conversation.
    ///
    /// Never cached. Returns `None` when GitHub answers `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns a [`GitHubError`] describing the failed call.
    #[instrument(skip(self, body), fields(repository = %repository))]
    pub async fn create_issue_comment(
        &self,
        repository: &RepositorySlug,
        number: u64,
        body: &str,
    ) -> Result<Option<IssueComment>, GitHubError> {
        let url = self.endpoint(&repository_path(
            repository,
            &format!("/issues/{number}/comments"),
        ))?;
        let payload = json!({ "body": body });

        match self.execute(&Method::POST, &url, &[], Some(&payload)).await? {
            Payload::Json(value) => decode(value).map(Some),
            Payload::NoContent => Ok(None),
        }
    }

    async fn list_items<T: DeserializeOwned>(
        &self,
        repository: &RepositorySlug,
        suffix: &str,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<T>, GitHubError> {
        let page_text = page.to_string();
        let per_page_text = per_page.to_string();
        self.read(
            &repository_path(repository, suffix),
            &[
                ("state", state.as_str()),
                ("page", page_text.as_str()),
                ("per_page", per_page_text.as_str()),
            ],
            self.config.cache_policy.list_ttl,
        )
        .await
    }

    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        ttl: Duration,
    ) -> Result<T, GitHubError> {
        let url = self.endpoint(path)?;
        let key = CacheKey::new(Method::GET.as_str(), url.as_str(), params);

        if let Some(cached) = self.cache.get(&key) {
            debug!(path, "serving GitHub response from cache");
            return decode(cached);
        }

        let value = match self.execute(&Method::GET, &url, params, None).await? {
            Payload::Json(value) => value,
            Payload::NoContent => Value::Null,
        };
        let decoded = decode(value.clone())?;
        self.cache.put(key, value, ttl);
        Ok(decoded)
    }

    fn endpoint(&self, path: &str) -> Result<Url, GitHubError> {
        self.api_base
            .join(path)
            .map_err(|error| GitHubError::Configuration {
                message: format!("cannot build URL for {path}: {error}"),
            })
    }

    async fn execute(
        &self,
        method: &Method,
        url: &Url,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Payload, GitHubError> {
        let mut waited_for_rate_limit = false;
        loop {
            let response = self.send(method, url, params, body).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let observed = self.rate_limit.observe(&headers);

            let text = self
                .cancellable(response.text())
                .await?
                .map_err(|error| GitHubError::TransientNetwork {
                    message: format!("read response body: {}", error.without_url()),
                })?;

            match status {
                StatusCode::NO_CONTENT => return Ok(Payload::NoContent),
                StatusCode::OK | StatusCode::CREATED => {
                    return serde_json::from_str(&text)
                        .map(Payload::Json)
                        .map_err(|error| GitHubError::Parse {
                            message: error.to_string(),
                        });
                }
                _ => {}
            }

            match self
                .rate_limit
                .should_retry_after_rate_limited(status, &headers, &text)
            {
                RateLimitDecision::NotRateLimited => {
                    return Err(self.permanent_error(status, &text));
                }
                RateLimitDecision::WaitAndRetry(wait) if !waited_for_rate_limit => {
                    waited_for_rate_limit = true;
                    warn!(
                        wait_seconds = wait.as_secs(),
                        "GitHub rate limit reached; waiting for the window to reset"
                    );
                    self.telemetry.record(TelemetryEvent::RateLimitBackoff {
                        wait_seconds: wait.as_secs(),
                    });
                    self.pause(wait).await?;
                }
                RateLimitDecision::WaitAndRetry(_) | RateLimitDecision::GiveUp => {
                    let rate_limit = observed.or_else(|| self.rate_limit.current());
                    let message = rate_limit.map_or_else(
                        || format!("{status} without a usable reset time"),
                        |info| format!("{status}; window resets at {}", info.reset_at()),
                    );
                    return Err(GitHubError::RateLimitExceeded {
                        rate_limit,
                        message,
                    });
                }
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, GitHubError> {
        let max_retries = self.config.max_transient_retries;
        let mut attempt = 0_u32;
        loop {
            let builder = self.http.request(method.clone(), url.clone()).query(params);
            let request = match body {
                Some(payload) => builder.json(payload),
                None => builder,
            };

            debug!(%method, path = url.path(), attempt, "sending GitHub request");
            let failure = match self.cancellable(request.send()).await? {
                Ok(response) => return Ok(response),
                Err(error) => error.without_url(),
            };

            if failure.is_builder() {
                return Err(GitHubError::Configuration {
                    message: format!("invalid request: {failure}"),
                });
            }
            if !(failure.is_connect() || failure.is_timeout()) || attempt >= max_retries {
                return Err(GitHubError::TransientNetwork {
                    message: failure.to_string(),
                });
            }

            attempt += 1;
            warn!(attempt, max_retries, error = %failure, "retrying GitHub request after transport failure");
            self.telemetry.record(TelemetryEvent::TransientRetry {
                attempt,
                max_retries,
            });
            self.pause(self.config.transient_backoff).await?;
        }
    }

    fn permanent_error(&self, status: StatusCode, text: &str) -> GitHubError {
        debug!(%status, "GitHub rejected the request");
        GitHubError::PermanentApi {
            status: status.as_u16(),
            body: self
                .config
                .include_error_bodies
                .then(|| truncate_body(text)),
        }
    }

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output, GitHubError> {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(GitHubError::Cancelled),
            output = future => Ok(output),
        }
    }

    async fn pause(&self, wait: Duration) -> Result<(), GitHubError> {
        self.cancellable(tokio::time::sleep(wait)).await
    }
}

fn repository_path(repository: &RepositorySlug, suffix: &str) -> String {
    format!(
        "repos/{owner}/{name}{suffix}",
        owner = repository.owner().as_str(),
        name = repository.name().as_str(),
    )
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GitHubError> {
    serde_json::from_value(value).map_err(|error| GitHubError::Parse {
        message: error.to_string(),
    })
}

fn truncate_body(text: &str) -> String {
    let mut truncated: String = text.chars().take(ERROR_BODY_LIMIT).collect();
    if text.chars().nth(ERROR_BODY_LIMIT).is_some() {
        truncated.push('…');
    }
    truncated
}
