//! DevSync GitHub integration core.
//!
//! The library connects application users to GitHub through the OAuth2
//! authorization-code flow with a stateless CSRF `state`, and provides a
//! caching, rate limit aware REST client for the profile, repository, issue,
//! pull request, and issue comment endpoints. Failures surface as typed
//! [`GitHubError`] values; secrets never appear in logs or errors.

pub mod config;
pub mod github;
pub mod telemetry;

pub use config::GitHubIntegrationConfig;
pub use github::{
    AccessToken, ClientConfig, ConnectedAccount, Credential, GitHubClient, GitHubError,
    GitHubGateway, OAuthFlow, OAuthSettings, RepositorySlug, ResponseCache, TaskLink,
    TokenExchange, complete_authorization, decode_state, encode_state,
};
