//! GitHub OAuth connector and REST client.
//!
//! The OAuth side encodes a stateless CSRF `state`, renders the authorize URL,
//! and exchanges callback codes for credentials. The REST side wraps
//! `reqwest` with a per-client response cache, rate limit tracking, and
//! bounded retries, and maps every failure into [`GitHubError`].

pub mod cache;
pub mod client;
pub mod connect;
pub mod error;
pub mod gateway;
pub mod linking;
pub mod locator;
pub mod models;
pub mod oauth;
pub mod rate_limit;
pub mod state;

pub use cache::{CacheKey, CachePolicy, ResponseCache};
pub use client::{ClientConfig, GitHubClient};
pub use connect::{ConnectedAccount, complete_authorization};
pub use error::GitHubError;
pub use gateway::GitHubGateway;
pub use linking::TaskLink;
pub use locator::{AccessToken, RepositoryName, RepositoryOwner, RepositorySlug};
pub use models::{
    Account, GitHubUser, Issue, IssueComment, ItemState, Label, PullRequest, Repository,
};
pub use oauth::{Credential, OAuthFlow, OAuthSettings, TokenExchange, build_authorization_url};
pub use rate_limit::{RateLimitDecision, RateLimitInfo, RateLimitTracker};
pub use state::{OAuthState, UserId, decode_fresh_state, decode_state, encode_state};

#[cfg(test)]
pub use gateway::MockGitHubGateway;
#[cfg(test)]
pub use oauth::MockTokenExchange;
