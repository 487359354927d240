//! Gateway trait over the GitHub operations the application calls.
//!
//! Callers depend on [`GitHubGateway`] rather than on [`GitHubClient`] so that
//! flows built on top of the client can be exercised with a mock.

use async_trait::async_trait;

use super::client::GitHubClient;
use super::error::GitHubError;
use super::locator::RepositorySlug;
use super::models::{GitHubUser, Issue, IssueComment, ItemState, PullRequest, Repository};

/// Gateway that can read and annotate GitHub data for one credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitHubGateway: Send + Sync {
    /// Fetch the authenticated user's profile.
    async fn user_profile(&self) -> Result<GitHubUser, GitHubError>;

    /// List repositories visible to the user.
    async fn user_repositories(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GitHubError>;

    /// Fetch one repository.
    async fn repository(&self, repository: &RepositorySlug) -> Result<Repository, GitHubError>;

    /// List issues in a repository.
    async fn issues(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Issue>, GitHubError>;

    /// List pull requests in a repository.
    async fn pull_requests(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequest>, GitHubError>;

    /// Post a comment on an issue or pull request conversation.
    async fn create_issue_comment(
        &self,
        repository: &RepositorySlug,
        number: u64,
        body: &str,
    ) -> Result<Option<IssueComment>, GitHubError>;
}

#[async_trait]
impl GitHubGateway for GitHubClient {
    async fn user_profile(&self) -> Result<GitHubUser, GitHubError> {
        self.get_user_profile().await
    }

    async fn user_repositories(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GitHubError> {
        self.list_user_repositories(page, per_page).await
    }

    async fn repository(&self, repository: &RepositorySlug) -> Result<Repository, GitHubError> {
        self.get_repository(repository).await
    }

    async fn issues(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Issue>, GitHubError> {
        self.list_issues(repository, state, page, per_page).await
    }

    async fn pull_requests(
        &self,
        repository: &RepositorySlug,
        state: ItemState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        self.list_pull_requests(repository, state, page, per_page)
            .await
    }

    async fn create_issue_comment(
        &self,
        repository: &RepositorySlug,
        number: u64,
        body: &str,
    ) -> Result<Option<IssueComment>, GitHubError> {
        Self::create_issue_comment(self, repository, number, body).await
    }
}
