//! Typed records for the GitHub REST responses the client exposes.
//!
//! Only the fields the application surfaces are modelled; everything else in
//! GitHub's payloads is ignored during deserialisation. Optional fields
//! default so that sparse payloads (for example from GitHub Enterprise) still
//! decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compact user or organisation reference embedded in other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Numeric account identifier.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile URL.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// The authenticated user's profile (`GET /user`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    /// Numeric account identifier.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Public email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile URL.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Number of public repositories.
    #[serde(default)]
    pub public_repos: u32,
}

/// A repository visible to the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Numeric repository identifier.
    pub id: u64,
    /// Short repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Repository owner.
    pub owner: Account,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Browser URL.
    pub html_url: String,
    /// Default branch name.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Primary language as detected by GitHub.
    #[serde(default)]
    pub language: Option<String>,
    /// Star count.
    #[serde(default)]
    pub stargazers_count: u32,
    /// Fork count.
    #[serde(default)]
    pub forks_count: u32,
    /// Open issue and pull request count.
    #[serde(default)]
    pub open_issues_count: u32,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An issue label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Hex colour without the leading `#`.
    #[serde(default)]
    pub color: Option<String>,
}

/// An issue returned by `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Numeric issue identifier.
    pub id: u64,
    /// Issue number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// `open` or `closed`.
    pub state: String,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Browser URL.
    pub html_url: String,
    /// Author.
    #[serde(default)]
    pub user: Option<Account>,
    /// Attached labels.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Assigned accounts.
    #[serde(default)]
    pub assignees: Vec<Account>,
    /// Number of comments.
    #[serde(default)]
    pub comments: u32,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Close time.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<PullRequestLinks>,
}

impl Issue {
    /// Returns true when the issues endpoint returned a pull request.
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Marker object GitHub attaches to pull requests in issue listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestLinks {
    /// Pull request browser URL.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Branch reference on either side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name.
    #[serde(rename = "ref")]
    pub branch: String,
    /// Commit SHA.
    pub sha: String,
}

/// A pull request returned by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Numeric pull request identifier.
    pub id: u64,
    /// Pull request number within the repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// `open` or `closed`.
    pub state: String,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Browser URL.
    pub html_url: String,
    /// Author.
    #[serde(default)]
    pub user: Option<Account>,
    /// Whether the pull request is a draft.
    #[serde(default)]
    pub draft: bool,
    /// Source branch.
    pub head: BranchRef,
    /// Target branch.
    pub base: BranchRef,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Merge time, when merged.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Returns true when the pull request has been merged.
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

/// A comment created on an issue or pull request conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    /// Comment identifier.
    pub id: u64,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Browser URL.
    pub html_url: String,
    /// Author.
    #[serde(default)]
    pub user: Option<Account>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// State filter for issue and pull request listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Open items only.
    #[default]
    Open,
    /// Closed items only.
    Closed,
    /// Both open and closed items.
    All,
}

impl ItemState {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Issue, ItemState, PullRequest, Repository};

    #[test]
    fn issue_listing_distinguishes_pull_requests() {
        let issues: Vec<Issue> = serde_json::from_value(serde_json::json!([
            {"id": 1, "number": 7, "title": "Bug", "state": "open",
             "html_url": "https://github.com/o/r/issues/7",
             "labels": [{"name": "bug", "color": "d73a4a"}]},
            {"id": 2, "number": 8, "title": "Fix", "state": "open",
             "html_url": "https://github.com/o/r/pull/8",
             "pull_request": {"html_url": "https://github.com/o/r/pull/8"}}
        ]))
        .expect("issues should deserialise");

        let flags: Vec<bool> = issues.iter().map(Issue::is_pull_request).collect();
        assert_eq!(flags, vec![false, true]);
        assert_eq!(
            issues.first().and_then(|issue| issue.labels.first()).map(|label| label.name.as_str()),
            Some("bug")
        );
    }

    #[test]
    fn repository_tolerates_sparse_payloads() {
        let repository: Repository = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "r",
            "full_name": "o/r",
            "owner": {"id": 9, "login": "o"},
            "html_url": "https://github.com/o/r",
            "updated_at": "2024-05-01T12:00:00Z"
        }))
        .expect("repository should deserialise");

        assert!(!repository.private);
        assert_eq!(repository.stargazers_count, 0);
        assert!(repository.updated_at.is_some());
    }

    #[test]
    fn pull_request_reads_branch_refs() {
        let pull: PullRequest = serde_json::from_value(serde_json::json!({
            "id": 4, "number": 12, "title": "Add feature", "state": "closed",
            "html_url": "https://github.com/o/r/pull/12",
            "head": {"ref": "feature", "sha": "abc"},
            "base": {"ref": "main", "sha": "def"},
            "merged_at": "2024-05-02T08:30:00Z"
        }))
        .expect("pull request should deserialise");

        assert_eq!(pull.head.branch, "feature");
        assert!(pull.is_merged());
    }

    #[rstest]
    #[case(ItemState::Open, "open")]
    #[case(ItemState::Closed, "closed")]
    #[case(ItemState::All, "all")]
    fn item_state_query_values(#[case] state: ItemState, #[case] expected: &str) {
        assert_eq!(state.as_str(), expected);
    }
}
