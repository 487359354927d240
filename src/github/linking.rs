//! Comments that link a GitHub issue or pull request to a DevSync task.

use tracing::{debug, instrument};

use super::error::GitHubError;
use super::gateway::GitHubGateway;
use super::locator::RepositorySlug;
use super::models::IssueComment;

/// A DevSync task to be announced on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLink {
    task_id: String,
    title: String,
    frontend_url: String,
}

impl TaskLink {
    /// Describes a task hosted under `frontend_url`.
    #[must_use]
    pub fn new(
        task_id: impl Into<String>,
        title: impl Into<String>,
        frontend_url: &str,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            frontend_url: frontend_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Browser URL of the task.
    #[must_use]
    pub fn task_url(&self) -> String {
        format!("{}/tasks/{}", self.frontend_url, self.task_id)
    }

    /// Markdown comment announcing the link.
    #[must_use]
    pub fn comment_body(&self) -> String {
        format!(
            "This issue is linked to DevSync task #{id}: {title}\n\n[View in DevSync]({url})",
            id = self.task_id,
            title = self.title,
            url = self.task_url(),
        )
    }

    /// Posts the link comment on issue or pull request `number`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error when the comment cannot be created.
    #[instrument(skip(self, gateway), fields(task_id = %self.task_id, repository = %repository))]
    pub async fn post<G>(
        &self,
        gateway: &G,
        repository: &RepositorySlug,
        number: u64,
    ) -> Result<Option<IssueComment>, GitHubError>
    where
        G: GitHubGateway + ?Sized,
    {
        let comment = gateway
            .create_issue_comment(repository, number, &self.comment_body())
            .await?;
        debug!(number, "task link comment posted");
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};

    use super::TaskLink;
    use crate::github::gateway::MockGitHubGateway;
    use crate::github::locator::RepositorySlug;
    use crate::github::models::IssueComment;

    #[test]
    fn renders_comment_body() {
        let link = TaskLink::new("17", "Ship the connector", "https://devsync.example/");

        insta::assert_snapshot!(link.comment_body(), @r"
        This issue is linked to DevSync task #17: Ship the connector

        [View in DevSync](https://devsync.example/tasks/17)
        ");
    }

    #[tokio::test]
    async fn posts_comment_through_gateway() {
        let link = TaskLink::new("17", "Ship the connector", "https://devsync.example");
        let repository = RepositorySlug::parse("octo/hello").expect("slug should parse");
        let expected_body = link.comment_body();

        let mut gateway = MockGitHubGateway::new();
        gateway
            .expect_create_issue_comment()
            .with(always(), eq(8_u64), eq(expected_body.clone()))
            .times(1)
            .returning(|_, _, body| {
                Ok(Some(IssueComment {
                    id: 5,
                    body: Some(body.to_owned()),
                    html_url: "https://github.com/octo/hello/issues/8#issuecomment-5".to_owned(),
                    user: None,
                    created_at: None,
                }))
            });

        let comment = link
            .post(&gateway, &repository, 8)
            .await
            .expect("comment should post");

        assert_eq!(comment.and_then(|created| created.body), Some(expected_body));
    }
}
