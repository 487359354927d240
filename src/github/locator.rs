//! Identity wrappers for repositories and access tokens.

use std::fmt;

use super::error::GitHubError;

fn is_slug_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '_' | '.' | '-')
}

/// Dot segments are rejected because slugs are joined into URL paths.
fn validate_segment(value: &str) -> bool {
    !value.is_empty() && !matches!(value, "." | "..") && value.chars().all(is_slug_character)
}

/// Repository owner wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    /// Validates an owner login.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidRepository`] when the value is empty or
    /// contains characters GitHub does not allow.
    pub fn new(value: &str) -> Result<Self, GitHubError> {
        if !validate_segment(value) {
            return Err(GitHubError::InvalidRepository {
                value: value.to_owned(),
            });
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the owner value.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository name wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Validates a repository name.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidRepository`] when the value is empty or
    /// contains characters GitHub does not allow.
    pub fn new(value: &str) -> Result<Self, GitHubError> {
        if !validate_segment(value) {
            return Err(GitHubError::InvalidRepository {
                value: value.to_owned(),
            });
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the repository name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A repository written as `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositorySlug {
    owner: RepositoryOwner,
    name: RepositoryName,
}

impl RepositorySlug {
    /// Parses `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidRepository`] unless the input has exactly
    /// two non-empty segments made of letters, digits, `_`, `.`, or `-`.
    ///
    /// # Example
    ///
    /// ```
    /// use devsync_github::RepositorySlug;
    ///
    /// let slug = RepositorySlug::parse("octo/hello-world").expect("valid slug");
    /// assert_eq!(slug.owner().as_str(), "octo");
    /// assert_eq!(slug.name().as_str(), "hello-world");
    /// ```
    pub fn parse(input: &str) -> Result<Self, GitHubError> {
        let invalid = || GitHubError::InvalidRepository {
            value: input.to_owned(),
        };
        let (owner, name) = input.trim().split_once('/').ok_or_else(invalid)?;

        Ok(Self {
            owner: RepositoryOwner::new(owner).map_err(|_| invalid())?,
            name: RepositoryName::new(name).map_err(|_| invalid())?,
        })
    }

    /// Builds a slug from already separated parts.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidRepository`] when either part is invalid.
    pub fn from_parts(owner: &str, name: &str) -> Result<Self, GitHubError> {
        Ok(Self {
            owner: RepositoryOwner::new(owner)?,
            name: RepositoryName::new(name)?,
        })
    }

    /// Returns the owner.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Returns the repository name.
    #[must_use]
    pub const fn name(&self) -> &RepositoryName {
        &self.name
    }
}

impl fmt::Display for RepositorySlug {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.owner.as_str(), self.name.as_str())
    }
}

/// OAuth access token wrapper enforcing presence.
///
/// The token is opaque: `Debug` prints a redaction marker and logs only ever
/// see [`AccessToken::preview`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

const PREVIEW_CHARS: usize = 4;

impl AccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns `GitHubError::MissingToken` when the supplied string is blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, GitHubError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(GitHubError::MissingToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value. Never log the result.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the first few characters followed by an ellipsis.
    #[must_use]
    pub fn preview(&self) -> String {
        let mut preview: String = self.0.chars().take(PREVIEW_CHARS).collect();
        preview.push('…');
        preview
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("AccessToken")
            .field(&self.preview())
            .finish()
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        self.value()
    }
}
