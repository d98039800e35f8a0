use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::{Session, UnauthorizedHandler};

/// Errors that can occur when talking to a hosting provider.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("no {0} set on the session")]
    MissingSession(&'static str),

    #[error("unauthorized: the provider rejected the access token")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Display metadata for a login screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub icon: String,
    pub primary_color: String,
    pub secondary_color: String,
}

/// OAuth parameters of a provider application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub oauth_url: String,
    pub base_url: String,
    pub access_management_url: Option<String>,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Link that starts the provider's authorization code flow.
    pub fn authorize_url(&self) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
        );
        if !self.scopes.is_empty() {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(&self.scopes.join(" ")));
        }
        url
    }
}

/// A repository reachable with the current token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub org: String,
    pub name: String,
    pub url: String,
}

/// A file read from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFile {
    pub path: String,
    pub content: String,
}

/// One commit that touched a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRevision {
    pub commit_id: String,
    pub message: String,
    pub date: String,
    pub author_name: String,
    pub author_image_url: Option<String>,
}

/// A single file mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Create { path: String, content: String },
    Update { path: String, content: String },
    Delete { path: String },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub message: String,
    /// Target branch; the repository's default branch when unset.
    pub branch: Option<String>,
    pub changes: Vec<FileChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub commit_sha: Option<String>,
    pub created_at: String,
    pub url: Option<String>,
}

/// Proposal of a set of file changes for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRequest {
    pub title: String,
    pub description: String,
    pub changes: Vec<FileChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A binding to one Git hosting provider.
///
/// Implementations normalize the provider's REST API into this fixed set of
/// capabilities. File content crosses this boundary as UTF-8 text only; any
/// transport encoding stays inside the adapter. A 401 from the provider must
/// run the session's unauthorized callback once and surface
/// `AdapterError::Unauthorized`.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    fn info(&self) -> &AdapterInfo;

    fn oauth(&self) -> &OAuthConfig;

    fn session(&self) -> &Session;

    /// Stable provider name.
    fn name(&self) -> &str {
        &self.info().name
    }

    fn set_token(&self, token: Option<String>) {
        self.session().set_token(token);
    }

    fn set_owner(&self, owner: Option<String>) {
        self.session().set_owner(owner);
    }

    fn set_repo(&self, repo: Option<String>) {
        self.session().set_repo(repo);
    }

    fn set_unauthorized_handler(&self, handler: Option<UnauthorizedHandler>) {
        self.session().set_unauthorized_handler(handler);
    }

    /// Repositories reachable with the current token.
    async fn fetch_repositories(&self) -> Result<Vec<Repository>, AdapterError>;

    /// Text content of a single file.
    async fn fetch_file(&self, path: &str) -> Result<String, AdapterError>;

    /// Every JSON file directly inside `path`, with its full path.
    /// An absent or empty directory yields an empty list.
    async fn fetch_directory(&self, path: &str) -> Result<Vec<DirectoryFile>, AdapterError>;

    /// Commits that touched `path`, newest first.
    async fn fetch_file_history(&self, path: &str) -> Result<Vec<FileRevision>, AdapterError>;

    async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError>;

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError>;

    async fn delete_file(&self, path: &str, message: Option<&str>) -> Result<(), AdapterError>;

    /// Apply a set of changes as one commit and return its id.
    async fn create_commit(&self, request: &CommitRequest) -> Result<String, AdapterError>;

    /// Open pull requests of the target repository.
    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>, AdapterError>;

    async fn fetch_pull_request(&self, id: &str) -> Result<PullRequest, AdapterError>;

    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, AdapterError>;

    async fn update_pull_request(
        &self,
        id: &str,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, AdapterError>;

    /// Close the pull request without merging it.
    async fn delete_pull_request(&self, id: &str) -> Result<(), AdapterError>;
}

#[async_trait::async_trait]
impl<T: Adapter + ?Sized> Adapter for Arc<T> {
    fn info(&self) -> &AdapterInfo {
        (**self).info()
    }

    fn oauth(&self) -> &OAuthConfig {
        (**self).oauth()
    }

    fn session(&self) -> &Session {
        (**self).session()
    }

    async fn fetch_repositories(&self) -> Result<Vec<Repository>, AdapterError> {
        (**self).fetch_repositories().await
    }

    async fn fetch_file(&self, path: &str) -> Result<String, AdapterError> {
        (**self).fetch_file(path).await
    }

    async fn fetch_directory(&self, path: &str) -> Result<Vec<DirectoryFile>, AdapterError> {
        (**self).fetch_directory(path).await
    }

    async fn fetch_file_history(&self, path: &str) -> Result<Vec<FileRevision>, AdapterError> {
        (**self).fetch_file_history(path).await
    }

    async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        (**self).create_file(path, content, message).await
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        (**self).update_file(path, content, message).await
    }

    async fn delete_file(&self, path: &str, message: Option<&str>) -> Result<(), AdapterError> {
        (**self).delete_file(path, message).await
    }

    async fn create_commit(&self, request: &CommitRequest) -> Result<String, AdapterError> {
        (**self).create_commit(request).await
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>, AdapterError> {
        (**self).fetch_pull_requests().await
    }

    async fn fetch_pull_request(&self, id: &str) -> Result<PullRequest, AdapterError> {
        (**self).fetch_pull_request(id).await
    }

    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, AdapterError> {
        (**self).create_pull_request(request).await
    }

    async fn update_pull_request(
        &self,
        id: &str,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, AdapterError> {
        (**self).update_pull_request(id, update).await
    }

    async fn delete_pull_request(&self, id: &str) -> Result<(), AdapterError> {
        (**self).delete_pull_request(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthConfig {
        OAuthConfig {
            client_id: "Iv23abc".into(),
            redirect_uri: "http://localhost:3000/oauth/github".into(),
            oauth_url: "https://github.com/login/oauth/authorize".into(),
            base_url: "https://github.com".into(),
            access_management_url: None,
            scopes: vec![],
        }
    }

    #[test]
    fn authorize_url_encodes_redirect() {
        let url = oauth().authorize_url();
        assert_eq!(
            url,
            "https://github.com/login/oauth/authorize?client_id=Iv23abc\
             &redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth%2Fgithub&response_type=code"
        );
    }

    #[test]
    fn authorize_url_joins_scopes() {
        let mut config = oauth();
        config.scopes = vec!["api".into(), "read_user".into()];
        assert!(config.authorize_url().ends_with("&scope=api%20read_user"));
    }

    #[test]
    fn file_change_exposes_path() {
        let change = FileChange::Delete {
            path: "collections/talks/a.json".into(),
        };
        assert_eq!(change.path(), "collections/talks/a.json");
    }
}
