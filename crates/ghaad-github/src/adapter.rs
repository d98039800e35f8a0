use futures::future::try_join_all;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use ghaad::encoding::{decode_content, encode_content};
use ghaad::{
    Adapter, AdapterError, AdapterInfo, CommitRequest, DirectoryFile, FileChange, FileRevision,
    OAuthConfig, PullRequest, PullRequestRequest, PullRequestUpdate, Repository, Session,
};

use crate::response::{
    CommitResponse, ContentsResponse, DeleteContents, EditPull, FileContent, GitCommitResponse,
    MoveRef, NewCommit, NewPull, NewRef, NewTree, PullResponse, PutContents, RefResponse,
    RepoResponse, ShaRef, TreeItem,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

/// Prefix of branches holding proposed changes.
pub const PROPOSAL_BRANCH_PREFIX: &str = "ghaad/";

/// Configuration for the GitHub adapter.
#[derive(Debug, Clone, Default)]
pub struct GitHubAdapterConfig {
    /// OAuth app client id.
    pub client_id: String,
    pub redirect_uri: String,
    /// Overrides `https://api.github.com`, e.g. for GitHub Enterprise or tests.
    pub api_base_url: Option<String>,
}

/// Reads and writes repository files through GitHub's REST API.
pub struct GitHubAdapter {
    info: AdapterInfo,
    oauth: OAuthConfig,
    session: Session,
    api_base_url: Option<String>,
    client: reqwest::Client,
}

impl GitHubAdapter {
    pub fn new(config: GitHubAdapterConfig) -> Self {
        let access_management_url = format!(
            "https://github.com/settings/connections/applications/{}",
            config.client_id
        );

        Self {
            info: AdapterInfo {
                name: "GitHub".into(),
                icon: "https://github.com/fluidicon.png".into(),
                primary_color: "#000000".into(),
                secondary_color: "#ffffff".into(),
            },
            oauth: OAuthConfig {
                client_id: config.client_id,
                redirect_uri: config.redirect_uri,
                oauth_url: "https://github.com/login/oauth/authorize".into(),
                base_url: "https://github.com".into(),
                access_management_url: Some(access_management_url),
                scopes: vec!["repo".into()],
            },
            session: Session::default(),
            api_base_url: config.api_base_url,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// `{api}/repos/{owner}/{repo}{suffix}` for the session's repository.
    fn repo_url(&self, suffix: &str) -> Result<String, AdapterError> {
        let (owner, repo) = self.session.require_repo()?;
        Ok(format!("{}/repos/{owner}/{repo}{suffix}", self.api_base()))
    }

    fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header("User-Agent", "ghaad")
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = self.session.token() {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }

    /// Send a request and map non-success statuses onto adapter errors.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, AdapterError> {
        let response = req
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 => Err(self.session.unauthorized()),
            404 => Err(AdapterError::NotFound(what.to_owned())),
            code => Err(AdapterError::Http {
                status: code,
                message: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".into()),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, AdapterError> {
        debug!(url, "GET");
        self.send(self.build_request(Method::GET, url), what)
            .await?
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &impl Serialize,
        what: &str,
    ) -> Result<T, AdapterError> {
        debug!(%method, url, "sending");
        self.send(self.build_request(method, url).json(body), what)
            .await?
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }

    /// The file at `path` with its blob sha.
    async fn file_content(&self, path: &str) -> Result<FileContent, AdapterError> {
        let url = self.repo_url(&format!("/contents/{path}"))?;
        match self.get_json(&url, path).await? {
            ContentsResponse::File(file) => Ok(file),
            ContentsResponse::Directory(_) => {
                Err(AdapterError::Other(format!("{path} is a directory")))
            }
        }
    }

    async fn default_branch(&self) -> Result<String, AdapterError> {
        let url = self.repo_url("")?;
        let repo: RepoResponse = self.get_json(&url, "repository").await?;
        Ok(repo.default_branch.unwrap_or_else(|| "main".into()))
    }

    async fn branch_head(&self, branch: &str) -> Result<String, AdapterError> {
        let url = self.repo_url(&format!("/git/ref/heads/{branch}"))?;
        let reference: RefResponse = self.get_json(&url, branch).await?;
        Ok(reference.object.sha)
    }

    async fn put_contents(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<(), AdapterError> {
        let url = self.repo_url(&format!("/contents/{path}"))?;
        let body = PutContents {
            message,
            content: encode_content(content),
            sha,
        };
        let _: serde_json::Value = self.send_json(Method::PUT, &url, &body, path).await?;
        Ok(())
    }

    async fn close_pull(&self, number: &str) -> Result<PullResponse, AdapterError> {
        let url = self.repo_url(&format!("/pulls/{number}"))?;
        let body = EditPull {
            state: Some("closed"),
            ..EditPull::default()
        };
        self.send_json(Method::PATCH, &url, &body, &format!("pull request {number}"))
            .await
    }
}

fn pull_request(pull: PullResponse) -> PullRequest {
    PullRequest {
        id: pull.number.to_string(),
        title: pull.title,
        description: pull.body.unwrap_or_default(),
        commit_sha: Some(pull.head.sha),
        created_at: pull.created_at,
        url: pull.html_url,
    }
}

fn revision(commit: CommitResponse) -> FileRevision {
    let signature = commit.commit.author.or(commit.commit.committer);
    let (author_name, date) = signature
        .map(|s| (s.name, s.date))
        .unwrap_or_default();

    FileRevision {
        commit_id: commit.sha,
        message: commit.commit.message,
        date,
        author_name,
        author_image_url: commit.author.and_then(|account| account.avatar_url),
    }
}

#[async_trait::async_trait]
impl Adapter for GitHubAdapter {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }

    fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    fn session(&self) -> &Session {
        &self.session
    }

    async fn fetch_repositories(&self) -> Result<Vec<Repository>, AdapterError> {
        self.session.require_token()?;
        let url = format!("{}/user/repos", self.api_base());
        let mut repositories = Vec::new();

        for page in 1.. {
            debug!(%url, page, "GET");
            let req = self
                .build_request(Method::GET, &url)
                .query(&[("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())]);
            let batch: Vec<RepoResponse> = self
                .send(req, "repositories")
                .await?
                .json()
                .await
                .map_err(|e| AdapterError::Parse(e.to_string()))?;

            let last = batch.len() < PAGE_SIZE;
            repositories.extend(batch.into_iter().map(|repo| Repository {
                id: repo.id.to_string(),
                org: repo.owner.login,
                name: repo.name,
                url: repo.html_url,
            }));
            if last {
                break;
            }
        }

        Ok(repositories)
    }

    async fn fetch_file(&self, path: &str) -> Result<String, AdapterError> {
        let file = self.file_content(path).await?;
        let encoded = file
            .content
            .ok_or_else(|| AdapterError::Parse(format!("no content for {}", file.path)))?;
        decode_content(&encoded)
    }

    async fn fetch_directory(&self, path: &str) -> Result<Vec<DirectoryFile>, AdapterError> {
        let url = self.repo_url(&format!("/contents/{path}"))?;
        let entries = match self.get_json(&url, path).await {
            Ok(ContentsResponse::Directory(entries)) => entries,
            Ok(ContentsResponse::File(_)) => {
                return Err(AdapterError::Other(format!("{path} is not a directory")));
            }
            Err(AdapterError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        try_join_all(
            entries
                .iter()
                .filter(|entry| entry.entry_type == "file" && entry.name.ends_with(".json"))
                .map(|entry| async move {
                    let content = self.fetch_file(&entry.path).await?;
                    Ok::<_, AdapterError>(DirectoryFile {
                        path: entry.path.clone(),
                        content,
                    })
                }),
        )
        .await
    }

    async fn fetch_file_history(&self, path: &str) -> Result<Vec<FileRevision>, AdapterError> {
        let url = self.repo_url("/commits")?;
        debug!(%url, path, "GET");
        let req = self.build_request(Method::GET, &url).query(&[("path", path)]);
        let commits: Vec<CommitResponse> = self
            .send(req, path)
            .await?
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(commits.into_iter().map(revision).collect())
    }

    async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        match self.file_content(path).await {
            Ok(_) => return Err(AdapterError::AlreadyExists(path.to_owned())),
            Err(AdapterError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let message = message.map_or_else(|| format!("Create file: {path}"), str::to_owned);
        self.put_contents(path, content, &message, None).await
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        let existing = self.file_content(path).await?;
        let message = message.map_or_else(|| format!("Update file: {path}"), str::to_owned);
        self.put_contents(path, content, &message, Some(&existing.sha))
            .await
    }

    async fn delete_file(&self, path: &str, message: Option<&str>) -> Result<(), AdapterError> {
        let existing = self.file_content(path).await?;
        let message = message.map_or_else(|| format!("Delete file: {path}"), str::to_owned);

        let url = self.repo_url(&format!("/contents/{path}"))?;
        let body = DeleteContents {
            message: &message,
            sha: &existing.sha,
        };
        let _: serde_json::Value = self.send_json(Method::DELETE, &url, &body, path).await?;
        Ok(())
    }

    /// Writes through the Git Data API: new tree on top of the branch head,
    /// a commit of that tree, then a fast-forward of the branch ref.
    async fn create_commit(&self, request: &CommitRequest) -> Result<String, AdapterError> {
        let branch = match &request.branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };
        let head = self.branch_head(&branch).await?;

        let head_commit: GitCommitResponse = self
            .get_json(&self.repo_url(&format!("/git/commits/{head}"))?, &head)
            .await?;

        let tree = NewTree {
            base_tree: &head_commit.tree.sha,
            tree: request
                .changes
                .iter()
                .map(|change| match change {
                    FileChange::Create { path, content } | FileChange::Update { path, content } => {
                        TreeItem::Write {
                            path,
                            mode: "100644",
                            item_type: "blob",
                            content,
                        }
                    }
                    FileChange::Delete { path } => TreeItem::Remove {
                        path,
                        mode: "100644",
                        item_type: "blob",
                        sha: None,
                    },
                })
                .collect(),
        };
        let new_tree: ShaRef = self
            .send_json(Method::POST, &self.repo_url("/git/trees")?, &tree, "tree")
            .await?;

        let commit = NewCommit {
            message: &request.message,
            tree: &new_tree.sha,
            parents: [head.as_str()],
        };
        let new_commit: GitCommitResponse = self
            .send_json(Method::POST, &self.repo_url("/git/commits")?, &commit, "commit")
            .await?;

        let _: serde_json::Value = self
            .send_json(
                Method::PATCH,
                &self.repo_url(&format!("/git/refs/heads/{branch}"))?,
                &MoveRef {
                    sha: &new_commit.sha,
                },
                &branch,
            )
            .await?;

        debug!(%branch, sha = %new_commit.sha, "commit created");
        Ok(new_commit.sha)
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>, AdapterError> {
        let url = self.repo_url("/pulls")?;
        debug!(%url, "GET");
        let req = self
            .build_request(Method::GET, &url)
            .query(&[("state", "open"), ("per_page", "100")]);
        let pulls: Vec<PullResponse> = self
            .send(req, "pull requests")
            .await?
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(pulls.into_iter().map(pull_request).collect())
    }

    async fn fetch_pull_request(&self, id: &str) -> Result<PullRequest, AdapterError> {
        let url = self.repo_url(&format!("/pulls/{id}"))?;
        let pull: PullResponse = self.get_json(&url, &format!("pull request {id}")).await?;
        Ok(pull_request(pull))
    }

    /// Branches off the default branch, commits the changes there and opens a
    /// pull request back into the default branch.
    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, AdapterError> {
        let base = self.default_branch().await?;
        let head = self.branch_head(&base).await?;
        let branch = format!("{PROPOSAL_BRANCH_PREFIX}{}", uuid::Uuid::now_v7().simple());

        let reference = NewRef {
            reference: format!("refs/heads/{branch}"),
            sha: &head,
        };
        let _: serde_json::Value = self
            .send_json(Method::POST, &self.repo_url("/git/refs")?, &reference, &branch)
            .await?;

        self.create_commit(&CommitRequest {
            message: request.title.clone(),
            branch: Some(branch.clone()),
            changes: request.changes.clone(),
        })
        .await?;

        let pull = NewPull {
            title: &request.title,
            body: &request.description,
            head: &branch,
            base: &base,
        };
        let created: PullResponse = self
            .send_json(Method::POST, &self.repo_url("/pulls")?, &pull, "pull request")
            .await?;

        debug!(number = created.number, %branch, "pull request opened");
        Ok(pull_request(created))
    }

    async fn update_pull_request(
        &self,
        id: &str,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, AdapterError> {
        let url = self.repo_url(&format!("/pulls/{id}"))?;
        let body = EditPull {
            title: update.title.as_deref(),
            body: update.description.as_deref(),
            state: None,
        };
        let pull: PullResponse = self
            .send_json(Method::PATCH, &url, &body, &format!("pull request {id}"))
            .await?;
        Ok(pull_request(pull))
    }

    /// Closes the pull request and removes its proposal branch.
    async fn delete_pull_request(&self, id: &str) -> Result<(), AdapterError> {
        let closed = self.close_pull(id).await?;
        let branch = closed.head.branch;

        // Branches not created by this adapter are left alone
        if !branch.starts_with(PROPOSAL_BRANCH_PREFIX) {
            return Ok(());
        }

        let url = self.repo_url(&format!("/git/refs/heads/{branch}"))?;
        debug!(%url, "DELETE");
        match self
            .send(self.build_request(Method::DELETE, &url), &branch)
            .await
        {
            Ok(_) | Err(AdapterError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
