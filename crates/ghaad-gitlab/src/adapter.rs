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
    CommitAction, CommitResponse, CreatedCommit, EditMergeRequest, FileResponse,
    MergeRequestResponse, NewCommit, NewMergeRequest, ProjectResponse, TreeEntry,
};

const DEFAULT_BASE_URL: &str = "https://gitlab.com";
const PAGE_SIZE: &str = "100";

/// Prefix of branches holding proposed changes.
pub const PROPOSAL_BRANCH_PREFIX: &str = "ghaad/";

/// Configuration for the GitLab adapter.
#[derive(Debug, Clone, Default)]
pub struct GitLabAdapterConfig {
    pub client_id: String,
    pub redirect_uri: String,
    /// Instance root, `https://gitlab.com` unless self-hosted.
    pub base_url: Option<String>,
    /// Overrides `{base_url}/api/v4`, e.g. for tests.
    pub api_base_url: Option<String>,
}

/// Reads and writes repository files through the GitLab REST API (v4).
///
/// Every write goes through the Commits API so create, update and delete
/// share one code path with multi-file commits.
pub struct GitLabAdapter {
    info: AdapterInfo,
    oauth: OAuthConfig,
    session: Session,
    api_base_url: String,
    client: reqwest::Client,
}

impl GitLabAdapter {
    pub fn new(config: GitLabAdapterConfig) -> Self {
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let api_base_url = config
            .api_base_url
            .unwrap_or_else(|| format!("{base_url}/api/v4"));

        Self {
            info: AdapterInfo {
                name: "GitLab".into(),
                icon: "https://about.gitlab.com/images/ico/favicon-192x192.png".into(),
                primary_color: "#FC6D26".into(),
                secondary_color: "#000000".into(),
            },
            oauth: OAuthConfig {
                client_id: config.client_id,
                redirect_uri: config.redirect_uri,
                oauth_url: format!("{base_url}/oauth/authorize"),
                access_management_url: Some(format!("{base_url}/-/user_settings/applications")),
                base_url,
                scopes: vec!["api".into()],
            },
            session: Session::default(),
            api_base_url,
            client: reqwest::Client::new(),
        }
    }

    /// `{api}/projects/{owner%2Frepo}{suffix}` for the session's repository.
    fn project_url(&self, suffix: &str) -> Result<String, AdapterError> {
        let (owner, repo) = self.session.require_repo()?;
        let id = urlencoding::encode(&format!("{owner}/{repo}")).into_owned();
        Ok(format!("{}/projects/{id}{suffix}", self.api_base_url))
    }

    fn file_url(&self, path: &str) -> Result<String, AdapterError> {
        self.project_url(&format!(
            "/repository/files/{}",
            urlencoding::encode(path)
        ))
    }

    fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url).header("User-Agent", "ghaad");

        if let Some(token) = self.session.token() {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }

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

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, AdapterError> {
        debug!(url, "GET");
        self.send(self.build_request(Method::GET, url).query(query), what)
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

    /// Every page of a listing, following the `x-next-page` header.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<T>, AdapterError> {
        let mut items = Vec::new();
        let mut page = String::from("1");

        loop {
            debug!(url, %page, "GET");
            let req = self
                .build_request(Method::GET, url)
                .query(query)
                .query(&[("per_page", PAGE_SIZE), ("page", page.as_str())]);
            let response = self.send(req, what).await?;

            let next = response
                .headers()
                .get("x-next-page")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned);

            let batch: Vec<T> = response
                .json()
                .await
                .map_err(|e| AdapterError::Parse(e.to_string()))?;
            items.extend(batch);

            match next {
                Some(next) => page = next,
                None => return Ok(items),
            }
        }
    }

    async fn file(&self, path: &str) -> Result<FileResponse, AdapterError> {
        self.get_json(&self.file_url(path)?, &[("ref", "HEAD")], path)
            .await
    }

    async fn default_branch(&self) -> Result<String, AdapterError> {
        let project: ProjectResponse = self
            .get_json(&self.project_url("")?, &[], "project")
            .await?;
        Ok(project.default_branch.unwrap_or_else(|| "main".into()))
    }

    async fn commit(
        &self,
        branch: &str,
        message: &str,
        actions: Vec<CommitAction<'_>>,
    ) -> Result<String, AdapterError> {
        let body = NewCommit {
            branch,
            commit_message: message,
            actions,
        };
        let created: CreatedCommit = self
            .send_json(
                Method::POST,
                &self.project_url("/repository/commits")?,
                &body,
                branch,
            )
            .await?;
        debug!(branch, id = %created.id, "commit created");
        Ok(created.id)
    }

    async fn commit_to_default(
        &self,
        message: &str,
        action: CommitAction<'_>,
    ) -> Result<(), AdapterError> {
        let branch = self.default_branch().await?;
        self.commit(&branch, message, vec![action]).await?;
        Ok(())
    }

    async fn edit_merge_request(
        &self,
        id: &str,
        body: &EditMergeRequest<'_>,
    ) -> Result<MergeRequestResponse, AdapterError> {
        let url = self.project_url(&format!("/merge_requests/{id}"))?;
        self.send_json(Method::PUT, &url, body, &format!("merge request {id}"))
            .await
    }
}

fn write_action<'a>(action: &'static str, path: &'a str, content: &str) -> CommitAction<'a> {
    CommitAction {
        action,
        file_path: path,
        content: Some(encode_content(content)),
        encoding: Some("base64"),
        last_commit_id: None,
    }
}

fn pull_request(merge_request: MergeRequestResponse) -> PullRequest {
    PullRequest {
        id: merge_request.iid.to_string(),
        title: merge_request.title,
        description: merge_request.description.unwrap_or_default(),
        commit_sha: merge_request.sha,
        created_at: merge_request.created_at,
        url: merge_request.web_url,
    }
}

#[async_trait::async_trait]
impl Adapter for GitLabAdapter {
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
        let url = format!("{}/projects", self.api_base_url);
        let projects: Vec<ProjectResponse> = self
            .get_all_pages(&url, &[("membership", "true")], "projects")
            .await?;

        Ok(projects
            .into_iter()
            .map(|project| Repository {
                id: project.id.to_string(),
                org: project.namespace.path,
                name: project.path,
                url: project.web_url,
            })
            .collect())
    }

    async fn fetch_file(&self, path: &str) -> Result<String, AdapterError> {
        let file = self.file(path).await?;
        decode_content(&file.content)
    }

    async fn fetch_directory(&self, path: &str) -> Result<Vec<DirectoryFile>, AdapterError> {
        let url = self.project_url("/repository/tree")?;
        let entries: Vec<TreeEntry> = match self
            .get_all_pages(&url, &[("path", path), ("ref", "HEAD")], path)
            .await
        {
            Ok(entries) => entries,
            Err(AdapterError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        try_join_all(
            entries
                .iter()
                .filter(|entry| entry.entry_type == "blob" && entry.name.ends_with(".json"))
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
        let url = self.project_url("/repository/commits")?;
        let commits: Vec<CommitResponse> = self.get_json(&url, &[("path", path)], path).await?;

        Ok(commits
            .into_iter()
            .map(|commit| FileRevision {
                commit_id: commit.id,
                message: commit.message,
                date: commit.authored_date,
                author_name: commit.author_name,
                author_image_url: None,
            })
            .collect())
    }

    async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        match self.file(path).await {
            Ok(_) => return Err(AdapterError::AlreadyExists(path.to_owned())),
            Err(AdapterError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let message = message.map_or_else(|| format!("Create file: {path}"), str::to_owned);
        self.commit_to_default(&message, write_action("create", path, content))
            .await
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        let existing = self.file(path).await?;
        let message = message.map_or_else(|| format!("Update file: {path}"), str::to_owned);

        let action = CommitAction {
            last_commit_id: Some(existing.last_commit_id.as_str()),
            ..write_action("update", path, content)
        };
        self.commit_to_default(&message, action).await
    }

    async fn delete_file(&self, path: &str, message: Option<&str>) -> Result<(), AdapterError> {
        let existing = self.file(path).await?;
        let message = message.map_or_else(|| format!("Delete file: {path}"), str::to_owned);

        let action = CommitAction {
            action: "delete",
            file_path: path,
            content: None,
            encoding: None,
            last_commit_id: Some(existing.last_commit_id.as_str()),
        };
        self.commit_to_default(&message, action).await
    }

    async fn create_commit(&self, request: &CommitRequest) -> Result<String, AdapterError> {
        let branch = match &request.branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };

        let actions = request
            .changes
            .iter()
            .map(|change| match change {
                FileChange::Create { path, content } => write_action("create", path, content),
                FileChange::Update { path, content } => write_action("update", path, content),
                FileChange::Delete { path } => CommitAction {
                    action: "delete",
                    file_path: path,
                    content: None,
                    encoding: None,
                    last_commit_id: None,
                },
            })
            .collect();

        self.commit(&branch, &request.message, actions).await
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>, AdapterError> {
        let url = self.project_url("/merge_requests")?;
        let merge_requests: Vec<MergeRequestResponse> = self
            .get_all_pages(&url, &[("state", "opened")], "merge requests")
            .await?;
        Ok(merge_requests.into_iter().map(pull_request).collect())
    }

    async fn fetch_pull_request(&self, id: &str) -> Result<PullRequest, AdapterError> {
        let url = self.project_url(&format!("/merge_requests/{id}"))?;
        let merge_request: MergeRequestResponse = self
            .get_json(&url, &[], &format!("merge request {id}"))
            .await?;
        Ok(pull_request(merge_request))
    }

    /// Branches off the default branch, commits the changes there and opens a
    /// merge request that removes the branch once merged.
    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, AdapterError> {
        let base = self.default_branch().await?;
        let branch = format!("{PROPOSAL_BRANCH_PREFIX}{}", uuid::Uuid::now_v7().simple());

        let url = self.project_url("/repository/branches")?;
        debug!(%url, %branch, "creating branch");
        let req = self
            .build_request(Method::POST, &url)
            .query(&[("branch", branch.as_str()), ("ref", base.as_str())]);
        self.send(req, &branch).await?;

        self.create_commit(&CommitRequest {
            message: request.title.clone(),
            branch: Some(branch.clone()),
            changes: request.changes.clone(),
        })
        .await?;

        let body = NewMergeRequest {
            source_branch: &branch,
            target_branch: &base,
            title: &request.title,
            description: &request.description,
            remove_source_branch: true,
        };
        let created: MergeRequestResponse = self
            .send_json(
                Method::POST,
                &self.project_url("/merge_requests")?,
                &body,
                "merge request",
            )
            .await?;

        debug!(iid = created.iid, %branch, "merge request opened");
        Ok(pull_request(created))
    }

    async fn update_pull_request(
        &self,
        id: &str,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, AdapterError> {
        let body = EditMergeRequest {
            title: update.title.as_deref(),
            description: update.description.as_deref(),
            state_event: None,
        };
        Ok(pull_request(self.edit_merge_request(id, &body).await?))
    }

    /// Closes the merge request without merging it.
    async fn delete_pull_request(&self, id: &str) -> Result<(), AdapterError> {
        let body = EditMergeRequest {
            state_event: Some("close"),
            ..EditMergeRequest::default()
        };
        self.edit_merge_request(id, &body).await?;
        Ok(())
    }
}
