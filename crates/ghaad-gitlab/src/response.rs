use serde::{Deserialize, Serialize};

/// `GET /projects/:id/repository/files/:file_path`
#[derive(Debug, Deserialize)]
pub struct FileResponse {
    pub file_path: String,
    pub content: String,
    pub last_commit_id: String,
}

/// `GET /projects/:id/repository/tree`
#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// `GET /projects` and `GET /projects/:id`
#[derive(Debug, Deserialize)]
pub struct ProjectResponse {
    pub id: u64,
    pub path: String,
    pub web_url: String,
    pub namespace: Namespace,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Namespace {
    pub path: String,
}

/// `GET /projects/:id/repository/commits`
#[derive(Debug, Deserialize)]
pub struct CommitResponse {
    pub id: String,
    pub message: String,
    pub author_name: String,
    pub authored_date: String,
}

/// `GET /projects/:id/merge_requests`
#[derive(Debug, Deserialize)]
pub struct MergeRequestResponse {
    pub iid: u64,
    pub title: String,
    pub description: Option<String>,
    pub sha: Option<String>,
    pub created_at: String,
    pub web_url: Option<String>,
}

/// Body of `POST /projects/:id/repository/commits`.
#[derive(Debug, Serialize)]
pub struct NewCommit<'a> {
    pub branch: &'a str,
    pub commit_message: &'a str,
    pub actions: Vec<CommitAction<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CommitAction<'a> {
    pub action: &'static str,
    pub file_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'static str>,
    /// Revision marker; the write is rejected if the file moved past it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedCommit {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct NewMergeRequest<'a> {
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub remove_source_branch: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct EditMergeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_event: Option<&'static str>,
}
