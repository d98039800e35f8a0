use serde::{Deserialize, Serialize};

/// Response from GitHub's Contents API.
/// `GET /repos/{owner}/{repo}/contents/{path}` returns an object for a file
/// and an array for a directory.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    File(FileContent),
    Directory(Vec<DirectoryEntry>),
}

#[derive(Debug, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub sha: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// `GET /user/repos`
#[derive(Debug, Deserialize)]
pub struct RepoResponse {
    pub id: u64,
    pub name: String,
    pub html_url: String,
    pub owner: Account,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits?path=...`
#[derive(Debug, Deserialize)]
pub struct CommitResponse {
    pub sha: String,
    pub commit: CommitDetail,
    /// The linked GitHub account; absent when the author email is unknown.
    pub author: Option<Account>,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
pub struct Signature {
    pub name: String,
    pub date: String,
}

/// `GET /repos/{owner}/{repo}/git/ref/heads/{branch}`
#[derive(Debug, Deserialize)]
pub struct RefResponse {
    pub object: ShaRef,
}

#[derive(Debug, Deserialize)]
pub struct ShaRef {
    pub sha: String,
}

/// `GET|POST /repos/{owner}/{repo}/git/commits`
#[derive(Debug, Deserialize)]
pub struct GitCommitResponse {
    pub sha: String,
    pub tree: ShaRef,
}

/// `GET /repos/{owner}/{repo}/pulls`
#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head: PullHead,
    pub created_at: String,
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullHead {
    pub sha: String,
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct PutContents<'a> {
    pub message: &'a str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct DeleteContents<'a> {
    pub message: &'a str,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewTree<'a> {
    pub base_tree: &'a str,
    pub tree: Vec<TreeItem<'a>>,
}

/// One entry of a tree write. A removal is sent with a `null` sha.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TreeItem<'a> {
    Write {
        path: &'a str,
        mode: &'static str,
        #[serde(rename = "type")]
        item_type: &'static str,
        content: &'a str,
    },
    Remove {
        path: &'a str,
        mode: &'static str,
        #[serde(rename = "type")]
        item_type: &'static str,
        sha: Option<&'a str>,
    },
}

#[derive(Debug, Serialize)]
pub struct NewCommit<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: [&'a str; 1],
}

#[derive(Debug, Serialize)]
pub struct NewRef<'a> {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MoveRef<'a> {
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewPull<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct EditPull<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
}
