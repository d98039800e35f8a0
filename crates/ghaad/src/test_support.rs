use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    Adapter, AdapterError, AdapterInfo, CommitRequest, DirectoryFile, FileChange, FileRevision,
    OAuthConfig, PullRequest, PullRequestRequest, PullRequestUpdate, Repository, Session,
};

type ErrorFactory = Box<dyn Fn() -> AdapterError + Send + Sync>;

/// In-memory adapter for testing. Holds a single-branch file tree, records
/// every remote call and can be told to fail specific operations.
pub struct InMemoryAdapter {
    info: AdapterInfo,
    oauth: OAuthConfig,
    session: Session,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, String>,
    history: HashMap<String, Vec<FileRevision>>,
    repositories: Vec<Repository>,
    pull_requests: Vec<StoredPullRequest>,
    branch_commits: Vec<CommitRequest>,
    calls: Vec<String>,
    failures: HashMap<String, ErrorFactory>,
    reject_token: bool,
    commits: u64,
}

struct StoredPullRequest {
    pull_request: PullRequest,
    changes: Vec<FileChange>,
    open: bool,
}

impl InMemoryAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            info: AdapterInfo {
                name: name.clone(),
                icon: format!("https://example.test/{}.png", name.to_lowercase()),
                primary_color: "#000000".into(),
                secondary_color: "#ffffff".into(),
            },
            oauth: OAuthConfig {
                client_id: format!("{}-client", name.to_lowercase()),
                redirect_uri: "http://localhost/oauth".into(),
                oauth_url: "https://example.test/oauth/authorize".into(),
                base_url: "https://example.test".into(),
                access_management_url: None,
                scopes: vec![],
            },
            session: Session::default(),
            state: Mutex::new(State::default()),
        }
    }

    /// Put a file into the tree without recording a call or a revision.
    pub fn insert_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.state().files.insert(path.into(), content.into());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    pub fn add_repository(&self, repository: Repository) {
        self.state().repositories.push(repository);
    }

    /// Every recorded operation name, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == operation).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make every call of `operation` fail with the produced error.
    pub fn fail_on(
        &self,
        operation: impl Into<String>,
        error: impl Fn() -> AdapterError + Send + Sync + 'static,
    ) {
        self.state()
            .failures
            .insert(operation.into(), Box::new(error));
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Answer every call as if the provider returned 401.
    pub fn reject_token(&self, reject: bool) {
        self.state().reject_token = reject;
    }

    /// Commits made to branches other than the default one.
    pub fn branch_commits(&self) -> Vec<CommitRequest> {
        self.state().branch_commits.clone()
    }

    /// Apply an open pull request's changes to the tree and close it.
    pub fn merge_pull_request(&self, id: &str) -> Result<(), AdapterError> {
        let mut state = self.state();
        let index = state
            .pull_requests
            .iter()
            .position(|stored| stored.open && stored.pull_request.id == id)
            .ok_or_else(|| AdapterError::NotFound(format!("pull request {id}")))?;

        let changes = state.pull_requests[index].changes.clone();
        let title = state.pull_requests[index].pull_request.title.clone();
        apply_changes(&mut state, &changes, &title)?;
        state.pull_requests[index].open = false;
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and apply token rejection and injected failures.
    fn enter(&self, operation: &str) -> Result<(), AdapterError> {
        let (rejected, failure) = {
            let mut state = self.state();
            state.calls.push(operation.to_owned());
            (
                state.reject_token,
                state.failures.get(operation).map(|make| make()),
            )
        };

        if rejected {
            return Err(self.session.unauthorized());
        }
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(())
    }

    fn enter_repo(&self, operation: &str) -> Result<(), AdapterError> {
        self.enter(operation)?;
        self.session.require_repo()?;
        Ok(())
    }
}

fn record_revision(state: &mut State, path: &str, message: &str) {
    state.commits += 1;
    let revision = FileRevision {
        commit_id: format!("commit-{}", state.commits),
        message: message.to_owned(),
        date: format!("2024-01-01T00:00:{:02}Z", state.commits % 60),
        author_name: "In Memory".into(),
        author_image_url: None,
    };
    state
        .history
        .entry(path.to_owned())
        .or_default()
        .insert(0, revision);
}

fn apply_changes(state: &mut State, changes: &[FileChange], message: &str) -> Result<(), AdapterError> {
    for change in changes {
        let exists = state.files.contains_key(change.path());
        match change {
            FileChange::Create { path, .. } if exists => {
                return Err(AdapterError::AlreadyExists(path.clone()));
            }
            FileChange::Update { path, .. } | FileChange::Delete { path } if !exists => {
                return Err(AdapterError::NotFound(path.clone()));
            }
            _ => {}
        }
    }

    for change in changes {
        match change {
            FileChange::Create { path, content } | FileChange::Update { path, content } => {
                state.files.insert(path.clone(), content.clone());
            }
            FileChange::Delete { path } => {
                state.files.remove(path);
            }
        }
        record_revision(state, change.path(), message);
    }
    Ok(())
}

#[async_trait::async_trait]
impl Adapter for InMemoryAdapter {
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
        self.enter("fetch_repositories")?;
        self.session.require_token()?;
        Ok(self.state().repositories.clone())
    }

    async fn fetch_file(&self, path: &str) -> Result<String, AdapterError> {
        self.enter_repo("fetch_file")?;
        self.file(path)
            .ok_or_else(|| AdapterError::NotFound(path.to_owned()))
    }

    async fn fetch_directory(&self, path: &str) -> Result<Vec<DirectoryFile>, AdapterError> {
        self.enter_repo("fetch_directory")?;
        let prefix = format!("{}/", path.trim_end_matches('/'));

        Ok(self
            .state()
            .files
            .iter()
            .filter_map(|(file_path, content)| {
                let name = file_path.strip_prefix(&prefix)?;
                (!name.contains('/') && name.ends_with(".json")).then(|| DirectoryFile {
                    path: file_path.clone(),
                    content: content.clone(),
                })
            })
            .collect())
    }

    async fn fetch_file_history(&self, path: &str) -> Result<Vec<FileRevision>, AdapterError> {
        self.enter_repo("fetch_file_history")?;
        Ok(self.state().history.get(path).cloned().unwrap_or_default())
    }

    async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        self.enter_repo("create_file")?;
        let change = FileChange::Create {
            path: path.to_owned(),
            content: content.to_owned(),
        };
        let message = message.map_or_else(|| format!("Create file: {path}"), str::to_owned);
        apply_changes(&mut self.state(), &[change], &message)
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<(), AdapterError> {
        self.enter_repo("update_file")?;
        let change = FileChange::Update {
            path: path.to_owned(),
            content: content.to_owned(),
        };
        let message = message.map_or_else(|| format!("Update file: {path}"), str::to_owned);
        apply_changes(&mut self.state(), &[change], &message)
    }

    async fn delete_file(&self, path: &str, message: Option<&str>) -> Result<(), AdapterError> {
        self.enter_repo("delete_file")?;
        let change = FileChange::Delete {
            path: path.to_owned(),
        };
        let message = message.map_or_else(|| format!("Delete file: {path}"), str::to_owned);
        apply_changes(&mut self.state(), &[change], &message)
    }

    async fn create_commit(&self, request: &CommitRequest) -> Result<String, AdapterError> {
        self.enter_repo("create_commit")?;
        let mut state = self.state();

        match request.branch.as_deref() {
            None | Some("main") => apply_changes(&mut state, &request.changes, &request.message)?,
            Some(_) => {
                state.commits += 1;
                state.branch_commits.push(request.clone());
            }
        }
        Ok(format!("commit-{}", state.commits))
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequest>, AdapterError> {
        self.enter_repo("fetch_pull_requests")?;
        Ok(self
            .state()
            .pull_requests
            .iter()
            .filter(|stored| stored.open)
            .map(|stored| stored.pull_request.clone())
            .collect())
    }

    async fn fetch_pull_request(&self, id: &str) -> Result<PullRequest, AdapterError> {
        self.enter_repo("fetch_pull_request")?;
        self.state()
            .pull_requests
            .iter()
            .find(|stored| stored.pull_request.id == id)
            .map(|stored| stored.pull_request.clone())
            .ok_or_else(|| AdapterError::NotFound(format!("pull request {id}")))
    }

    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, AdapterError> {
        self.enter_repo("create_pull_request")?;
        let mut state = self.state();
        state.commits += 1;

        let pull_request = PullRequest {
            id: (state.pull_requests.len() + 1).to_string(),
            title: request.title.clone(),
            description: request.description.clone(),
            commit_sha: Some(format!("commit-{}", state.commits)),
            created_at: "2024-01-01T00:00:00Z".into(),
            url: None,
        };
        state.pull_requests.push(StoredPullRequest {
            pull_request: pull_request.clone(),
            changes: request.changes.clone(),
            open: true,
        });
        Ok(pull_request)
    }

    async fn update_pull_request(
        &self,
        id: &str,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, AdapterError> {
        self.enter_repo("update_pull_request")?;
        let mut state = self.state();
        let stored = state
            .pull_requests
            .iter_mut()
            .find(|stored| stored.open && stored.pull_request.id == id)
            .ok_or_else(|| AdapterError::NotFound(format!("pull request {id}")))?;

        if let Some(title) = &update.title {
            stored.pull_request.title = title.clone();
        }
        if let Some(description) = &update.description {
            stored.pull_request.description = description.clone();
        }
        Ok(stored.pull_request.clone())
    }

    async fn delete_pull_request(&self, id: &str) -> Result<(), AdapterError> {
        self.enter_repo("delete_pull_request")?;
        let mut state = self.state();
        let stored = state
            .pull_requests
            .iter_mut()
            .find(|stored| stored.open && stored.pull_request.id == id)
            .ok_or_else(|| AdapterError::NotFound(format!("pull request {id}")))?;
        stored.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> InMemoryAdapter {
        let adapter = InMemoryAdapter::new("Memory");
        adapter.set_owner(Some("octo".into()));
        adapter.set_repo(Some("cfp".into()));
        adapter
    }

    #[tokio::test]
    async fn operations_require_a_repository() {
        let adapter = InMemoryAdapter::new("Memory");
        let err = adapter.fetch_file("config.json").await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingSession("owner")));
    }

    #[tokio::test]
    async fn directory_lists_only_direct_json_files() {
        let adapter = adapter();
        adapter.insert_file("collections/talks/a.json", "{}");
        adapter.insert_file("collections/talks/.gitkeep", "");
        adapter.insert_file("collections/talks/notes.md", "# notes");
        adapter.insert_file("collections/talks/nested/b.json", "{}");
        adapter.insert_file("collections/talks-archive/c.json", "{}");

        let files = adapter.fetch_directory("collections/talks").await.unwrap();
        assert_eq!(
            files,
            vec![DirectoryFile {
                path: "collections/talks/a.json".into(),
                content: "{}".into(),
            }]
        );

        let missing = adapter.fetch_directory("collections/none").await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn create_update_delete_enforce_existence() {
        let adapter = adapter();

        adapter.create_file("a.json", "1", None).await.unwrap();
        assert!(matches!(
            adapter.create_file("a.json", "2", None).await,
            Err(AdapterError::AlreadyExists(_))
        ));

        adapter.update_file("a.json", "2", None).await.unwrap();
        assert_eq!(adapter.file("a.json").as_deref(), Some("2"));
        assert!(matches!(
            adapter.update_file("b.json", "2", None).await,
            Err(AdapterError::NotFound(_))
        ));

        adapter.delete_file("a.json", None).await.unwrap();
        assert!(adapter.file("a.json").is_none());
        assert!(matches!(
            adapter.delete_file("a.json", None).await,
            Err(AdapterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let adapter = adapter();
        adapter.create_file("a.json", "1", Some("first")).await.unwrap();
        adapter.update_file("a.json", "2", Some("second")).await.unwrap();

        let history = adapter.fetch_file_history("a.json").await.unwrap();
        let messages: Vec<&str> = history.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn rejected_token_runs_handler() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let adapter = adapter();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        adapter.set_unauthorized_handler(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        adapter.reject_token(true);

        let err = adapter.fetch_repositories().await.unwrap_err();
        assert!(matches!(err, AdapterError::Unauthorized));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merged_pull_request_applies_changes() {
        let adapter = adapter();
        let pr = adapter
            .create_pull_request(&PullRequestRequest {
                title: "Add talk".into(),
                description: String::new(),
                changes: vec![FileChange::Create {
                    path: "a.json".into(),
                    content: "{}".into(),
                }],
            })
            .await
            .unwrap();
        assert!(adapter.file("a.json").is_none());

        adapter.merge_pull_request(&pr.id).unwrap();
        assert_eq!(adapter.file("a.json").as_deref(), Some("{}"));
        assert!(adapter.fetch_pull_requests().await.unwrap().is_empty());
    }
}
