use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use futures::future::{join, join_all};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{Adapter, AdapterError, FileChange, FileRevision, PullRequest, PullRequestRequest, Repository};
use crate::collection::{Collection, CollectionSet, item_id};
use crate::config::{AppConfig, MutationMode, REPO_CONFIG_PATH, RepoConfig, RepoStatus};
use crate::error::{EngineError, ValidationError};
use crate::notify::{Change, Subscribers, SubscriptionId};
use crate::persist::SessionStore;
use crate::session::{SessionState, UnauthorizedHandler};


/// Everything an engine is built from.
pub struct EngineConfig {
    pub app: AppConfig,
    pub adapters: Vec<Arc<dyn Adapter>>,
    pub collections: Vec<Collection>,
    /// Durable home of session fields; only used when `app.persisted` is set.
    pub store: Option<Arc<dyn SessionStore>>,
}

/// Collection-oriented data access over files in a hosted Git repository.
///
/// The engine owns the selected adapter, an item cache per collection, the
/// repository status and a subscriber registry. Every mutation confirms the
/// remote write before touching the cache, and every state change is
/// followed by a notification.
///
/// Mutating calls against the same collection must be serialized by the
/// caller: the cache and the provider's revision markers are read and written
/// without a lock spanning the network call.
pub struct Engine {
    app: AppConfig,
    adapters: Vec<Arc<dyn Adapter>>,
    collections: CollectionSet,
    store: Option<Arc<dyn SessionStore>>,
    state: RwLock<EngineState>,
    pull_requests: Mutex<Option<PullRequestCache>>,
    subscribers: Subscribers,
}

#[derive(Default)]
struct EngineState {
    adapter: Option<Arc<dyn Adapter>>,
    session: SessionState,
    status: RepoStatus,
    repo_config: Option<RepoConfig>,
    items: HashMap<String, Vec<Value>>,
}

impl EngineState {
    /// Drop everything that describes the previously targeted repository.
    fn forget_repository(&mut self) {
        self.status = RepoStatus::Unknown;
        self.repo_config = None;
        self.items.clear();
    }
}

struct PullRequestCache {
    fetched_at: Instant,
    pull_requests: Vec<PullRequest>,
}

/// Outcome of a write through the configured mutation channel.
enum Written {
    Committed,
    Proposed(PullRequest),
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let engine = Self {
            collections: CollectionSet::new(config.collections)?,
            app: config.app,
            adapters: config.adapters,
            store: config.store,
            state: RwLock::new(EngineState::default()),
            pull_requests: Mutex::new(None),
            subscribers: Subscribers::default(),
        };

        engine.restore_session();
        Ok(engine)
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app
    }

    // -- adapters and session --

    pub fn get_adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    pub fn get_adapter(&self) -> Option<Arc<dyn Adapter>> {
        self.read_state().adapter.clone()
    }

    /// Select the active adapter, or clear the selection with `None`.
    pub fn set_adapter(&self, adapter: Option<Arc<dyn Adapter>>) {
        let name = adapter.as_ref().map(|a| a.name().to_owned());

        {
            let mut state = self.write_state();
            if let Some(adapter) = &adapter {
                apply_session(adapter.as_ref(), &state.session);
            }
            state.adapter = adapter;
            state.forget_repository();
        }
        self.clear_pull_request_cache();

        info!(adapter = name.as_deref().unwrap_or("none"), "adapter selected");
        self.persist(&self.app.keys.adapter, name.as_deref());
        self.subscribers.notify(Change::AdapterChanged);
    }

    /// Select a registered adapter by name, ignoring case.
    pub fn select_adapter(&self, name: &str) -> Result<Arc<dyn Adapter>, EngineError> {
        let adapter = self
            .find_adapter(name)
            .ok_or_else(|| EngineError::UnknownAdapter(name.to_owned()))?;
        self.set_adapter(Some(adapter.clone()));
        Ok(adapter)
    }

    pub fn get_token(&self) -> Option<String> {
        self.read_state().session.token.clone()
    }

    pub fn get_repo_owner(&self) -> Option<String> {
        self.read_state().session.owner.clone()
    }

    pub fn get_repo_name(&self) -> Option<String> {
        self.read_state().session.repo.clone()
    }

    /// Set the access token on every adapter.
    pub fn set_token(&self, token: Option<String>) {
        for adapter in &self.adapters {
            adapter.set_token(token.clone());
        }
        self.apply_to_selected(|adapter| adapter.set_token(token.clone()));
        self.write_state().session.token = token.clone();

        self.persist(&self.app.keys.token, token.as_deref());
        self.subscribers.notify(Change::SessionChanged);
    }

    /// Set the repository owner on every adapter.
    pub fn set_repo_owner(&self, owner: Option<String>) {
        for adapter in &self.adapters {
            adapter.set_owner(owner.clone());
        }
        self.apply_to_selected(|adapter| adapter.set_owner(owner.clone()));

        let changed = {
            let mut state = self.write_state();
            let changed = state.session.owner != owner;
            state.session.owner = owner.clone();
            if changed {
                state.forget_repository();
            }
            changed
        };
        if changed {
            self.clear_pull_request_cache();
        }

        self.persist(&self.app.keys.owner, owner.as_deref());
        self.subscribers.notify(Change::SessionChanged);
    }

    /// Set the repository name on every adapter.
    pub fn set_repo_name(&self, repo: Option<String>) {
        for adapter in &self.adapters {
            adapter.set_repo(repo.clone());
        }
        self.apply_to_selected(|adapter| adapter.set_repo(repo.clone()));

        let changed = {
            let mut state = self.write_state();
            let changed = state.session.repo != repo;
            state.session.repo = repo.clone();
            if changed {
                state.forget_repository();
            }
            changed
        };
        if changed {
            self.clear_pull_request_cache();
        }

        self.persist(&self.app.keys.repo, repo.as_deref());
        self.subscribers.notify(Change::SessionChanged);
    }

    /// Install the same unauthorized callback on every adapter.
    pub fn set_unauthorized_handler(&self, handler: impl Fn() + Send + Sync + 'static) {
        let handler: UnauthorizedHandler = Arc::new(handler);
        for adapter in &self.adapters {
            adapter.set_unauthorized_handler(Some(handler.clone()));
        }
        self.apply_to_selected(|adapter| adapter.set_unauthorized_handler(Some(handler.clone())));
    }

    /// Clear credentials and target repository everywhere, including the store.
    pub fn logout(&self) {
        for adapter in &self.adapters {
            apply_session(adapter.as_ref(), &SessionState::default());
        }
        self.apply_to_selected(|adapter| apply_session(adapter, &SessionState::default()));

        {
            let mut state = self.write_state();
            state.session = SessionState::default();
            state.forget_repository();
        }
        self.clear_pull_request_cache();

        let keys = &self.app.keys;
        for key in [&keys.token, &keys.owner, &keys.repo] {
            self.persist(key, None);
        }
        info!("logged out");
        self.subscribers.notify(Change::SessionChanged);
    }

    /// Repositories reachable with the active adapter's token.
    pub async fn fetch_repositories(&self) -> Result<Vec<Repository>, EngineError> {
        let adapter = self.active_adapter()?;
        Ok(adapter.fetch_repositories().await?)
    }

    // -- repository configuration --

    pub fn get_repo_status(&self) -> RepoStatus {
        self.read_state().status
    }

    pub fn get_repo_config(&self) -> Option<RepoConfig> {
        self.read_state().repo_config.clone()
    }

    /// Fetch `config.json` and derive the repository status from the outcome.
    ///
    /// A missing file sets `Empty` and fails with `EmptyRepository`; a file
    /// that does not parse sets `Invalid` and fails with `InvalidRepoConfig`.
    pub async fn fetch_repo_config(&self) -> Result<RepoConfig, EngineError> {
        let adapter = self.active_adapter()?;
        let result = self.load_repo_config(adapter.as_ref()).await;

        if !matches!(result, Err(EngineError::Adapter(_))) {
            self.subscribers
                .notify(Change::RepoStatusChanged(self.get_repo_status()));
        }
        result
    }

    /// Reload the repository config and every collection concurrently.
    ///
    /// A collection that fails to load is cached as empty and a config that
    /// fails to load falls back to the default, so one broken source never
    /// blocks the rest. Subscribers are notified once at the end.
    pub async fn sync(&self) -> Result<(), EngineError> {
        let adapter = self.active_adapter()?;
        let collections = self.collections.all();

        let (config, loaded) = join(
            self.load_repo_config(adapter.as_ref()),
            join_all(
                collections
                    .iter()
                    .map(|collection| self.load_items(adapter.as_ref(), collection)),
            ),
        )
        .await;

        let config = config.unwrap_or_else(|e| {
            warn!(error = %e, "repository config unavailable, using defaults");
            RepoConfig::default()
        });

        let loaded: Vec<(String, Vec<Value>)> = collections
            .iter()
            .zip(loaded)
            .map(|(collection, result)| {
                let items = result.unwrap_or_else(|e| {
                    warn!(collection = collection.id(), error = %e, "collection fetch failed");
                    Vec::new()
                });
                (collection.id().to_owned(), items)
            })
            .collect();

        {
            let mut state = self.write_state();
            state.repo_config = Some(config);
            state.items.extend(loaded);
        }

        info!(collections = collections.len(), "sync complete");
        self.subscribers.notify(Change::Synced);
        Ok(())
    }

    // -- collections --

    pub fn get_collections(&self) -> &[Collection] {
        self.collections.all()
    }

    /// Look a collection up by id, singular name, plural name or path.
    pub fn get_collection(&self, key: &str) -> Result<&Collection, EngineError> {
        self.collections.get(key)
    }

    /// Cached items of a collection; empty if it was never fetched.
    pub fn get_collection_items(&self, key: &str) -> Result<Vec<Value>, EngineError> {
        let collection = self.collections.get(key)?;
        Ok(self.cached_items(collection))
    }

    /// Cached items deserialized into a record type.
    pub fn get_collection_items_as<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, EngineError> {
        self.get_collection_items(key)?
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| EngineError::Serialization(e.to_string()))
            })
            .collect()
    }

    /// Re-read every item of a collection and replace its cache entry.
    pub async fn fetch_collection_items(&self, key: &str) -> Result<Vec<Value>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;

        let items = self.load_items(adapter.as_ref(), collection).await?;
        self.write_state()
            .items
            .insert(collection.id().to_owned(), items.clone());

        self.notify_collection(collection);
        Ok(items)
    }

    /// Fetch one item. An absent file is `Ok(None)`; a malformed one is an error.
    pub async fn fetch_collection_item(
        &self,
        key: &str,
        id: &str,
    ) -> Result<Option<Value>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;

        let path = item_path(collection, id)?;

        match adapter.fetch_file(&path).await {
            Ok(raw) => Ok(Some(parse_item_file(collection, id, &raw)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commits that touched an item's file, newest first.
    pub async fn fetch_item_history(
        &self,
        key: &str,
        id: &str,
    ) -> Result<Vec<FileRevision>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;
        let path = item_path(collection, id)?;
        Ok(adapter.fetch_file_history(&path).await?)
    }

    /// Create an item with a freshly generated id.
    ///
    /// The cache is only extended after the provider confirmed the write.
    /// Under pull-request mutations the change is proposed instead and the
    /// cache is returned unchanged.
    pub async fn add_to_collection(&self, key: &str, data: Value) -> Result<Vec<Value>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;

        let id = collection.generate_id();
        let item = validate_with_id(collection, data, &id)?;
        let change = FileChange::Create {
            path: collection.item_path(&id),
            content: file_content(&item)?,
        };
        let message = format!("Create {} {id}", collection.names().singular);

        if let Written::Proposed(_) = self.write(adapter.as_ref(), change, message).await? {
            return Ok(self.cached_items(collection));
        }

        let items = {
            let mut state = self.write_state();
            let entry = state.items.entry(collection.id().to_owned()).or_default();
            entry.push(item);
            entry.clone()
        };

        info!(collection = collection.id(), id, "item created");
        self.notify_collection(collection);
        Ok(items)
    }

    /// Replace an item that is present in the cache.
    pub async fn update_in_collection(
        &self,
        key: &str,
        id: &str,
        data: Value,
    ) -> Result<Vec<Value>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;
        let path = item_path(collection, id)?;

        let cached = self
            .cached_items(collection)
            .iter()
            .any(|item| item_id(item) == Some(id));
        if !cached {
            return Err(EngineError::NotCached {
                collection: collection.id().to_owned(),
                id: id.to_owned(),
            });
        }

        let item = validate_with_id(collection, data, id)?;
        let change = FileChange::Update {
            path,
            content: file_content(&item)?,
        };
        let message = format!("Update {} {id}", collection.names().singular);

        if let Written::Proposed(_) = self.write(adapter.as_ref(), change, message).await? {
            return Ok(self.cached_items(collection));
        }

        let items = {
            let mut state = self.write_state();
            let entry = state.items.entry(collection.id().to_owned()).or_default();
            match entry.iter_mut().find(|existing| item_id(existing) == Some(id)) {
                Some(existing) => *existing = item,
                None => entry.push(item),
            }
            entry.clone()
        };

        info!(collection = collection.id(), id, "item updated");
        self.notify_collection(collection);
        Ok(items)
    }

    /// Delete an item's file, then evict it from the cache.
    pub async fn remove_from_collection(
        &self,
        key: &str,
        id: &str,
    ) -> Result<Vec<Value>, EngineError> {
        let adapter = self.active_adapter()?;
        let collection = self.collections.get(key)?;

        let change = FileChange::Delete {
            path: item_path(collection, id)?,
        };
        let message = format!("Delete {} {id}", collection.names().singular);

        if let Written::Proposed(_) = self.write(adapter.as_ref(), change, message).await? {
            return Ok(self.cached_items(collection));
        }

        let items = {
            let mut state = self.write_state();
            let entry = state.items.entry(collection.id().to_owned()).or_default();
            entry.retain(|item| item_id(item) != Some(id));
            entry.clone()
        };

        info!(collection = collection.id(), id, "item removed");
        self.notify_collection(collection);
        Ok(items)
    }

    // -- initialization --

    /// Write the placeholder that makes a collection's directory exist.
    pub async fn initialize_collection(&self, collection: &Collection) -> Result<(), EngineError> {
        let adapter = self.active_adapter()?;
        let message = format!("Initialize {} collection", collection.names().plural);

        match adapter
            .create_file(&collection.placeholder_path(), "", Some(&message))
            .await
        {
            Ok(()) | Err(AdapterError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `config.json` into an empty or invalid repository and mark it valid.
    pub async fn initialize_repo_config(&self, config: &RepoConfig) -> Result<(), EngineError> {
        let adapter = self.active_adapter()?;
        let status = self.initializable_status()?;

        let content = config
            .to_pretty_json()
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        let message = "Initialize repository config";

        if status == RepoStatus::Invalid {
            adapter
                .update_file(REPO_CONFIG_PATH, &content, Some(message))
                .await?;
        } else {
            adapter
                .create_file(REPO_CONFIG_PATH, &content, Some(message))
                .await?;
        }

        self.set_repo_state(RepoStatus::Valid, Some(config.clone()));
        self.subscribers
            .notify(Change::RepoStatusChanged(RepoStatus::Valid));
        Ok(())
    }

    /// Lay out every collection directory and a default `config.json`.
    ///
    /// Only allowed while the repository is `Empty` or `Invalid`. Writes run
    /// one after another since providers reject concurrent commits to the
    /// same branch.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.active_adapter()?;
        self.initializable_status()?;

        for collection in self.collections.all() {
            self.initialize_collection(collection).await?;
        }
        self.initialize_repo_config(&RepoConfig::default()).await
    }

    // -- pull requests --

    /// Open pull requests, served from a cache while it is younger than the
    /// configured window. `force` always goes to the provider.
    pub async fn fetch_pull_requests(&self, force: bool) -> Result<Vec<PullRequest>, EngineError> {
        let adapter = self.active_adapter()?;

        if !force {
            let cache = self.pull_request_cache();
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.app.pull_request_ttl
            {
                debug!("serving pull requests from cache");
                return Ok(cached.pull_requests.clone());
            }
        }

        let pull_requests = adapter.fetch_pull_requests().await?;
        *self.pull_request_cache() = Some(PullRequestCache {
            fetched_at: Instant::now(),
            pull_requests: pull_requests.clone(),
        });

        self.subscribers.notify(Change::PullRequestsChanged);
        Ok(pull_requests)
    }

    // -- subscriptions --

    pub fn subscribe(&self, listener: impl Fn(&Change) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribers.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // -- internals --

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pull_request_cache(&self) -> MutexGuard<'_, Option<PullRequestCache>> {
        self.pull_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_pull_request_cache(&self) {
        *self.pull_request_cache() = None;
    }

    fn active_adapter(&self) -> Result<Arc<dyn Adapter>, EngineError> {
        self.get_adapter().ok_or(EngineError::NoAdapter)
    }

    fn find_adapter(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Mirror a session change onto a selected adapter that was not registered.
    fn apply_to_selected(&self, apply: impl FnOnce(&dyn Adapter)) {
        if let Some(selected) = self.get_adapter()
            && !self.adapters.iter().any(|a| Arc::ptr_eq(a, &selected))
        {
            apply(selected.as_ref());
        }
    }

    fn cached_items(&self, collection: &Collection) -> Vec<Value> {
        self.read_state()
            .items
            .get(collection.id())
            .cloned()
            .unwrap_or_default()
    }

    fn notify_collection(&self, collection: &Collection) {
        self.subscribers.notify(Change::CollectionChanged {
            collection: collection.id().to_owned(),
        });
    }

    fn mutation_mode(&self) -> MutationMode {
        self.read_state()
            .repo_config
            .as_ref()
            .map_or(MutationMode::DirectCommit, RepoConfig::mutation_mode)
    }

    fn initializable_status(&self) -> Result<RepoStatus, EngineError> {
        match self.get_repo_status() {
            status @ (RepoStatus::Empty | RepoStatus::Invalid) => Ok(status),
            status => Err(EngineError::NotInitializable(status)),
        }
    }

    fn set_repo_state(&self, status: RepoStatus, config: Option<RepoConfig>) {
        let mut state = self.write_state();
        if state.status != status {
            info!(from = %state.status, to = %status, "repository status changed");
        }
        state.status = status;
        state.repo_config = config;
    }

    async fn load_repo_config(&self, adapter: &dyn Adapter) -> Result<RepoConfig, EngineError> {
        debug!(path = REPO_CONFIG_PATH, "fetching repository config");

        let raw = match adapter.fetch_file(REPO_CONFIG_PATH).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                self.set_repo_state(RepoStatus::Empty, None);
                return Err(EngineError::EmptyRepository);
            }
            Err(e) => return Err(e.into()),
        };

        match RepoConfig::parse(&raw) {
            Ok(config) => {
                self.set_repo_state(RepoStatus::Valid, Some(config.clone()));
                Ok(config)
            }
            Err(message) => {
                self.set_repo_state(RepoStatus::Invalid, None);
                Err(EngineError::InvalidRepoConfig(message))
            }
        }
    }

    async fn load_items(
        &self,
        adapter: &dyn Adapter,
        collection: &Collection,
    ) -> Result<Vec<Value>, EngineError> {
        debug!(collection = collection.id(), "fetching collection");
        let files = adapter.fetch_directory(&collection.directory()).await?;
        files
            .iter()
            .map(|file| {
                let name = file.path.rsplit('/').next().unwrap_or(&file.path);
                let id = name.strip_suffix(".json").unwrap_or(name);
                parse_item_file(collection, id, &file.content)
            })
            .collect()
    }

    /// Send a change through the channel selected by the repository config.
    async fn write(
        &self,
        adapter: &dyn Adapter,
        change: FileChange,
        message: String,
    ) -> Result<Written, EngineError> {
        match self.mutation_mode() {
            MutationMode::DirectCommit => {
                match &change {
                    FileChange::Create { path, content } => {
                        adapter.create_file(path, content, Some(&message)).await?
                    }
                    FileChange::Update { path, content } => {
                        adapter.update_file(path, content, Some(&message)).await?
                    }
                    FileChange::Delete { path } => adapter.delete_file(path, Some(&message)).await?,
                }
                Ok(Written::Committed)
            }
            MutationMode::PullRequest => {
                let request = PullRequestRequest {
                    title: message,
                    description: format!("Proposed by {}.", self.app.app_name),
                    changes: vec![change],
                };
                let pull_request = adapter.create_pull_request(&request).await?;
                info!(pull_request = %pull_request.id, "change proposed");

                self.clear_pull_request_cache();
                self.subscribers.notify(Change::PullRequestsChanged);
                Ok(Written::Proposed(pull_request))
            }
        }
    }

    fn persisted_store(&self) -> Option<&dyn SessionStore> {
        if self.app.persisted {
            self.store.as_deref()
        } else {
            None
        }
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let Some(store) = self.persisted_store() else {
            return;
        };
        let result = match value {
            Some(value) => store.set(key, value),
            None => store.remove(key),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist session field");
        }
    }

    fn restore_session(&self) {
        let Some(store) = self.persisted_store() else {
            return;
        };
        let read = |key: &str| {
            store.get(key).unwrap_or_else(|e| {
                warn!(key, error = %e, "failed to restore session field");
                None
            })
        };

        let keys = &self.app.keys;
        let session = SessionState {
            token: read(&keys.token),
            owner: read(&keys.owner),
            repo: read(&keys.repo),
        };
        for adapter in &self.adapters {
            apply_session(adapter.as_ref(), &session);
        }

        let adapter = read(&keys.adapter).and_then(|name| {
            let found = self.find_adapter(&name);
            if found.is_none() {
                warn!(adapter = name, "persisted adapter is not registered");
            }
            found
        });

        debug!(adapter = ?adapter.as_ref().map(|a| a.name().to_owned()), "session restored");
        let mut state = self.write_state();
        state.session = session;
        state.adapter = adapter;
    }
}

fn apply_session(adapter: &dyn Adapter, session: &SessionState) {
    adapter.set_token(session.token.clone());
    adapter.set_owner(session.owner.clone());
    adapter.set_repo(session.repo.clone());
}

/// Force `id` onto the caller's data and validate the result.
fn validate_with_id(collection: &Collection, data: Value, id: &str) -> Result<Value, EngineError> {
    let Value::Object(mut fields) = data else {
        return Err(ValidationError::new(collection.id(), "expected a JSON object").into());
    };
    fields.insert("id".to_owned(), Value::String(id.to_owned()));

    let item = collection.validate(Value::Object(fields))?;
    if item_id(&item) != Some(id) {
        return Err(ValidationError::new(collection.id(), "schema changed the item id").into());
    }
    Ok(item)
}

/// Path of an item's file. Ids name a single file inside the collection directory.
fn item_path(collection: &Collection, id: &str) -> Result<String, EngineError> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(EngineError::InvalidItemId(id.to_owned()));
    }
    Ok(collection.item_path(id))
}

/// Parse the file `{id}.json`; the item inside must carry that id.
fn parse_item_file(collection: &Collection, id: &str, raw: &str) -> Result<Value, EngineError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ValidationError::new(collection.id(), format!("malformed JSON: {e}")))?;
    let item = collection.validate(value)?;

    match item_id(&item) {
        Some(found) if found == id => Ok(item),
        found => Err(ValidationError::new(
            collection.id(),
            format!("file {id}.json holds item {}", found.unwrap_or("without an id")),
        )
        .into()),
    }
}

/// Canonical file form of an item.
fn file_content(item: &Value) -> Result<String, EngineError> {
    serde_json::to_string_pretty(item).map_err(|e| EngineError::Serialization(e.to_string()))
}
