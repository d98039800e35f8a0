use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::adapter::AdapterError;

/// Callback invoked when a provider rejects the current access token.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Plain snapshot of the credentials and target repository of an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
}

/// Mutable session shared by every provider implementation.
///
/// Providers own one of these and expose it through `Adapter::session`, which
/// gives them the session setters of the adapter contract for free. All
/// mutation goes through `&self` so adapters can live behind an `Arc`.
#[derive(Default)]
pub struct Session {
    state: RwLock<SessionState>,
    on_unauthorized: RwLock<Option<UnauthorizedHandler>>,
}

impl Session {
    pub fn new(state: SessionState) -> Self {
        Self {
            state: RwLock::new(state),
            on_unauthorized: RwLock::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn token(&self) -> Option<String> {
        self.snapshot().token
    }

    pub fn owner(&self) -> Option<String> {
        self.snapshot().owner
    }

    pub fn repo(&self) -> Option<String> {
        self.snapshot().repo
    }

    pub fn set_token(&self, token: Option<String>) {
        self.write(|state| state.token = token);
    }

    pub fn set_owner(&self, owner: Option<String>) {
        self.write(|state| state.owner = owner);
    }

    pub fn set_repo(&self, repo: Option<String>) {
        self.write(|state| state.repo = repo);
    }

    pub fn set_unauthorized_handler(&self, handler: Option<UnauthorizedHandler>) {
        *self
            .on_unauthorized
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// The access token, or a `MissingSession` error when signed out.
    pub fn require_token(&self) -> Result<String, AdapterError> {
        self.token().ok_or(AdapterError::MissingSession("token"))
    }

    /// Owner and repository name of the target repository.
    pub fn require_repo(&self) -> Result<(String, String), AdapterError> {
        let state = self.snapshot();
        let owner = state.owner.ok_or(AdapterError::MissingSession("owner"))?;
        let repo = state.repo.ok_or(AdapterError::MissingSession("repo"))?;
        Ok((owner, repo))
    }

    /// Run the unauthorized callback once and return the error to surface.
    pub fn unauthorized(&self) -> AdapterError {
        let handler = self
            .on_unauthorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::warn!("provider rejected the access token");
        if let Some(handler) = handler {
            handler();
        }

        AdapterError::Unauthorized
    }

    fn write(&self, update: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut state);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("Session")
            .field("token", &state.token.as_ref().map(|_| "<redacted>"))
            .field("owner", &state.owner)
            .field("repo", &state.repo)
            .finish()
    }
}
