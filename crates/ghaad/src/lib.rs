pub mod adapter;
pub mod collection;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod notify;
pub mod persist;
pub mod session;

pub use adapter::{
    Adapter, AdapterError, AdapterInfo, CommitRequest, DirectoryFile, FileChange, FileRevision,
    OAuthConfig, PullRequest, PullRequestRequest, PullRequestUpdate, Repository,
};
pub use collection::{Collection, CollectionNames, Record, prefixed_id};
pub use config::{
    AppConfig, MutationMode, PersistenceKeys, REPO_CONFIG_PATH, RepoConfig, RepoStatus,
};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, ValidationError};
pub use notify::{Change, SubscriptionId};
pub use persist::{JsonFileStore, MemoryStore, SessionStore, StoreError};
pub use session::{Session, SessionState, UnauthorizedHandler};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
