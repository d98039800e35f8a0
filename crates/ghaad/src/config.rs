use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Location of the repository configuration file.
pub const REPO_CONFIG_PATH: &str = "config.json";

/// Freshness window of the pull request listing cache.
pub const DEFAULT_PULL_REQUEST_TTL: Duration = Duration::from_secs(5 * 60);

/// Repository-level metadata stored at `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    /// Propose changes as pull requests instead of committing directly.
    #[serde(default = "default_true")]
    pub pr_based_mutations: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            pr_based_mutations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RepoConfig {
    /// Parse `config.json`, which must be a JSON object.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if !value.is_object() {
            return Err("expected a JSON object".into());
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn mutation_mode(&self) -> MutationMode {
        if self.pr_based_mutations {
            MutationMode::PullRequest
        } else {
            MutationMode::DirectCommit
        }
    }
}

/// How item writes reach the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    DirectCommit,
    PullRequest,
}

/// Lifecycle of the target repository as seen by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RepoStatus {
    #[default]
    Unknown,
    /// No `config.json`; the repository has not been initialized.
    Empty,
    Valid,
    /// `config.json` exists but does not match the schema.
    Invalid,
    /// Reserved; no operation moves a repository into this state.
    Pending,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Empty => write!(f, "empty"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// Names under which session fields are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceKeys {
    pub token: String,
    pub repo: String,
    pub owner: String,
    pub adapter: String,
}

impl Default for PersistenceKeys {
    fn default() -> Self {
        Self {
            token: "token".into(),
            repo: "repo".into(),
            owner: "owner".into(),
            adapter: "adapter".into(),
        }
    }
}

/// Application-level engine settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    /// Mirror session fields into the engine's session store.
    pub persisted: bool,
    pub keys: PersistenceKeys,
    pub pull_request_ttl: Duration,
}

impl AppConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            persisted: false,
            keys: PersistenceKeys::default(),
            pull_request_ttl: DEFAULT_PULL_REQUEST_TTL,
        }
    }

    pub fn persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }
}
