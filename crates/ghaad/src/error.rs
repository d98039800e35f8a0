use crate::adapter::AdapterError;
use crate::config::RepoStatus;

/// A record that does not satisfy its collection's schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {collection} item: {message}")]
pub struct ValidationError {
    pub collection: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no adapter selected")]
    NoAdapter,

    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("invalid item id: {0:?}")]
    InvalidItemId(String),

    #[error("{collection} item {id} is not cached; fetch the collection before updating it")]
    NotCached { collection: String, id: String },

    #[error("repository cannot be initialized while its status is {0}")]
    NotInitializable(RepoStatus),

    #[error("invalid collection set: {0}")]
    Registry(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("repository has no config.json")]
    EmptyRepository,

    #[error("invalid repository config: {0}")]
    InvalidRepoConfig(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl EngineError {
    /// True for failures of a caller-side precondition, which never reach the network.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoAdapter
                | Self::UnknownAdapter(_)
                | Self::UnknownCollection(_)
                | Self::InvalidItemId(_)
                | Self::NotCached { .. }
                | Self::NotInitializable(_)
                | Self::Adapter(AdapterError::MissingSession(_))
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Adapter(AdapterError::Unauthorized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(EngineError::NoAdapter.is_precondition());
        assert!(
            EngineError::NotCached {
                collection: "talks".into(),
                id: "talk_1".into(),
            }
            .is_precondition()
        );
        assert!(EngineError::InvalidItemId("../config".into()).is_precondition());
        assert!(EngineError::Adapter(AdapterError::MissingSession("repo")).is_precondition());
        assert!(!EngineError::Adapter(AdapterError::Unauthorized).is_precondition());
        assert!(!EngineError::EmptyRepository.is_precondition());
    }

    #[test]
    fn validation_error_display() {
        let err = EngineError::from(ValidationError::new("talks", "missing field `title`"));
        assert_eq!(err.to_string(), "invalid talks item: missing field `title`");
    }
}
