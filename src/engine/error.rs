//! Engine errors

use crate::engine::snippet::SnippetId;
use crate::service::HostError;

/// Errors returned by [`crate::engine::Engine`] operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine was closed, by the user or because the host went away
    #[error("engine is closed: {0}")]
    Closed(String),
    /// The snippet id does not belong to this engine
    #[error("unknown snippet #{0}")]
    UnknownSnippet(SnippetId),
    /// Only imports and declarations can be dropped
    #[error("snippet #{0} is not a declaration or import and cannot be dropped")]
    NotPersistent(SnippetId),
    /// The execution host terminated while installing classes
    #[error("execution host terminated: {0}")]
    HostTerminated(String),
    /// The execution host broke its protocol while installing classes
    #[error("execution host failure: {0}")]
    HostFailure(String),
}

impl From<HostError> for EngineError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Terminated(reason) => EngineError::HostTerminated(reason),
            HostError::NotImplemented(reason) | HostError::Internal(reason) => EngineError::HostFailure(reason),
        }
    }
}

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
