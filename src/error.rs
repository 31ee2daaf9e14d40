use crate::types::RestrictorName;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Error produced by a user-supplied `enabled`, scope, or override closure.
pub type EvalError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// An always-empty filter is never an error: "nothing is allowed" is an
/// ordinary composition result represented by [`Filter::Empty`](crate::Filter).
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid restrictor registration. Raised at registration time, never
    /// deferred to composition.
    #[error("invalid restrictor `{name}`: {reason}")]
    Configuration {
        name: RestrictorName,
        reason: String,
    },
    /// A restrictor's `enabled` or scope closure failed during composition.
    /// Never downgraded to "treat as disabled".
    #[error("evaluation failed for restrictor `{name}`: {source}")]
    Evaluation {
        name: RestrictorName,
        #[source]
        source: EvalError,
    },
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
