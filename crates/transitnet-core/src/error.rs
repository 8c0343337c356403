//! Error types for transitnet.

use std::path::PathBuf;
use std::time::Duration;

/// Errors reported by a [`crate::NetworkApi`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The referenced resource does not exist (or is already gone).
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The resource is still referenced by another resource.
    #[error("dependency violation: {0}")]
    DependencyViolation(String),

    /// The requested association, route or rule is already in place.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other service-side error.
    #[error("{code}: {message}")]
    Api {
        /// Service error code (e.g. `InvalidParameterValue`).
        code: String,
        /// Human-readable message returned by the service.
        message: String,
    },

    /// A successful response lacked a field the caller depends on.
    #[error("response is missing {0}")]
    MissingField(&'static str),

    /// Transport, credential, or other non-service failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by the [`crate::ResourceStore`].
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No resource is recorded under the given logical name.
    #[error("no resource recorded under '{name}' in {}", path.display())]
    MissingKey {
        /// Logical resource name.
        name: String,
        /// State file that was consulted.
        path: PathBuf,
    },

    /// The state file exists but does not hold a JSON object of records.
    #[error("state file {} is not valid: {source}", path.display())]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the state file failed.
    #[error("failed to access state file {}: {source}", path.display())]
    Io {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for resource store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Top-level error type for transitnet operations.
#[derive(Debug, thiserror::Error)]
pub enum TransitNetError {
    /// Resource store failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// Cloud provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The topology file is missing, unreadable, or inconsistent.
    #[error("topology error: {0}")]
    Topology(String),

    /// A polled resource did not reach the wanted state in time.
    #[error("timed out after {waited:?} waiting for {what} {id} to become {wanted}")]
    Timeout {
        /// Resource description (e.g. `"transit gateway"`).
        what: String,
        /// Resource ID.
        id: String,
        /// Wanted state(s), joined with `|`.
        wanted: String,
        /// Time spent polling.
        waited: Duration,
    },

    /// A polled resource entered a terminal state other than the wanted one.
    #[error("{what} {id} entered state '{state}' while waiting for {wanted}")]
    UnexpectedState {
        /// Resource description.
        what: String,
        /// Resource ID.
        id: String,
        /// Observed state.
        state: String,
        /// Wanted state(s), joined with `|`.
        wanted: String,
    },

    /// Reading the operator's answer at a checkpoint failed.
    #[error("checkpoint input failed: {0}")]
    Checkpoint(#[source] std::io::Error),

    /// The operator interrupted the run.
    #[error("interrupted; everything created so far is recorded")]
    Interrupted,
}

impl TransitNetError {
    /// Whether this error means the target resource no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound(_)))
    }
}

/// Convenience result type for transitnet operations.
pub type TransitNetResult<T> = Result<T, TransitNetError>;
