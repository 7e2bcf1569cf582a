//! Error types shared by the cache, the remote client, the synchronizer and
//! the reminder scheduler.

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the task core.
#[derive(Debug, Error)]
pub enum Error {
    /// Connectivity problem or timeout while talking to the task API
    #[error("Network error: {0}")]
    Network(String),

    /// The task API answered with a non-success status
    #[error("Remote API error (HTTP {status}): {body}")]
    RemoteApi { status: u16, body: String },

    /// The task API answered with a body that could not be decoded
    #[error("Invalid response from task API: {0}")]
    InvalidResponse(String),

    /// Local persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),

    /// The platform refused a capability (exact alarms)
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Update or delete referencing an unknown task
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Task rejected before reaching the backend
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// No signed-in user
    #[error("No authenticated session")]
    Unauthenticated,

    /// Alarm, job or notification service failure
    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(message) => Self::Network(message),
            BackendError::Api { status, body } => Self::RemoteApi { status, body },
            BackendError::NotFound(what) => Self::NotFound(what),
            BackendError::InvalidData(message) => Self::InvalidResponse(message),
        }
    }
}

impl Error {
    /// Whether the error classifies as "task not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
