//! Backend abstraction layer for the remote task store.
//!
//! This module defines the interface the synchronizer uses to talk to the
//! task API, along with its error type. [`rest::RestBackend`] is the HTTP
//! implementation; tests substitute their own.

use async_trait::async_trait;

use crate::task::Task;

pub mod rest;

pub use rest::RestBackend;

/// Common error types for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Remote CRUD over the signed-in user's tasks.
///
/// Implementations perform no retries; retry policy belongs to the caller.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the backend type identifier (e.g., "rest").
    fn backend_type(&self) -> &str;

    async fn list_tasks(&self) -> Result<Vec<Task>, BackendError>;

    /// Create a task; the returned task carries the backend-assigned id.
    async fn create_task(&self, task: &Task) -> Result<Task, BackendError>;

    async fn update_task(&self, remote_id: &str, task: &Task) -> Result<Task, BackendError>;

    async fn delete_task(&self, remote_id: &str) -> Result<(), BackendError>;
}
