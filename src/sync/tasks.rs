//! Task mutations: create, update, delete and completion toggling.
//!
//! Every mutation calls the backend first. The cache, the published snapshot
//! and the reminder are only touched once the backend has accepted the
//! change, so a failed call leaves the previous state authoritative.

use log::{error, info, warn};

use super::snapshot::{with_task, without_task};
use super::SyncService;
use crate::backend::BackendError;
use crate::error::{Error, Result};
use crate::repositories::TaskRepository;
use crate::task::{reminder_key_for, Task};

impl SyncService {
    /// Creates a new task through the backend.
    ///
    /// # Arguments
    /// * `task` - The task to create; any identifiers it carries are ignored
    ///
    /// # Returns
    /// The task as stored, with its server-assigned remote id and local id
    ///
    /// # Errors
    /// * `Error::Unauthenticated` when nobody is signed in
    /// * `Error::InvalidTask` when the task is rejected before the call
    /// * the backend or storage error; nothing is published in that case
    pub async fn create(&self, task: Task) -> Result<Task> {
        let user_id = self.current_user()?;
        task.validate()?;

        let mut outgoing = task.normalized();
        outgoing.remote_id = None;
        outgoing.local_id = None;

        let created = match self.backend.create_task(&outgoing).await {
            Ok(created) => created.normalized(),
            Err(e) => {
                error!("❌ Failed to create task '{}': {e}", outgoing.title);
                return Err(e.into());
            }
        };

        let stored = self.store(&user_id, created).await?;
        info!("✅ Created task '{}'", stored.title);

        self.publish(|current| with_task(&current.tasks, stored.clone()));
        self.sync_reminder(&stored);
        Ok(stored)
    }

    /// Replaces the task with remote id `remote_id`.
    ///
    /// The reminder is rescheduled when the task still has a future start
    /// time and cancelled otherwise.
    ///
    /// # Errors
    /// * `Error::Unauthenticated` when nobody is signed in
    /// * `Error::NotFound` when the backend does not know the task
    /// * any other backend or storage error; the published task is unchanged
    pub async fn update(&self, remote_id: &str, task: Task) -> Result<Task> {
        let user_id = self.current_user()?;
        task.validate()?;

        let _guard = self.lock_task(remote_id).await;

        let mut outgoing = task.normalized();
        outgoing.remote_id = Some(remote_id.to_string());

        let mut updated = match self.backend.update_task(remote_id, &outgoing).await {
            Ok(updated) => updated.normalized(),
            Err(e) => {
                error!("❌ Failed to update task {remote_id}: {e}");
                return Err(e.into());
            }
        };
        if updated.remote_id.is_none() {
            updated.remote_id = Some(remote_id.to_string());
        }

        let stored = self.store(&user_id, updated).await?;
        info!("✅ Updated task '{}'", stored.title);

        self.publish(|current| with_task(&current.tasks, stored.clone()));
        self.sync_reminder(&stored);
        Ok(stored)
    }

    /// Deletes the task with remote id `remote_id`.
    ///
    /// A task the backend no longer knows is still purged from the cache,
    /// the snapshot and the reminders, and reported as `Error::NotFound`;
    /// deleting twice is therefore harmless.
    ///
    /// # Errors
    /// * `Error::Unauthenticated` when nobody is signed in
    /// * `Error::NotFound` as described above
    /// * any other backend error, in which case the task stays
    pub async fn delete(&self, remote_id: &str) -> Result<()> {
        let user_id = self.current_user()?;
        let _guard = self.lock_task(remote_id).await;

        let missing = match self.backend.delete_task(remote_id).await {
            Ok(()) => None,
            Err(BackendError::NotFound(what)) => {
                warn!("⚠️  Task {remote_id} was already gone remotely, purging local copy");
                Some(what)
            }
            Err(e) => {
                error!("❌ Failed to delete task {remote_id}: {e}");
                return Err(e.into());
            }
        };

        let removed = {
            let storage = self.storage.lock().await;
            TaskRepository::delete_by_remote_or_local_id(&storage.conn, &user_id, Some(remote_id), None).await?
        };

        self.scheduler.cancel_key(&reminder_key_for(remote_id));
        if self.snapshot().contains(remote_id) {
            self.publish(|current| without_task(&current.tasks, remote_id));
        }

        match missing {
            Some(what) => Err(Error::NotFound(what)),
            None => {
                info!("✅ Deleted task {remote_id} ({removed} cached rows)");
                Ok(())
            }
        }
    }

    /// Flips the completion flag of `task` through [`Self::update`].
    ///
    /// # Errors
    /// `Error::NotFound` when the task has never reached the backend, plus the
    /// errors of [`Self::update`]
    pub async fn toggle_completed(&self, task: &Task) -> Result<Task> {
        let remote_id = task
            .remote_id
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("task '{}' has no remote id", task.title)))?;
        self.update(remote_id, task.toggled()).await
    }

    /// Write a task accepted by the backend into the cache, reusing the local
    /// id of the cached row with the same remote id.
    async fn store(&self, user_id: &str, mut task: Task) -> Result<Task> {
        let storage = self.storage.lock().await;

        task.local_id = match task.remote_id.as_deref() {
            Some(remote_id) => TaskRepository::get_by_remote_id(&storage.conn, user_id, remote_id)
                .await?
                .and_then(|cached| cached.local_id),
            None => None,
        };

        let local_id = TaskRepository::upsert(&storage.conn, user_id, &task).await.inspect_err(|e| {
            error!("❌ Failed to store task '{}': {e}", task.title);
        })?;

        task.local_id = Some(local_id);
        task.user_id.get_or_insert_with(|| user_id.to_string());
        Ok(task)
    }
}
