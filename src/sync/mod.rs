//! Synchronization service for the task core.
//!
//! This module provides the [`SyncService`] struct, which keeps the local
//! task cache and the published [`TaskSnapshot`] consistent with the remote
//! backend, and drives the [`ReminderScheduler`] as tasks change.
//!
//! The service is the single writer of the task collection:
//! - Remote first: local state changes only after the backend accepted it
//! - The snapshot is swapped as a whole, so observers never see a partial list
//! - A failed read keeps the last published snapshot (stale beats empty)
//! - Mutations of the same task are serialized, different tasks run concurrently

pub mod snapshot;
pub mod tasks;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use crate::auth::SessionProvider;
use crate::backend::Backend;
use crate::constants::LOG_REFRESH_STARTED;
use crate::error::{Error, Result};
use crate::reminders::{ReminderScheduler, ScheduleOutcome};
use crate::repositories::TaskRepository;
use crate::storage::LocalStorage;
use crate::task::Task;

pub use snapshot::{TaskFilter, TaskSnapshot, TaskSort, TaskSummary};

/// Service that keeps the remote backend, the local cache and the published
/// task collection in sync.
///
/// Cloning is cheap; clones share the same state.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use focusflow::auth::{AuthSession, SessionStore};
/// use focusflow::backend::RestBackend;
/// use focusflow::config::Config;
/// use focusflow::reminders::local::{LogNotifier, SystemClock, TokioAlarmService, TokioJobScheduler};
/// use focusflow::reminders::ReminderScheduler;
/// use focusflow::storage::LocalStorage;
/// use focusflow::sync::SyncService;
/// use tokio::sync::Mutex;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let session = Arc::new(SessionStore::signed_in(AuthSession::new("uid-1", "token")));
/// let backend = Arc::new(RestBackend::from_config(&config.api, session.clone())?);
/// let storage = LocalStorage::new(config.storage.resolve_database_path()?.as_deref()).await?;
///
/// let notifier = Arc::new(LogNotifier);
/// let clock = Arc::new(SystemClock);
/// let scheduler = Arc::new(ReminderScheduler::new(
///     Arc::new(TokioAlarmService::new(notifier.clone(), clock.clone())),
///     Arc::new(TokioJobScheduler::new(notifier)),
///     clock,
///     config.reminders.clone(),
/// ));
///
/// let sync = SyncService::new(backend, Arc::new(Mutex::new(storage)), scheduler, session);
/// let mut tasks = sync.subscribe();
/// sync.refresh().await?;
/// println!("{} tasks", tasks.borrow_and_update().len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyncService {
    backend: Arc<dyn Backend>,
    storage: Arc<Mutex<LocalStorage>>,
    scheduler: Arc<ReminderScheduler>,
    session: Arc<dyn SessionProvider>,
    snapshot: Arc<watch::Sender<Arc<TaskSnapshot>>>,
    status: Arc<Mutex<SyncStatus>>,
    sync_in_progress: Arc<Mutex<bool>>,
    task_locks: Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Represents the current status of a synchronization operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// No refresh has run yet
    Idle,
    /// A refresh is currently in progress
    InProgress,
    /// The last refresh completed successfully
    Success,
    /// The last refresh failed
    Error {
        /// Human-readable error message describing what went wrong
        message: String,
    },
}

impl SyncService {
    /// Creates a new `SyncService` publishing an empty snapshot.
    ///
    /// Call [`Self::load_cached`] or [`Self::refresh`] to populate it.
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<Mutex<LocalStorage>>,
        scheduler: Arc<ReminderScheduler>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(TaskSnapshot::default()));
        info!("Sync service created for backend '{}'", backend.backend_type());

        Self {
            backend,
            storage,
            scheduler,
            session,
            snapshot: Arc::new(snapshot),
            status: Arc::new(Mutex::new(SyncStatus::Idle)),
            sync_in_progress: Arc::new(Mutex::new(false)),
            task_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Receiver notified on every publish of the task collection.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TaskSnapshot>> {
        self.snapshot.subscribe()
    }

    /// The currently published task collection.
    pub fn snapshot(&self) -> Arc<TaskSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// The reminder scheduler driven by this service.
    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    /// Outcome of the last refresh.
    pub async fn status(&self) -> SyncStatus {
        self.status.lock().await.clone()
    }

    /// Checks if a refresh is currently in progress.
    pub async fn is_syncing(&self) -> bool {
        *self.sync_in_progress.lock().await
    }

    /// Mirror the remote task list into the cache and publish it.
    ///
    /// Only one refresh runs at a time: a call made while another is running
    /// returns `SyncStatus::InProgress` without contacting the backend.
    ///
    /// # Errors
    /// * `Error::Unauthenticated` when nobody is signed in
    /// * the backend or storage error that stopped the refresh; the published
    ///   snapshot is left as it was
    pub async fn refresh(&self) -> Result<SyncStatus> {
        let user_id = self.current_user()?;

        // Check if a refresh is already in progress and claim it
        {
            let mut sync_guard = self.sync_in_progress.lock().await;
            if *sync_guard {
                return Ok(SyncStatus::InProgress);
            }
            *sync_guard = true;
        }
        *self.status.lock().await = SyncStatus::InProgress;

        let result = self.perform_refresh(&user_id).await;

        *self.sync_in_progress.lock().await = false;

        let status = match &result {
            Ok(()) => SyncStatus::Success,
            Err(e) => SyncStatus::Error { message: e.to_string() },
        };
        *self.status.lock().await = status.clone();

        result.map(|()| status)
    }

    async fn perform_refresh(&self, user_id: &str) -> Result<()> {
        info!("{LOG_REFRESH_STARTED}");

        let remote = match self.backend.list_tasks().await {
            Ok(tasks) => {
                info!("✅ Fetched {} tasks from backend", tasks.len());
                tasks
            }
            Err(e) => {
                error!("❌ Failed to fetch tasks: {e}");
                return Err(e.into());
            }
        };

        let (tasks, anonymous): (Vec<Task>, Vec<Task>) =
            remote.into_iter().partition(|task| task.remote_id.is_some());
        if !anonymous.is_empty() {
            warn!("⚠️  Ignoring {} fetched tasks without an id", anonymous.len());
        }
        let tasks: Vec<Task> = tasks.into_iter().map(Task::normalized).collect();

        let cached = {
            let storage = self.storage.lock().await;
            info!("💾 Storing tasks in local database...");
            match TaskRepository::replace_for_user(&storage.conn, user_id, &tasks).await {
                Ok(cached) => cached,
                Err(e) => {
                    error!("❌ Failed to store tasks: {e}");
                    return Err(e);
                }
            }
        };
        info!("✅ Stored {} tasks in database", cached.len());

        let previous = self.snapshot();
        let published = self.publish(|_| cached);
        self.reconcile_reminders(&previous, &published);
        Ok(())
    }

    /// Publish the cached tasks of the signed-in user without contacting the
    /// backend.
    ///
    /// # Returns
    /// Number of tasks published
    pub async fn load_cached(&self) -> Result<usize> {
        let user_id = self.current_user()?;

        let cached = {
            let storage = self.storage.lock().await;
            TaskRepository::list_by_user(&storage.conn, &user_id).await?
        };
        info!("📦 Loaded {} cached tasks", cached.len());

        let previous = self.snapshot();
        let published = self.publish(|_| cached);
        self.reconcile_reminders(&previous, &published);
        Ok(published.len())
    }

    /// Sign-out cleanup: cancel every reminder, drop the user's cached rows
    /// and publish an empty collection.
    ///
    /// # Returns
    /// Number of cache rows removed
    pub async fn clear_for_user(&self, user_id: &str) -> Result<u64> {
        let cancelled = self.scheduler.cancel_all();

        let removed = {
            let storage = self.storage.lock().await;
            TaskRepository::clear_for_user(&storage.conn, user_id).await?
        };

        self.publish(|_| Vec::new());
        *self.status.lock().await = SyncStatus::Idle;
        info!("🧹 Cleared {removed} cached tasks and {cancelled} reminders for {user_id}");
        Ok(removed)
    }

    /// Identifier of the signed-in user.
    fn current_user(&self) -> Result<String> {
        self.session.current_user_id().ok_or(Error::Unauthenticated)
    }

    /// Replace the published snapshot with the list computed from the current one.
    fn publish(&self, update: impl FnOnce(&TaskSnapshot) -> Vec<Task>) -> Arc<TaskSnapshot> {
        let mut published: Arc<TaskSnapshot> = Arc::default();
        self.snapshot.send_modify(|current| {
            let previous: &TaskSnapshot = current;
            let next = Arc::new(previous.succeed(update(previous)));
            published = Arc::clone(&next);
            *current = next;
        });
        debug!("Published snapshot v{} with {} tasks", published.version, published.len());
        published
    }

    /// Exclusive access to one task's mutations.
    async fn lock_task(&self, remote_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.task_locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            // Drop the locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(remote_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Register, replace or drop the reminder of `task`. Failures are logged:
    /// the task change they belong to has already been committed.
    fn sync_reminder(&self, task: &Task) {
        match self.scheduler.schedule(task) {
            Ok(ScheduleOutcome::Scheduled(_)) => {}
            Ok(ScheduleOutcome::Skipped(reason)) => {
                debug!("No reminder for '{}': {reason:?}", task.title);
            }
            Err(Error::NotPermitted(message)) => warn!("⚠️  {message}"),
            Err(e) => error!("❌ Failed to schedule reminder for '{}': {e}", task.title),
        }
    }

    /// Cancel the reminders of tasks that disappeared and reschedule the rest.
    fn reconcile_reminders(&self, previous: &TaskSnapshot, current: &TaskSnapshot) {
        for task in &previous.tasks {
            let gone = match &task.remote_id {
                Some(remote_id) => !current.contains(remote_id),
                None => true,
            };
            if gone {
                self.scheduler.cancel(task);
            }
        }
        for task in &current.tasks {
            self.sync_reminder(task);
        }
    }
}
