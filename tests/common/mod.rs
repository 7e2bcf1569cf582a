#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use focusflow::auth::{AuthSession, SessionStore};
use focusflow::backend::{Backend, BackendError};
use focusflow::config::ReminderConfig;
use focusflow::reminders::{AlarmService, Clock, JobScheduler, ReminderNotification, ReminderScheduler};
use focusflow::storage::LocalStorage;
use focusflow::sync::SyncService;
use focusflow::task::Task;

pub const USER_ID: &str = "uid-1";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

/// Clock frozen at a settable instant.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Alarm service that records what it was asked to do.
pub struct RecordingAlarms {
    pub allowed: AtomicBool,
    pub permission_requests: AtomicUsize,
    pub armed: Mutex<HashMap<String, (DateTime<Utc>, ReminderNotification)>>,
    pub fail: AtomicBool,
}

impl Default for RecordingAlarms {
    fn default() -> Self {
        Self {
            allowed: AtomicBool::new(true),
            permission_requests: AtomicUsize::new(0),
            armed: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }
}

impl RecordingAlarms {
    pub fn armed_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.armed.lock().unwrap().get(key).map(|(at, _)| *at)
    }

    pub fn count(&self) -> usize {
        self.armed.lock().unwrap().len()
    }
}

impl AlarmService for RecordingAlarms {
    fn can_schedule_exact(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }

    fn request_exact_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn set_exact(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        notification: ReminderNotification,
    ) -> focusflow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(focusflow::Error::Platform("alarm service unavailable".to_string()));
        }
        self.armed
            .lock()
            .unwrap()
            .insert(key.to_string(), (fire_at, notification));
        Ok(())
    }

    fn cancel(&self, key: &str) {
        self.armed.lock().unwrap().remove(key);
    }
}

/// Job scheduler that records enqueued jobs.
#[derive(Default)]
pub struct RecordingJobs {
    pub jobs: Mutex<HashMap<String, (Duration, ReminderNotification)>>,
    pub fail: AtomicBool,
}

impl RecordingJobs {
    pub fn delay(&self, key: &str) -> Option<Duration> {
        self.jobs.lock().unwrap().get(key).map(|(delay, _)| *delay)
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl JobScheduler for RecordingJobs {
    fn enqueue_unique(
        &self,
        key: &str,
        delay: Duration,
        notification: ReminderNotification,
    ) -> focusflow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(focusflow::Error::Platform("job queue full".to_string()));
        }
        self.jobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (delay, notification));
        Ok(())
    }

    fn cancel_unique(&self, key: &str) {
        self.jobs.lock().unwrap().remove(key);
    }
}

/// In-memory task API with failure injection.
#[derive(Default)]
pub struct FakeBackend {
    pub tasks: Mutex<Vec<Task>>,
    next_id: AtomicUsize,
    /// Operation name ("list", "create", "update", "delete") to HTTP status
    failures: Mutex<HashMap<&'static str, u16>>,
    pub calls: Mutex<Vec<String>>,
    /// Delay applied inside update and list calls
    pub latency: Mutex<Duration>,
    in_flight: Mutex<HashMap<String, usize>>,
    pub max_concurrent_per_id: AtomicUsize,
    in_flight_total: AtomicUsize,
    /// Highest number of updates in flight at once, across all tasks
    pub max_concurrent_total: AtomicUsize,
}

impl FakeBackend {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let backend = Self::default();
        *backend.tasks.lock().unwrap() = tasks;
        backend
    }

    pub fn fail(&self, operation: &'static str, status: u16) {
        self.failures.lock().unwrap().insert(operation, status);
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self.failures.lock().unwrap().get(operation) {
            Some(&status) => Err(BackendError::Api {
                status,
                body: format!("{operation} failed"),
            }),
            None => Ok(()),
        }
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn backend_type(&self) -> &str {
        "fake"
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, BackendError> {
        self.enter("list")?;
        self.pause().await;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create_task(&self, task: &Task) -> Result<Task, BackendError> {
        self.enter("create")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = task.clone();
        created.remote_id = Some(format!("remote-{id}"));
        created.user_id = Some(USER_ID.to_string());
        self.tasks.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, remote_id: &str, task: &Task) -> Result<Task, BackendError> {
        self.enter("update")?;

        let concurrent = {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(remote_id.to_string()).or_default();
            *count += 1;
            *count
        };
        self.max_concurrent_per_id.fetch_max(concurrent, Ordering::SeqCst);
        let total = self.in_flight_total.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_total.fetch_max(total, Ordering::SeqCst);
        self.pause().await;
        self.in_flight_total.fetch_sub(1, Ordering::SeqCst);
        *self.in_flight.lock().unwrap().get_mut(remote_id).unwrap() -= 1;

        let mut tasks = self.tasks.lock().unwrap();
        let existing = tasks
            .iter_mut()
            .find(|t| t.remote_id.as_deref() == Some(remote_id))
            .ok_or_else(|| BackendError::NotFound(format!("task {remote_id}")))?;
        let mut updated = task.clone();
        updated.remote_id = Some(remote_id.to_string());
        updated.local_id = None;
        updated.user_id = Some(USER_ID.to_string());
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_task(&self, remote_id: &str) -> Result<(), BackendError> {
        self.enter("delete")?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.remote_id.as_deref() != Some(remote_id));
        if tasks.len() == before {
            return Err(BackendError::NotFound(format!("task {remote_id}")));
        }
        Ok(())
    }
}

/// Remote task as the API would return it.
pub fn remote_task(remote_id: &str, title: &str) -> Task {
    let mut task = Task::new(title, focusflow::Priority::Normal);
    task.remote_id = Some(remote_id.to_string());
    task.user_id = Some(USER_ID.to_string());
    task
}

pub struct Harness {
    pub sync: SyncService,
    pub backend: Arc<FakeBackend>,
    pub alarms: Arc<RecordingAlarms>,
    pub jobs: Arc<RecordingJobs>,
    pub clock: Arc<FixedClock>,
    pub session: Arc<SessionStore>,
}

pub async fn harness(backend: FakeBackend) -> Harness {
    let backend = Arc::new(backend);
    let alarms = Arc::new(RecordingAlarms::default());
    let jobs = Arc::new(RecordingJobs::default());
    let clock = Arc::new(FixedClock::new(now()));
    let session = Arc::new(SessionStore::signed_in(AuthSession::new(USER_ID, "token-1")));

    let scheduler = Arc::new(ReminderScheduler::new(
        alarms.clone(),
        jobs.clone(),
        clock.clone(),
        ReminderConfig::default(),
    ));
    let storage = LocalStorage::new(None).await.unwrap();
    let sync = SyncService::new(
        backend.clone(),
        Arc::new(tokio::sync::Mutex::new(storage)),
        scheduler,
        session.clone(),
    );

    Harness {
        sync,
        backend,
        alarms,
        jobs,
        clock,
        session,
    }
}
