//! In-process platform for reminders, built on tokio timers.
//!
//! Suitable for desktop or headless hosts. Timers do not survive the
//! process, so on such hosts the "fallback job" is another timer; mobile
//! hosts plug their own [`AlarmService`] and [`JobScheduler`] in instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{AlarmService, Clock, JobScheduler, Notifier, ReminderNotification};
use crate::error::{Error, Result};

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Notifier that writes reminders to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: &ReminderNotification) -> Result<()> {
        info!("🔔 [{}] {}: {}", notification.id, notification.title, notification.body);
        Ok(())
    }
}

/// Keyed one-shot timers that show a notification when they elapse.
struct KeyedTimers {
    label: &'static str,
    notifier: Arc<dyn Notifier>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl KeyedTimers {
    fn new(label: &'static str, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            label,
            notifier,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Start a timer under `key`, aborting the one it replaces.
    fn arm(&self, key: &str, delay: Duration, notification: ReminderNotification) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| Error::Platform(format!("no tokio runtime: {e}")))?;

        let notifier = Arc::clone(&self.notifier);
        let label = self.label;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = notifier.show(&notification) {
                warn!("{label} for {} could not show its notification: {e}", notification.key);
            }
        });

        if let Some(previous) = self.pending().insert(key.to_string(), handle) {
            previous.abort();
        }
        Ok(())
    }

    fn disarm(&self, key: &str) {
        if let Some(handle) = self.pending().remove(key) {
            handle.abort();
        }
    }

    fn is_armed(&self, key: &str) -> bool {
        self.pending().get(key).is_some_and(|handle| !handle.is_finished())
    }
}

/// Exact alarms as tokio timers.
pub struct TokioAlarmService {
    timers: KeyedTimers,
    clock: Arc<dyn Clock>,
    exact_allowed: AtomicBool,
}

impl TokioAlarmService {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            timers: KeyedTimers::new("Alarm", notifier),
            clock,
            exact_allowed: AtomicBool::new(true),
        }
    }

    /// Grant or revoke the exact-alarm capability (hosts mirroring a platform setting).
    pub fn set_exact_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn is_armed(&self, key: &str) -> bool {
        self.timers.is_armed(key)
    }
}

impl AlarmService for TokioAlarmService {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    fn request_exact_permission(&self) {
        info!("Exact alarm permission requested; waiting for the host to grant it");
    }

    fn set_exact(&self, key: &str, fire_at: DateTime<Utc>, notification: ReminderNotification) -> Result<()> {
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or_default();
        self.timers.arm(key, delay, notification)
    }

    fn cancel(&self, key: &str) {
        self.timers.disarm(key);
    }
}

/// Fallback jobs as tokio timers.
pub struct TokioJobScheduler {
    timers: KeyedTimers,
}

impl TokioJobScheduler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            timers: KeyedTimers::new("Fallback job", notifier),
        }
    }

    pub fn is_enqueued(&self, key: &str) -> bool {
        self.timers.is_armed(key)
    }
}

impl JobScheduler for TokioJobScheduler {
    fn enqueue_unique(&self, key: &str, delay: Duration, notification: ReminderNotification) -> Result<()> {
        self.timers.arm(key, delay, notification)
    }

    fn cancel_unique(&self, key: &str) {
        self.timers.disarm(key);
    }
}
