//! Reminder scheduling.
//!
//! A task with a start time gets one reminder, fired `reminder_offset_minutes`
//! before it starts. Each reminder is registered twice with the platform: a
//! precise one-shot alarm and a delayed fallback job sharing the same key.
//! Either path may fire, so a reminder can be shown twice; both paths show
//! the same notification id, and a duplicate is preferred over a lost
//! reminder.
//!
//! The platform itself is reached through the [`AlarmService`],
//! [`JobScheduler`], [`Notifier`] and [`Clock`] traits. [`local`] provides
//! tokio-backed implementations for running in-process.

pub mod local;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::ReminderConfig;
use crate::constants::{LOG_PERMISSION_REQUESTED, NOTIFICATION_BODY_PREFIX, NOTIFICATION_TITLE};
use crate::error::{Error, Result};
use crate::task::Task;
use crate::utils::datetime;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shows user-visible notifications.
pub trait Notifier: Send + Sync {
    fn show(&self, notification: &ReminderNotification) -> Result<()>;
}

/// Precise one-shot alarms.
pub trait AlarmService: Send + Sync {
    /// Whether the platform currently grants the exact-alarm capability.
    fn can_schedule_exact(&self) -> bool;

    /// Ask the user for the exact-alarm capability. The answer arrives out of band.
    fn request_exact_permission(&self);

    /// Arm an alarm at `fire_at`, replacing any alarm with the same key.
    fn set_exact(&self, key: &str, fire_at: DateTime<Utc>, notification: ReminderNotification) -> Result<()>;

    /// Disarm the alarm with this key, if any.
    fn cancel(&self, key: &str);
}

/// Durable delayed jobs with unique keys.
pub trait JobScheduler: Send + Sync {
    /// Enqueue a job running after `delay`, replacing any job with the same key.
    fn enqueue_unique(&self, key: &str, delay: Duration, notification: ReminderNotification) -> Result<()>;

    /// Drop the job with this key, if any.
    fn cancel_unique(&self, key: &str);
}

/// What the user sees when a reminder fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    /// Platform notification id; equal for every delivery of the same reminder
    pub id: i32,
    pub key: String,
    pub title: String,
    pub body: String,
}

impl ReminderNotification {
    pub fn for_task(key: &str, task_title: &str) -> Self {
        Self {
            id: notification_id(key),
            key: key.to_string(),
            title: NOTIFICATION_TITLE.to_string(),
            body: format!("{NOTIFICATION_BODY_PREFIX}{task_title}"),
        }
    }
}

/// 31-based rolling hash of the key, so both delivery paths collapse onto
/// the same notification slot.
fn notification_id(key: &str) -> i32 {
    key.bytes()
        .fold(0i32, |hash, byte| hash.wrapping_mul(31).wrapping_add(i32::from(byte)))
}

/// An active reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub key: String,
    pub task_title: String,
    pub fire_at: DateTime<Utc>,
}

/// Why a schedule request registered nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Reminders are switched off in the settings
    Disabled,
    NoStartTime,
    /// The fire instant is not in the future
    PastDue,
    /// The fire instant cannot be represented
    OutOfRange,
}

/// Result of [`ReminderScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(DateTime<Utc>),
    Skipped(SkipReason),
}

#[derive(Default)]
struct SchedulerState {
    registrations: HashMap<String, Registration>,
    /// Tasks waiting for the exact-alarm capability
    deferred: HashMap<String, Task>,
    permission_requested: bool,
}

/// Registers and cancels task reminders with the platform.
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmService>,
    jobs: Arc<dyn JobScheduler>,
    clock: Arc<dyn Clock>,
    settings: ReminderConfig,
    state: Mutex<SchedulerState>,
}

impl ReminderScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmService>,
        jobs: Arc<dyn JobScheduler>,
        clock: Arc<dyn Clock>,
        settings: ReminderConfig,
    ) -> Self {
        Self {
            alarms,
            jobs,
            clock,
            settings,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        // Registration bookkeeping stays usable even if a holder panicked.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register (or replace) the reminder of `task`.
    ///
    /// # Errors
    /// * `Error::NotPermitted` when the exact-alarm capability is missing; the
    ///   permission is requested and the task is kept for [`Self::retry_deferred`]
    /// * `Error::InvalidTask` when the task has neither a remote nor a local id
    /// * `Error::Platform` when the alarm cannot be armed
    pub fn schedule(&self, task: &Task) -> Result<ScheduleOutcome> {
        if !self.settings.enabled {
            return Ok(self.skip(task, SkipReason::Disabled));
        }

        if task.start_time.is_none() {
            return Ok(self.skip(task, SkipReason::NoStartTime));
        }
        let Some(fire_at) = task.reminder_at(self.settings.default_offset_minutes) else {
            warn!("⚠️  Reminder for '{}' falls outside the supported time range", task.title);
            return Ok(self.skip(task, SkipReason::OutOfRange));
        };

        let now = self.clock.now();
        if fire_at <= now {
            debug!("Reminder for '{}' is past due, skipping", task.title);
            return Ok(self.skip(task, SkipReason::PastDue));
        }

        let key = task
            .reminder_key()
            .ok_or_else(|| Error::InvalidTask("task has no identifier to key its reminder".to_string()))?;

        // The previous registration is stale whether or not the new one can be armed
        self.cancel_key(&key);

        if !self.alarms.can_schedule_exact() {
            let first_request = {
                let mut state = self.state();
                state.deferred.insert(key.clone(), task.clone());
                !std::mem::replace(&mut state.permission_requested, true)
            };
            if first_request {
                warn!("{LOG_PERMISSION_REQUESTED}");
                self.alarms.request_exact_permission();
            }
            return Err(Error::NotPermitted(format!("exact alarms unavailable, reminder {key} deferred")));
        }

        let notification = ReminderNotification::for_task(&key, &task.title);
        self.alarms.set_exact(&key, fire_at, notification.clone())?;

        let delay = (fire_at - now).to_std().unwrap_or_default();
        if let Err(e) = self.jobs.enqueue_unique(&key, delay, notification) {
            warn!("Fallback job for {key} not enqueued: {e}");
        }

        {
            let mut state = self.state();
            state.permission_requested = false;
            state.registrations.insert(
                key.clone(),
                Registration {
                    key: key.clone(),
                    task_title: task.title.clone(),
                    fire_at,
                },
            );
        }

        info!("⏰ Reminder {key} set for {}", datetime::format_for_log(fire_at));
        Ok(ScheduleOutcome::Scheduled(fire_at))
    }

    /// A task that no longer qualifies for a reminder drops the one it had.
    fn skip(&self, task: &Task, reason: SkipReason) -> ScheduleOutcome {
        if let Some(key) = task.reminder_key() {
            if self.cancel_key(&key) {
                debug!("Reminder {key} cancelled ({reason:?})");
            }
        }
        ScheduleOutcome::Skipped(reason)
    }

    /// Cancel the reminder of `task`. No-op when none is registered.
    pub fn cancel(&self, task: &Task) -> bool {
        task.reminder_key().is_some_and(|key| self.cancel_key(&key))
    }

    /// Cancel alarm and fallback job registered under `key`.
    ///
    /// # Returns
    /// `true` if a registration or a deferred request existed
    pub fn cancel_key(&self, key: &str) -> bool {
        self.alarms.cancel(key);
        self.jobs.cancel_unique(key);

        let mut state = self.state();
        let registered = state.registrations.remove(key).is_some();
        let deferred = state.deferred.remove(key).is_some();
        registered || deferred
    }

    /// Cancel every reminder (sign-out).
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = {
            let state = self.state();
            state.registrations.keys().chain(state.deferred.keys()).cloned().collect()
        };
        keys.iter().filter(|key| self.cancel_key(key)).count()
    }

    /// Schedule the tasks deferred for lack of the exact-alarm capability.
    ///
    /// # Returns
    /// Number of reminders now registered
    ///
    /// # Errors
    /// `Error::NotPermitted` if the capability is still missing
    pub fn retry_deferred(&self) -> Result<usize> {
        let deferred: Vec<Task> = self.state().deferred.drain().map(|(_, task)| task).collect();

        let mut scheduled = 0;
        let mut failure = None;
        for task in deferred {
            match self.schedule(&task) {
                Ok(ScheduleOutcome::Scheduled(_)) => scheduled += 1,
                Ok(ScheduleOutcome::Skipped(_)) => {}
                Err(e) => failure = Some(e),
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(scheduled),
        }
    }

    pub fn registration(&self, key: &str) -> Option<Registration> {
        self.state().registrations.get(key).cloned()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        let mut registrations: Vec<Registration> = self.state().registrations.values().cloned().collect();
        registrations.sort_by_key(|registration| registration.fire_at);
        registrations
    }

    pub fn deferred_count(&self) -> usize {
        self.state().deferred.len()
    }
}
