//! Task domain model and its JSON wire format.
//!
//! A [`Task`] is what the task API sends and receives and what the
//! synchronizer publishes. The local cache stores the same data in the
//! [`crate::entities::task`] table.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_REMINDER_OFFSET_MINUTES, MAX_REMINDER_OFFSET_MINUTES, REMINDER_KEY_PREFIX, REMINDER_LOCAL_KEY_PREFIX,
};
use crate::error::{Error, Result};
use crate::utils::datetime;

/// Task priority as used by the task API.
///
/// Unknown values decode to [`Priority::Normal`] so one odd task cannot fail
/// a whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Normal, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Normal => "Normal",
            Priority::High => "High",
        }
    }

    /// Sort rank, highest priority first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|e| {
            warn!("⚠️  {e}, using {}", Priority::Normal);
            Priority::Normal
        })
    }
}

fn default_reminder_offset() -> Option<i32> {
    Some(DEFAULT_REMINDER_OFFSET_MINUTES)
}

/// A user-owned unit of work with optional scheduling metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend identifier, absent until the task has been created remotely
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Surrogate identifier assigned by the local cache
    #[serde(skip)]
    pub local_id: Option<i64>,
    pub title: String,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub all_day: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_reminder_offset")]
    pub reminder_offset_minutes: Option<i32>,
    /// Owner, assigned by the backend from the caller's token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Push-notification device token captured at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
}

impl Task {
    /// New, unscheduled task with the default reminder offset.
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            remote_id: None,
            local_id: None,
            title: title.into(),
            priority,
            completed: false,
            all_day: false,
            start_time: None,
            end_time: None,
            location: None,
            reminder_offset_minutes: default_reminder_offset(),
            user_id: None,
            fcm_token: None,
        }
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_end_time(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn with_reminder_offset(mut self, minutes: i32) -> Self {
        self.reminder_offset_minutes = Some(minutes);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    /// Reject tasks the backend would not accept.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidTask("title must not be empty".to_string()));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start && !self.all_day {
                return Err(Error::InvalidTask("end time is before start time".to_string()));
            }
        }
        if let Some(offset) = self.reminder_offset_minutes {
            if !(0..=MAX_REMINDER_OFFSET_MINUTES).contains(&offset) {
                return Err(Error::InvalidTask(format!(
                    "reminder offset must be between 0 and {MAX_REMINDER_OFFSET_MINUTES} minutes, got {offset}"
                )));
            }
        }
        Ok(())
    }

    /// Apply the schedule invariants.
    ///
    /// All-day tasks keep only the date of their start time, and the end is
    /// pinned to the same date. An end time without a start time is dropped.
    pub fn normalized(mut self) -> Self {
        match self.start_time {
            None => self.end_time = None,
            Some(start) if self.all_day => {
                let day = datetime::start_of_day(start);
                self.start_time = Some(day);
                self.end_time = Some(day);
            }
            Some(_) => {}
        }
        self
    }

    /// Instant at which the reminder should fire.
    ///
    /// `None` without a start time, or when the offset moves the instant out
    /// of the representable range.
    pub fn reminder_at(&self, default_offset_minutes: i32) -> Option<DateTime<Utc>> {
        let start = self.start_time?;
        let offset = self.reminder_offset_minutes.unwrap_or(default_offset_minutes);
        datetime::minutes_before(start, offset)
    }

    /// Key shared by the alarm and the fallback job of this task's reminder.
    pub fn reminder_key(&self) -> Option<String> {
        match (&self.remote_id, self.local_id) {
            (Some(remote_id), _) => Some(reminder_key_for(remote_id)),
            (None, Some(local_id)) => Some(format!("{REMINDER_LOCAL_KEY_PREFIX}{local_id}")),
            (None, None) => None,
        }
    }

    /// Same task with the completion flag flipped.
    pub fn toggled(&self) -> Self {
        let mut task = self.clone();
        task.completed = !task.completed;
        task
    }

    /// Order used by the local cache: start time ascending with unscheduled
    /// tasks last, then newest local id first.
    pub fn cache_order(a: &Task, b: &Task) -> Ordering {
        let by_start = match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_start.then_with(|| b.local_id.cmp(&a.local_id))
    }
}

/// Reminder key for a task known by its remote identifier.
pub fn reminder_key_for(remote_id: &str) -> String {
    format!("{REMINDER_KEY_PREFIX}{remote_id}")
}
