//! Constants used throughout the crate
//!
//! This module centralizes default values, notification text and log
//! messages so they stay consistent between the synchronizer and the
//! reminder scheduler.

// Defaults
/// Default task API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://focusflow-api-ts06.onrender.com";
/// Default HTTP timeout in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
/// Longest accepted HTTP timeout in seconds
pub const MAX_API_TIMEOUT_SECS: u64 = 300;
/// Minutes before the start time at which a reminder fires when a task has no offset
pub const DEFAULT_REMINDER_OFFSET_MINUTES: i32 = 10;
/// Largest accepted reminder offset (one week)
pub const MAX_REMINDER_OFFSET_MINUTES: i32 = 7 * 24 * 60;
/// Database path value selecting an in-memory cache
pub const IN_MEMORY_DATABASE: &str = ":memory:";

// Paths
pub const APP_DIR_NAME: &str = "focusflow";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOCAL_CONFIG_FILE_NAME: &str = "focusflow.toml";
pub const DATABASE_FILE_NAME: &str = "focusflow.db";
pub const LOG_FILE_NAME: &str = "focusflow.log";

// Reminder keys and notification text
/// Prefix of reminder registration keys (alarm and fallback job share the key)
pub const REMINDER_KEY_PREFIX: &str = "task_";
/// Key prefix used for tasks that exist only in the local cache
pub const REMINDER_LOCAL_KEY_PREFIX: &str = "task_local_";
pub const NOTIFICATION_TITLE: &str = "Task Reminder";
pub const NOTIFICATION_BODY_PREFIX: &str = "Don’t forget: ";

// Log Messages
pub const CONFIG_GENERATED: &str = "✅ Generated default configuration file";
pub const LOG_REFRESH_STARTED: &str = "🔄 Refreshing tasks from backend...";
pub const LOG_PERMISSION_REQUESTED: &str = "⚠️  Exact alarm permission missing, requested it from the platform";
