//! FocusFlow - task synchronization and reminder scheduling core
//!
//! This library keeps a signed-in user's personal tasks in sync with the
//! FocusFlow task API, caches them in a local SQLite database, publishes the
//! collection for reactive observers and schedules a reminder before each
//! task starts.
//!
//! # Modules
//!
//! The library is organized into several key modules:
//!
//! * [`sync`] - Synchronizer and the published task collection
//! * [`backend`] - Remote task API client
//! * [`storage`] / [`repositories`] - Local task cache
//! * [`reminders`] - Reminder scheduling against platform alarm services
//! * [`config`] - Application configuration management
//! * [`logger`] - File logging setup

/// Authenticated session access
pub mod auth;

/// Remote task API abstraction and REST client
pub mod backend;

/// Configuration module for managing application settings
pub mod config;

/// Application constants and default values
pub mod constants;

/// SeaORM entity models for database tables
pub mod entities;

/// Crate-wide error type
pub mod error;

/// Logging setup for embedding applications
pub mod logger;

/// Reminder scheduling and platform service traits
pub mod reminders;

/// Repository layer for database operations
pub mod repositories;

/// Local storage layer for caching tasks
pub mod storage;

/// Synchronization engine for keeping local and remote data in sync
pub mod sync;

/// Task domain model
pub mod task;

/// Utility functions for date/time handling
pub mod utils;

pub use error::{Error, Result};
pub use sync::{SyncService, SyncStatus, TaskSnapshot};
pub use task::{Priority, Task};
