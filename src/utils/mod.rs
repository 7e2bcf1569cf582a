//! Utility modules for the FocusFlow core.
//!
//! - [`datetime`] - epoch-millisecond conversion and day arithmetic for task schedules

pub mod datetime;
