//! Local storage module for the task cache
//!
//! The cache is a single SQLite table managed through SeaORM. Queries live in
//! [`crate::repositories::TaskRepository`]; this module owns the connection
//! and the schema.

pub mod db;

pub use db::LocalStorage;
