//! Structured activity logging: a JSONL writer fed by a logger thread.

pub mod activity;
pub mod jsonl;

pub use activity::{ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger};
