//! Core types: errors, configuration, cancellation.

pub mod cancel;
pub mod config;
pub mod errors;
