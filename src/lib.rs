#![forbid(unsafe_code)]

//! yaml_parity: differential testing of YAML parsers against a reference
//! implementation.
//!
//! Two ways in:
//! 1. **Batch** ([`runner`]): one parser against a versioned conformance
//!    corpus, sequentially, with cancellation and a version-keyed result cache.
//! 2. **Live** ([`live`]): every known parser against one input at once, each
//!    classified by agreement with the reference.
//!
//! Both rest on the [`compare`] normalizer, which decides when two event
//! streams are the same.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use yaml_parity::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use yaml_parity::core::config::Config;
//! use yaml_parity::runner::executor::{RunRequest, TestExecutor};
//! ```

pub mod prelude;

pub mod cache;
pub mod catalog;
pub mod compare;
pub mod core;
pub mod invoke;
pub mod live;
pub mod logger;
pub mod runner;
pub mod suite;
