//! Batch conformance runs: executor, per-parser exclusion, and reports.

pub mod executor;
pub mod registry;
pub mod report;

pub use executor::{
    NoopObserver, ResultRow, RunObserver, RunOutcome, RunReport, RunRequest, RunState,
    TestExecutor, classify,
};
pub use registry::{KeyState, RunGuard, RunRegistry};
