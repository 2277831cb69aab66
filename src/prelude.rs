//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use yaml_parity::prelude::*;
//! ```

// Core
pub use crate::core::cancel::CancellationToken;
pub use crate::core::config::Config;
pub use crate::core::errors::{ParityError, Result};

// Catalog + comparison
pub use crate::catalog::{Catalog, ComparisonMode, ParserDescriptor};
pub use crate::compare::{Comparator, NormalizedPair};

// Invocation + corpus
pub use crate::invoke::{InvocationResponse, ParserInvoker};
pub use crate::suite::{JsonFileSuiteLoader, MemoizedLoader, SuiteLoader, TestCase, TestSuite};

// Batch runs
pub use crate::cache::{ResultCache, TestResultCache, TestResultEntry};
pub use crate::runner::{RunOutcome, RunReport, RunRequest, RunState, TestExecutor};

// Live
pub use crate::live::{AgreementSummary, LiveCycle, LiveEngine, LiveParserResult, LiveTrigger};
