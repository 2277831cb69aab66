//! Live Comparison Engine: every known parser against the current input,
//! classified by agreement with the reference.

pub mod engine;
pub mod trigger;

pub use engine::{AgreementSummary, LiveCycle, LiveEngine, LiveParserResult, Verdict, classify};
pub use trigger::{CycleInputs, DEFAULT_DEBOUNCE, LiveTrigger};
