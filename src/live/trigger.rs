//! Re-trigger policy for live cycles.
//!
//! A cycle fires once the input and the active parser set have been quiet for
//! the debounce period, and only when they differ from what the last cycle
//! ran with. Time is passed in so the policy is testable without sleeping.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Default quiet period before a cycle fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What a cycle runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInputs {
    pub input: String,
    pub active: BTreeSet<String>,
}

#[derive(Debug)]
pub struct LiveTrigger {
    debounce: Duration,
    observed: Option<CycleInputs>,
    changed_at: Option<Instant>,
    /// Fired and not yet completed or abandoned.
    in_flight: Option<CycleInputs>,
    last_completed: Option<CycleInputs>,
}

impl LiveTrigger {
    #[must_use]
    pub const fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            observed: None,
            changed_at: None,
            in_flight: None,
            last_completed: None,
        }
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Record the current state. A change restarts the quiet period.
    /// Returns whether anything changed.
    pub fn observe<I, S>(&mut self, input: &str, active: I, now: Instant) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next = CycleInputs {
            input: input.to_string(),
            active: active.into_iter().map(Into::into).collect(),
        };
        if self.observed.as_ref() == Some(&next) {
            return false;
        }
        self.observed = Some(next);
        self.changed_at = Some(now);
        true
    }

    /// Inputs for a new cycle, if one is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<CycleInputs> {
        let observed = self.observed.as_ref()?;
        let changed_at = self.changed_at?;
        if observed.active.is_empty()
            || now.saturating_duration_since(changed_at) < self.debounce
            || self.last_completed.as_ref() == Some(observed)
            || self.in_flight.as_ref() == Some(observed)
        {
            return None;
        }
        let inputs = observed.clone();
        self.in_flight = Some(inputs.clone());
        Some(inputs)
    }

    /// The cycle for `inputs` finished; identical state will not fire again.
    pub fn complete(&mut self, inputs: &CycleInputs) {
        if self.in_flight.as_ref() == Some(inputs) {
            self.in_flight = None;
        }
        self.last_completed = Some(inputs.clone());
    }

    /// The in-flight cycle was cancelled; its inputs may fire again.
    pub fn abandon(&mut self) {
        self.in_flight = None;
    }

    #[must_use]
    pub fn last_completed(&self) -> Option<&CycleInputs> {
        self.last_completed.as_ref()
    }
}

impl Default for LiveTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
