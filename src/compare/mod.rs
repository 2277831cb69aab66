//! Normalizer/Comparator: decides whether a candidate parser's event stream
//! agrees with the reference's.
//!
//! Both sides are canonicalized identically ([`normalize::canonicalize`]),
//! then the candidate's rewrite rules ([`rules::RuleTable`]) absorb known
//! encoding differences. Equality of the final strings is the only basis for
//! agreement anywhere in the crate.

pub mod anchors;
pub mod normalize;
pub mod rules;

use similar::TextDiff;

use crate::core::errors::Result;
use rules::{RuleSpec, RuleTable};

/// Both sides after canonicalization and parser-specific rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPair {
    pub reference: String,
    pub candidate: String,
    pub agrees: bool,
}

impl NormalizedPair {
    /// Unified line diff, empty when the sides agree.
    #[must_use]
    pub fn unified_diff(&self) -> String {
        if self.agrees {
            return String::new();
        }
        let reference = with_final_newline(&self.reference);
        let candidate = with_final_newline(&self.candidate);
        TextDiff::from_lines(reference.as_str(), candidate.as_str())
            .unified_diff()
            .context_radius(3)
            .header("reference", "candidate")
            .to_string()
    }

    /// 1-indexed line of the first difference.
    #[must_use]
    pub fn first_diff_line(&self) -> Option<usize> {
        if self.agrees {
            return None;
        }
        let mut reference = self.reference.lines();
        let mut candidate = self.candidate.lines();
        let mut line = 1;
        loop {
            match (reference.next(), candidate.next()) {
                (Some(a), Some(b)) if a == b => line += 1,
                (None, None) => return None,
                _ => return Some(line),
            }
        }
    }
}

fn with_final_newline(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{text}\n")
    }
}

/// Output comparator backed by a per-parser rule table.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    rules: RuleTable,
}

impl Comparator {
    #[must_use]
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    /// Comparator with the built-in quirk table.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(RuleTable::builtin()?))
    }

    /// Built-in table followed by extra configured rules.
    pub fn with_extra_rules(extra: &[RuleSpec]) -> Result<Self> {
        let mut rules = RuleTable::builtin()?;
        rules.extend(extra)?;
        Ok(Self::new(rules))
    }

    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Does `candidate` (produced by `parser_id`) agree with `reference`?
    #[must_use]
    pub fn agrees(&self, reference: &str, candidate: &str, parser_id: &str) -> bool {
        self.normalize_pair(reference, candidate, parser_id).agrees
    }

    /// Canonicalize both sides and apply the parser's rules.
    ///
    /// Identical canonical streams agree without consulting the rules.
    #[must_use]
    pub fn normalize_pair(&self, reference: &str, candidate: &str, parser_id: &str) -> NormalizedPair {
        let mut reference = normalize::canonicalize(reference);
        let mut candidate = normalize::canonicalize(candidate);
        if reference != candidate {
            self.rules.apply(parser_id, &mut reference, &mut candidate);
        }
        let agrees = reference == candidate;
        NormalizedPair {
            reference,
            candidate,
            agrees,
        }
    }
}
