//! Per-parser rewrite rules applied after canonicalization.
//!
//! The table maps a candidate parser id to an ordered list of pure text
//! rewrites. Each rule targets one side of the comparison (the candidate's
//! output or the reference's) and may be guarded by a pattern that must
//! match the current text of either side. Adding an implementation's quirks
//! means adding [`RuleSpec`] entries, either here or in the `[[compare.rules]]`
//! config section.

#![allow(missing_docs)]

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::compare::anchors;
use crate::core::errors::{ParityError, Result};

/// Which side of a comparison a rule reads or rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Candidate,
    Reference,
}

/// What a rule does to its target side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Regex replacement (`$1`-style capture references).
    #[default]
    Replace,
    /// Number named anchors in first-definition order.
    RenumberAnchors,
}

/// Precondition evaluated against one side's current text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSpec {
    pub side: Side,
    pub pattern: String,
}

/// Declarative rewrite rule, as written in code or config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Candidate parser id this rule belongs to.
    pub parser: String,
    /// Side rewritten by the rule.
    pub side: Side,
    #[serde(default)]
    pub action: RuleAction,
    /// Multi-line regex (`^`/`$` match at line boundaries).
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
    /// Replace only the first match.
    #[serde(default)]
    pub first_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardSpec>,
}

impl RuleSpec {
    fn replace(parser: &str, side: Side, pattern: &str, replacement: &str) -> Self {
        Self {
            parser: parser.to_string(),
            side,
            action: RuleAction::Replace,
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            first_only: false,
            guard: None,
        }
    }

    fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }

    fn guarded(mut self, side: Side, pattern: &str) -> Self {
        self.guard = Some(GuardSpec {
            side,
            pattern: pattern.to_string(),
        });
        self
    }

    fn renumber_anchors(parser: &str, side: Side) -> Self {
        Self {
            parser: parser.to_string(),
            side,
            action: RuleAction::RenumberAnchors,
            pattern: String::new(),
            replacement: String::new(),
            first_only: false,
            guard: None,
        }
    }
}

/// Built-in quirk table for known implementations.
#[must_use]
pub fn builtin_specs() -> Vec<RuleSpec> {
    use Side::{Candidate, Reference};

    vec![
        // serde-yaml prints tags as `<Tag("handle", "suffix")>`.
        RuleSpec::replace(
            "rustyaml",
            Candidate,
            r#"<Tag\("!!", "(.*?)"\)>"#,
            "<tag:yaml.org,2002:$1>",
        ),
        RuleSpec::replace("rustyaml", Candidate, r#"<Tag\("!", "(.*?)"\)>"#, "<!$1>"),
        RuleSpec::replace("rustyaml", Candidate, r#"<Tag\("", "!"\)>"#, "<!>"),
        RuleSpec::replace("rustyaml", Candidate, r#"<Tag\("", "(tag:.*?)"\)>"#, "<$1>"),
        RuleSpec::replace("rustyaml", Candidate, r#"<Tag\("", "(!.*?)"\)>"#, "<$1>"),
        // It never reports explicit document markers.
        RuleSpec::replace("rustyaml", Reference, r"^\+DOC ---", "+DOC"),
        RuleSpec::replace("rustyaml", Reference, r"^-DOC \.\.\.", "-DOC"),
        RuleSpec::replace("rustyaml", Reference, r"^=VAL :$", "=VAL :~"),
        RuleSpec::replace("rustyaml", Reference, r"^\+MAP \{\}( ?)", "+MAP$1"),
        RuleSpec::replace("rustyaml", Reference, r"^\+SEQ \[\]( ?)", "+SEQ$1"),
        RuleSpec::renumber_anchors("rustyaml", Reference).guarded(Candidate, "&1"),
        // go-yaml always reports `+DOC ---` for the first document.
        RuleSpec::replace("goyaml", Candidate, r"^\+DOC ---", "+DOC")
            .first_only()
            .guarded(Reference, r"^\+DOC$"),
    ]
}

#[derive(Debug, Clone)]
enum RuleOp {
    Replace {
        regex: Regex,
        replacement: String,
        first_only: bool,
    },
    RenumberAnchors,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    side: Side,
    op: RuleOp,
    guard: Option<(Side, Regex)>,
}

/// Compiled per-parser rule lists.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, Vec<CompiledRule>>,
}

impl RuleTable {
    /// Compile the built-in specs.
    pub fn builtin() -> Result<Self> {
        Self::from_specs(&builtin_specs())
    }

    /// Compile specs in order; rules for one parser keep their relative order.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let mut table = Self::default();
        table.extend(specs)?;
        Ok(table)
    }

    /// Append more rules after the existing ones.
    pub fn extend(&mut self, specs: &[RuleSpec]) -> Result<()> {
        for spec in specs {
            let compiled = compile(spec)?;
            self.rules
                .entry(spec.parser.clone())
                .or_default()
                .push(compiled);
        }
        Ok(())
    }

    /// Number of rules registered for a parser.
    #[must_use]
    pub fn rule_count(&self, parser_id: &str) -> usize {
        self.rules.get(parser_id).map_or(0, Vec::len)
    }

    /// Apply the parser's rules in order to both canonical texts.
    pub fn apply(&self, parser_id: &str, reference: &mut String, candidate: &mut String) {
        let Some(rules) = self.rules.get(parser_id) else {
            return;
        };

        for rule in rules {
            let guard_ok = rule.guard.as_ref().is_none_or(|(side, regex)| {
                let text = match side {
                    Side::Candidate => candidate.as_str(),
                    Side::Reference => reference.as_str(),
                };
                regex.is_match(text)
            });
            if !guard_ok {
                continue;
            }

            let target = match rule.side {
                Side::Candidate => &mut *candidate,
                Side::Reference => &mut *reference,
            };
            let rewritten = match &rule.op {
                RuleOp::Replace {
                    regex,
                    replacement,
                    first_only,
                } => {
                    let limit = usize::from(*first_only);
                    regex
                        .replacen(target.as_str(), limit, replacement.as_str())
                        .into_owned()
                }
                RuleOp::RenumberAnchors => anchors::renumber(target),
            };
            *target = rewritten;
        }
    }
}

fn compile(spec: &RuleSpec) -> Result<CompiledRule> {
    if spec.parser.trim().is_empty() {
        return Err(ParityError::InvalidRule {
            parser_id: spec.parser.clone(),
            details: "rule has an empty parser id".to_string(),
        });
    }

    let op = match spec.action {
        RuleAction::Replace => {
            if spec.pattern.is_empty() {
                return Err(ParityError::InvalidRule {
                    parser_id: spec.parser.clone(),
                    details: "replace rule has an empty pattern".to_string(),
                });
            }
            RuleOp::Replace {
                regex: build_regex(&spec.parser, &spec.pattern)?,
                replacement: spec.replacement.clone(),
                first_only: spec.first_only,
            }
        }
        RuleAction::RenumberAnchors => RuleOp::RenumberAnchors,
    };

    let guard = spec
        .guard
        .as_ref()
        .map(|g| build_regex(&spec.parser, &g.pattern).map(|regex| (g.side, regex)))
        .transpose()?;

    Ok(CompiledRule {
        side: spec.side,
        op,
        guard,
    })
}

fn build_regex(parser_id: &str, pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|error| ParityError::InvalidRule {
            parser_id: parser_id.to_string(),
            details: format!("pattern {pattern:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(table: &RuleTable, parser: &str, reference: &str, candidate: &str) -> (String, String) {
        let mut reference = reference.to_string();
        let mut candidate = candidate.to_string();
        table.apply(parser, &mut reference, &mut candidate);
        (reference, candidate)
    }

    #[test]
    fn builtin_table_compiles() {
        let table = RuleTable::builtin().expect("builtin rules compile");
        assert!(table.rule_count("rustyaml") >= 10);
        assert_eq!(table.rule_count("goyaml"), 1);
        assert_eq!(table.rule_count("libyaml"), 0);
    }

    #[test]
    fn rust_tags_become_canonical() {
        let table = RuleTable::builtin().unwrap();
        let (_, candidate) = apply(
            &table,
            "rustyaml",
            "",
            "=VAL <Tag(\"!!\", \"str\")> :a\n=VAL <Tag(\"!\", \"foo\")> :b\n=VAL <Tag(\"\", \"!\")> :c\n=VAL <Tag(\"\", \"tag:example.com,2000:x\")> :d\n=VAL <Tag(\"\", \"!local\")> :e",
        );
        assert_eq!(
            candidate,
            "=VAL <tag:yaml.org,2002:str> :a\n=VAL <!foo> :b\n=VAL <!> :c\n=VAL <tag:example.com,2000:x> :d\n=VAL <!local> :e"
        );
    }

    #[test]
    fn rust_reference_document_markers_are_implicit() {
        let table = RuleTable::builtin().unwrap();
        let (reference, _) = apply(&table, "rustyaml", "+STR\n+DOC ---\n=VAL :\n-DOC ...\n-STR", "");
        assert_eq!(reference, "+STR\n+DOC\n=VAL :~\n-DOC\n-STR");
    }

    #[test]
    fn anchor_renumbering_requires_numeric_candidate() {
        let table = RuleTable::builtin().unwrap();
        let (unchanged, _) = apply(&table, "rustyaml", "=VAL &a :x", "=VAL &a :x");
        assert_eq!(unchanged, "=VAL &a :x");
        let (renumbered, _) = apply(&table, "rustyaml", "=VAL &a :x", "=VAL &1 :x");
        assert_eq!(renumbered, "=VAL &1 :x");
    }

    #[test]
    fn go_doc_marker_only_when_reference_is_implicit() {
        let table = RuleTable::builtin().unwrap();
        let (_, rewritten) = apply(&table, "goyaml", "+DOC\n-DOC", "+DOC ---\n-DOC\n+DOC ---");
        assert_eq!(rewritten, "+DOC\n-DOC\n+DOC ---");
        let (_, kept) = apply(&table, "goyaml", "+DOC ---\n-DOC", "+DOC ---\n-DOC");
        assert_eq!(kept, "+DOC ---\n-DOC");
    }

    #[test]
    fn rules_for_other_parsers_do_not_fire() {
        let table = RuleTable::builtin().unwrap();
        let (reference, candidate) = apply(&table, "pyyaml", "+DOC ---", "<Tag(\"!!\", \"str\")>");
        assert_eq!(reference, "+DOC ---");
        assert_eq!(candidate, "<Tag(\"!!\", \"str\")>");
    }

    #[test]
    fn configured_rules_append_in_order() {
        let mut table = RuleTable::builtin().unwrap();
        table
            .extend(&[
                RuleSpec::replace("newparser", Side::Candidate, "^=STR", "=VAL"),
                RuleSpec::replace("newparser", Side::Candidate, "^=VAL", "=VAL!"),
            ])
            .unwrap();
        let (_, candidate) = apply(&table, "newparser", "", "=STR :x");
        assert_eq!(candidate, "=VAL! :x");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let spec = RuleSpec::replace("bad", Side::Candidate, "(unclosed", "");
        let err = RuleTable::from_specs(&[spec]).unwrap_err();
        assert_eq!(err.code(), "YP-1101");
    }

    #[test]
    fn empty_replace_pattern_is_rejected() {
        let spec = RuleSpec::replace("bad", Side::Candidate, "", "x");
        assert!(RuleTable::from_specs(&[spec]).is_err());
    }

    #[test]
    fn rule_spec_parses_from_toml() {
        let raw = r#"
parser = "hsyaml"
side = "candidate"
pattern = '^\+DOC ---'
replacement = "+DOC"
first_only = true

[guard]
side = "reference"
pattern = '^\+DOC$'
"#;
        let spec: RuleSpec = toml::from_str(raw).unwrap();
        assert_eq!(spec.action, RuleAction::Replace);
        assert!(spec.first_only);
        assert_eq!(spec.guard.unwrap().side, Side::Reference);
    }
}
