//! Versioned conformance corpus.

pub mod loader;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ParityError, Result};

pub use loader::{JsonFileSuiteLoader, MemoizedLoader, StaticSuiteLoader, SuiteLoader};

/// One conformance test. Identity is `id`, unique within a corpus version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    /// The input must be rejected.
    #[serde(rename = "error", alias = "errorExpected")]
    pub error_expected: bool,
    #[serde(rename = "yaml", alias = "yamlSource")]
    pub yaml_source: String,
    /// Reference event stream; ignored for error tests.
    #[serde(rename = "expected", alias = "expectedOutput", default)]
    pub expected_output: String,
}

impl TestCase {
    /// A test whose input must parse to `expected`.
    pub fn accepting(
        id: impl Into<String>,
        name: impl Into<String>,
        yaml: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            error_expected: false,
            yaml_source: yaml.into(),
            expected_output: expected.into(),
        }
    }

    /// A test whose input must be rejected.
    pub fn rejecting(id: impl Into<String>, name: impl Into<String>, yaml: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            error_expected: true,
            yaml_source: yaml.into(),
            expected_output: String::new(),
        }
    }
}

/// A corpus snapshot; `version` is part of every cache key check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub version: String,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Build a suite, rejecting duplicate or empty test ids.
    pub fn new(version: impl Into<String>, tests: Vec<TestCase>) -> Result<Self> {
        let suite = Self {
            version: version.into(),
            tests,
        };
        suite.check("inline")?;
        Ok(suite)
    }

    pub(crate) fn check(&self, source_name: &str) -> Result<()> {
        let fail = |details: String| ParityError::CorpusLoad {
            source_name: source_name.to_string(),
            details,
        };
        if self.version.trim().is_empty() {
            return Err(fail("corpus has no version".to_string()));
        }
        let mut seen = HashSet::with_capacity(self.tests.len());
        for test in &self.tests {
            if test.id.trim().is_empty() {
                return Err(fail("test with empty id".to_string()));
            }
            if !seen.insert(test.id.as_str()) {
                return Err(fail(format!("duplicate test id {:?}", test.id)));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.id == id)
    }

    /// Test name for display, falling back to the id.
    #[must_use]
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map_or(id, |t| t.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
