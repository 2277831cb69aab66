//! Parser catalog: static descriptors for every known implementation, the
//! reference id, and per-parser comparison mode.

pub mod builtin;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ParityError, Result};

/// How a candidate's output is judged against the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Normalized event streams must be equal.
    #[default]
    Output,
    /// Output text is never comparable; only success/failure parity counts.
    StatusOnly,
}

/// Static catalog entry for one parser implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default)]
    pub comparison: ComparisonMode,
}

impl ParserDescriptor {
    /// Construct a descriptor compared by output.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            language: language.into(),
            repo: None,
            comparison: ComparisonMode::Output,
        }
    }

    #[must_use]
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    #[must_use]
    pub const fn status_only(mut self) -> Self {
        self.comparison = ComparisonMode::StatusOnly;
        self
    }

    #[must_use]
    pub fn is_status_only(&self) -> bool {
        self.comparison == ComparisonMode::StatusOnly
    }
}

/// Ordered set of parser descriptors with one designated reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    reference_index: usize,
    parsers: Vec<ParserDescriptor>,
}

impl Catalog {
    /// Build a catalog; the reference must be present and ids must be unique.
    pub fn new(reference_id: impl Into<String>, parsers: Vec<ParserDescriptor>) -> Result<Self> {
        let reference_id: String = reference_id.into();
        let mut seen = std::collections::HashSet::new();
        for parser in &parsers {
            if parser.id.trim().is_empty() {
                return Err(ParityError::InvalidConfig {
                    details: "catalog contains a parser with an empty id".to_string(),
                });
            }
            if !seen.insert(parser.id.as_str()) {
                return Err(ParityError::InvalidConfig {
                    details: format!("catalog contains duplicate parser id {:?}", parser.id),
                });
            }
        }
        let reference_index = parsers
            .iter()
            .position(|p| p.id == reference_id)
            .ok_or_else(|| ParityError::InvalidConfig {
                details: format!("reference parser {reference_id:?} is not in the catalog"),
            })?;
        Ok(Self {
            reference_index,
            parsers,
        })
    }

    /// The built-in catalog with `refparse` as reference.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            reference_index: 0,
            parsers: builtin::parsers(),
        }
    }

    #[must_use]
    pub fn reference_id(&self) -> &str {
        &self.reference().id
    }

    /// Descriptor of the reference implementation.
    #[must_use]
    pub fn reference(&self) -> &ParserDescriptor {
        &self.parsers[self.reference_index]
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ParserDescriptor> {
        self.parsers.iter().find(|p| p.id == id)
    }

    /// Look up a parser or fail with [`ParityError::UnknownParser`].
    pub fn require(&self, id: &str) -> Result<&ParserDescriptor> {
        self.get(id).ok_or_else(|| ParityError::UnknownParser {
            parser_id: id.to_string(),
        })
    }

    /// Display name for an id, falling back to the id itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map_or(id, |p| p.name.as_str())
    }

    #[must_use]
    pub fn all(&self) -> &[ParserDescriptor] {
        &self.parsers
    }

    /// Every parser except the reference, in catalog order.
    pub fn candidates(&self) -> impl Iterator<Item = &ParserDescriptor> {
        let reference = self.reference_index;
        self.parsers
            .iter()
            .enumerate()
            .filter(move |(index, _)| *index != reference)
            .map(|(_, parser)| parser)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
