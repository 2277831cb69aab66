//! Corpus loaders.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{ParityError, Result};
use crate::suite::TestSuite;

/// External collaborator that produces the current corpus.
pub trait SuiteLoader: Send + Sync {
    fn fetch(&self) -> Result<Arc<TestSuite>>;
}

/// Reads `{version, tests[]}` JSON from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSuiteLoader {
    path: PathBuf,
}

impl JsonFileSuiteLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SuiteLoader for JsonFileSuiteLoader {
    fn fetch(&self) -> Result<Arc<TestSuite>> {
        let source_name = self.path.display().to_string();
        let raw = fs::read_to_string(&self.path).map_err(|e| ParityError::CorpusLoad {
            source_name: source_name.clone(),
            details: e.to_string(),
        })?;
        let suite: TestSuite = serde_json::from_str(&raw).map_err(|e| ParityError::CorpusLoad {
            source_name: source_name.clone(),
            details: format!("invalid corpus JSON: {e}"),
        })?;
        suite.check(&source_name)?;
        Ok(Arc::new(suite))
    }
}

/// Serves an already-built suite.
#[derive(Debug, Clone)]
pub struct StaticSuiteLoader {
    suite: Arc<TestSuite>,
}

impl StaticSuiteLoader {
    #[must_use]
    pub fn new(suite: TestSuite) -> Self {
        Self {
            suite: Arc::new(suite),
        }
    }
}

impl SuiteLoader for StaticSuiteLoader {
    fn fetch(&self) -> Result<Arc<TestSuite>> {
        Ok(Arc::clone(&self.suite))
    }
}

/// Loads through an inner loader at most once per success.
///
/// Concurrent callers wait on the same load. A failed load is not memoized.
pub struct MemoizedLoader<L> {
    inner: L,
    cached: Mutex<Option<Arc<TestSuite>>>,
}

impl<L: SuiteLoader> MemoizedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }

    /// Drop the memoized corpus so the next fetch reloads.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

impl<L: SuiteLoader> SuiteLoader for MemoizedLoader<L> {
    fn fetch(&self) -> Result<Arc<TestSuite>> {
        let mut cached = self.cached.lock();
        if let Some(suite) = cached.as_ref() {
            return Ok(Arc::clone(suite));
        }
        let suite = self.inner.fetch()?;
        *cached = Some(Arc::clone(&suite));
        Ok(suite)
    }
}
