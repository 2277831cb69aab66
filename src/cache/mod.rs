//! Result Cache: one test-run record per parser, valid only for the parser
//! version and corpus version it was produced against.
//!
//! Persistence is best-effort. Store failures and corrupt records never reach
//! the caller; they read as a miss and are reported to the activity log.

pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logger::{ActivityEvent, ActivityLoggerHandle};
pub use store::{CacheStore, FileCacheStore, MemoryCacheStore};

/// Prefix of every result-cache key; the parser id follows.
pub const KEY_PREFIX: &str = "test-results-";

/// Outcome of one test in a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultEntry {
    pub test_id: String,
    pub passed: bool,
}

/// A completed run for one parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultCache {
    pub parser_version: String,
    pub test_suite_version: String,
    /// Corpus order.
    pub results: Vec<TestResultEntry>,
    #[serde(alias = "elapsedTime", default)]
    pub elapsed_time_ms: u64,
}

impl TestResultCache {
    #[must_use]
    pub fn is_valid_for(&self, parser_version: &str, suite_version: &str) -> bool {
        self.parser_version == parser_version && self.test_suite_version == suite_version
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }
}

/// `valid(cache, parserVersion, suiteVersion)`: present and both versions match.
#[must_use]
pub fn is_valid(cache: Option<&TestResultCache>, parser_version: &str, suite_version: &str) -> bool {
    cache.is_some_and(|c| c.is_valid_for(parser_version, suite_version))
}

#[must_use]
pub fn cache_key(parser_id: &str) -> String {
    format!("{KEY_PREFIX}{parser_id}")
}

/// Version-aware record cache over a [`CacheStore`].
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    activity: Option<ActivityLoggerHandle>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("activity", &self.activity.is_some())
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            activity: None,
        }
    }

    /// In-memory cache with no quota.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    #[must_use]
    pub fn with_activity(mut self, activity: ActivityLoggerHandle) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Stored record, or `None` when absent, unreadable or corrupt.
    pub fn read(&self, parser_id: &str) -> Option<TestResultCache> {
        self.read_key(&cache_key(parser_id))
    }

    /// Replace the parser's record. Failures are swallowed.
    pub fn write(&self, parser_id: &str, cache: &TestResultCache) {
        let key = cache_key(parser_id);
        let outcome = serde_json::to_string(cache)
            .map_err(crate::core::errors::ParityError::from)
            .and_then(|json| self.store.set(&key, &json));
        if let Err(error) = outcome {
            self.log(ActivityEvent::CacheWriteFailed {
                key,
                error_code: error.code().to_string(),
                error_message: error.to_string(),
            });
        }
    }

    pub fn clear(&self, parser_id: &str) {
        let key = cache_key(parser_id);
        match self.store.remove(&key) {
            Ok(()) => self.log(ActivityEvent::CacheCleared {
                scope: parser_id.to_string(),
                removed: 1,
            }),
            Err(error) => self.log(ActivityEvent::CacheWriteFailed {
                key,
                error_code: error.code().to_string(),
                error_message: error.to_string(),
            }),
        }
    }

    /// Remove every result-cache key; returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for key in self.result_keys() {
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(error) => self.log(ActivityEvent::CacheWriteFailed {
                    key,
                    error_code: error.code().to_string(),
                    error_message: error.to_string(),
                }),
            }
        }
        self.log(ActivityEvent::CacheCleared {
            scope: "all".to_string(),
            removed,
        });
        removed
    }

    /// Every readable record with its parser id, sorted by id.
    pub fn enumerate_all(&self) -> Vec<(String, TestResultCache)> {
        self.result_keys()
            .into_iter()
            .filter_map(|key| {
                let parser_id = key.strip_prefix(KEY_PREFIX)?.to_string();
                self.read_key(&key).map(|cache| (parser_id, cache))
            })
            .collect()
    }

    /// Number of result-cache keys, readable or not.
    pub fn count(&self) -> usize {
        self.result_keys().len()
    }

    fn result_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(KEY_PREFIX) && k.len() > KEY_PREFIX.len())
                .collect(),
            Err(error) => {
                self.log(ActivityEvent::CacheReadFailed {
                    key: format!("{KEY_PREFIX}*"),
                    details: error.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn read_key(&self, key: &str) -> Option<TestResultCache> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(error) => {
                self.log(ActivityEvent::CacheReadFailed {
                    key: key.to_string(),
                    details: error.to_string(),
                });
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cache) => Some(cache),
            Err(error) => {
                self.log(ActivityEvent::CacheReadFailed {
                    key: key.to_string(),
                    details: format!("corrupt record: {error}"),
                });
                None
            }
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(activity) = &self.activity {
            activity.send(event);
        }
    }
}
