//! Test Executor: one parser against the whole corpus, strictly in order.
//!
//! State flow is `Idle → LoadingSuite → Running(i) → Completed | Aborted |
//! Failed`, with `LoadingSuite → Completed` directly on a valid cache hit and
//! `Suppressed` when another run already holds the parser. Only a run that
//! finishes every test writes the cache; an aborted or failed run leaves the
//! previous record in place.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cache::{ResultCache, TestResultCache, TestResultEntry, is_valid};
use crate::catalog::ParserDescriptor;
use crate::compare::Comparator;
use crate::core::cancel::CancellationToken;
use crate::core::errors::{ParityError, Result};
use crate::invoke::{InvocationResponse, ParserInvoker};
use crate::logger::{ActivityEvent, ActivityLoggerHandle};
use crate::runner::registry::RunRegistry;
use crate::suite::{SuiteLoader, TestCase, TestSuite};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    LoadingSuite,
    /// Test `index` (0-based) of `total` is in flight.
    Running { index: usize, total: usize },
    Completed,
    Aborted,
    Failed,
    Suppressed,
}

/// Element of the live result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub test_id: String,
    pub test_name: String,
    pub passed: bool,
    pub running: bool,
}

/// Progress hooks; every method defaults to a no-op.
pub trait RunObserver {
    fn on_state(&mut self, _parser_id: &str, _state: &RunState) {}
    fn on_row_started(&mut self, _index: usize, _row: &ResultRow) {}
    fn on_row_finished(&mut self, _index: usize, _row: &ResultRow) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub parser: ParserDescriptor,
    /// Skip the cache lookup. The old record stays until the new run completes.
    pub force: bool,
}

impl RunRequest {
    #[must_use]
    pub fn new(parser: ParserDescriptor) -> Self {
        Self {
            parser,
            force: false,
        }
    }

    #[must_use]
    pub const fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Result list of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub parser_id: String,
    pub parser_version: String,
    pub suite_version: String,
    pub from_cache: bool,
    pub elapsed_ms: u64,
    /// Tests in the current corpus.
    pub total_tests: usize,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Cancelled; `completed` results were discarded.
    Aborted { completed: usize },
    /// Another run for the same parser is active.
    Suppressed,
}

/// Pass/fail for one test given the parser's response.
///
/// Error tests pass iff the parser rejected the input. Other tests pass iff it
/// succeeded and its output agrees with the expected stream.
#[must_use]
pub fn classify(
    test: &TestCase,
    response: &InvocationResponse,
    comparator: &Comparator,
    parser_id: &str,
) -> bool {
    if test.error_expected {
        !response.is_success()
    } else {
        response.is_success()
            && comparator.agrees(&test.expected_output, &response.output, parser_id)
    }
}

/// Runs corpus batches for any parser.
pub struct TestExecutor {
    loader: Arc<dyn SuiteLoader>,
    invoker: Arc<dyn ParserInvoker>,
    comparator: Arc<Comparator>,
    cache: ResultCache,
    registry: Arc<RunRegistry>,
    activity: Option<ActivityLoggerHandle>,
}

impl TestExecutor {
    pub fn new(
        loader: Arc<dyn SuiteLoader>,
        invoker: Arc<dyn ParserInvoker>,
        comparator: Arc<Comparator>,
        cache: ResultCache,
    ) -> Self {
        Self {
            loader,
            invoker,
            comparator,
            cache,
            registry: Arc::new(RunRegistry::new()),
            activity: None,
        }
    }

    /// Share a registry with other executors.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_activity(mut self, activity: ActivityLoggerHandle) -> Self {
        self.activity = Some(activity);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Execute one run. `Err` means the run failed (corpus load or an
    /// unrecoverable invoker error); the observer has already seen `Failed`.
    pub fn run(
        &self,
        request: &RunRequest,
        token: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> Result<RunOutcome> {
        let parser = &request.parser;
        let Some(_guard) = self.registry.try_acquire(&parser.id) else {
            observer.on_state(&parser.id, &RunState::Suppressed);
            self.log(ActivityEvent::RunSuppressed {
                parser_id: parser.id.clone(),
            });
            return Ok(RunOutcome::Suppressed);
        };

        observer.on_state(&parser.id, &RunState::LoadingSuite);
        let suite = match self.loader.fetch() {
            Ok(suite) => suite,
            Err(error) => return Err(self.fail(parser, observer, error)),
        };
        if token.is_cancelled() {
            return Ok(self.abort(parser, observer, 0));
        }

        if !request.force
            && let Some(report) = self.cached_report(parser, &suite)
        {
            observer.on_state(&parser.id, &RunState::Completed);
            return Ok(RunOutcome::Completed(report));
        }

        self.execute(parser, &suite, request.force, token, observer)
    }

    fn cached_report(&self, parser: &ParserDescriptor, suite: &TestSuite) -> Option<RunReport> {
        let cached = self.cache.read(&parser.id);
        if !is_valid(cached.as_ref(), &parser.version, &suite.version) {
            return None;
        }
        let cached = cached?;
        self.log(ActivityEvent::CacheHit {
            parser_id: parser.id.clone(),
            parser_version: parser.version.clone(),
            suite_version: suite.version.clone(),
            passed: cached.passed(),
            failed: cached.failed(),
        });
        let rows = cached
            .results
            .iter()
            .map(|entry| ResultRow {
                test_id: entry.test_id.clone(),
                test_name: suite.name_of(&entry.test_id).to_string(),
                passed: entry.passed,
                running: false,
            })
            .collect();
        Some(RunReport {
            parser_id: parser.id.clone(),
            parser_version: parser.version.clone(),
            suite_version: suite.version.clone(),
            from_cache: true,
            elapsed_ms: cached.elapsed_time_ms,
            total_tests: suite.len(),
            rows,
        })
    }

    fn execute(
        &self,
        parser: &ParserDescriptor,
        suite: &TestSuite,
        forced: bool,
        token: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> Result<RunOutcome> {
        let total = suite.len();
        self.log(ActivityEvent::RunStarted {
            parser_id: parser.id.clone(),
            parser_version: parser.version.clone(),
            suite_version: suite.version.clone(),
            total,
            forced,
        });

        let started = Instant::now();
        let mut accumulator: Vec<TestResultEntry> = Vec::with_capacity(total);
        let mut rows: Vec<ResultRow> = Vec::with_capacity(total);

        for (index, test) in suite.tests.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(self.abort(parser, observer, accumulator.len()));
            }
            observer.on_state(&parser.id, &RunState::Running { index, total });
            let row = ResultRow {
                test_id: test.id.clone(),
                test_name: test.name.clone(),
                passed: false,
                running: true,
            };
            observer.on_row_started(index, &row);
            rows.push(row);

            let response = match self.invoker.invoke(&parser.id, &test.yaml_source) {
                Ok(response) => response,
                Err(error) => return Err(self.fail(parser, observer, error)),
            };
            if token.is_cancelled() {
                return Ok(self.abort(parser, observer, accumulator.len()));
            }

            let passed = classify(test, &response, &self.comparator, &parser.id);
            if let Some(last) = rows.last_mut() {
                last.passed = passed;
                last.running = false;
                observer.on_row_finished(index, last);
            }
            accumulator.push(TestResultEntry {
                test_id: test.id.clone(),
                passed,
            });
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let record = TestResultCache {
            parser_version: parser.version.clone(),
            test_suite_version: suite.version.clone(),
            results: accumulator,
            elapsed_time_ms: elapsed_ms,
        };
        self.cache.write(&parser.id, &record);
        self.log(ActivityEvent::RunCompleted {
            parser_id: parser.id.clone(),
            parser_version: parser.version.clone(),
            suite_version: suite.version.clone(),
            passed: record.passed(),
            failed: record.failed(),
            elapsed_ms,
        });
        observer.on_state(&parser.id, &RunState::Completed);

        Ok(RunOutcome::Completed(RunReport {
            parser_id: parser.id.clone(),
            parser_version: parser.version.clone(),
            suite_version: suite.version.clone(),
            from_cache: false,
            elapsed_ms,
            total_tests: total,
            rows,
        }))
    }

    fn abort(
        &self,
        parser: &ParserDescriptor,
        observer: &mut dyn RunObserver,
        completed: usize,
    ) -> RunOutcome {
        observer.on_state(&parser.id, &RunState::Aborted);
        self.log(ActivityEvent::RunAborted {
            parser_id: parser.id.clone(),
            completed,
        });
        RunOutcome::Aborted { completed }
    }

    fn fail(
        &self,
        parser: &ParserDescriptor,
        observer: &mut dyn RunObserver,
        error: ParityError,
    ) -> ParityError {
        observer.on_state(&parser.id, &RunState::Failed);
        self.log(ActivityEvent::RunFailed {
            parser_id: parser.id.clone(),
            error_code: error.code().to_string(),
            error_message: error.to_string(),
        });
        error
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(activity) = &self.activity {
            activity.send(event);
        }
    }
}
