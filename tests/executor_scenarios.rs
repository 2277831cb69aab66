//! Batch-run scenarios: full corpus runs, cache reuse, abort safety and
//! one-run-per-parser suppression.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{MAP_EVENTS, ScriptedInvoker, sample_suite, write_suite_file};
use yaml_parity::cache::{
    CacheStore, FileCacheStore, MemoryCacheStore, ResultCache, TestResultCache,
};
use yaml_parity::catalog::ParserDescriptor;
use yaml_parity::compare::Comparator;
use yaml_parity::core::cancel::CancellationToken;
use yaml_parity::core::errors::Result;
use yaml_parity::invoke::{InvocationResponse, ParserInvoker};
use yaml_parity::runner::{
    NoopObserver, ResultRow, RunObserver, RunOutcome, RunRequest, RunState, TestExecutor,
};
use yaml_parity::suite::{JsonFileSuiteLoader, MemoizedLoader, StaticSuiteLoader, SuiteLoader};

fn libyaml() -> ParserDescriptor {
    ParserDescriptor::new("libyaml", "libyaml", "0.2.5", "C")
}

fn executor(invoker: Arc<dyn ParserInvoker>, cache: ResultCache) -> TestExecutor {
    TestExecutor::new(
        Arc::new(StaticSuiteLoader::new(sample_suite("v1"))),
        invoker,
        Arc::new(Comparator::builtin().expect("builtin rules compile")),
        cache,
    )
}

fn completed(outcome: RunOutcome) -> yaml_parity::runner::RunReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("expected completed run, got {other:?}"),
    }
}

#[derive(Default)]
struct Recorder {
    states: Vec<RunState>,
    finished: Vec<ResultRow>,
}

impl RunObserver for Recorder {
    fn on_state(&mut self, _parser_id: &str, state: &RunState) {
        self.states.push(state.clone());
    }

    fn on_row_finished(&mut self, _index: usize, row: &ResultRow) {
        self.finished.push(row.clone());
    }
}

#[test]
fn all_passing_run_stores_full_record() {
    let cache = ResultCache::in_memory();
    let invoker = ScriptedInvoker::new();
    let exec = executor(invoker.clone(), cache.clone());
    let mut recorder = Recorder::default();

    let report = completed(
        exec.run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut recorder)
            .unwrap(),
    );

    assert!(!report.from_cache);
    assert_eq!(report.rows.len(), 3);
    assert!(report.rows.iter().all(|r| r.passed && !r.running));

    let stored: TestResultCache = cache.read("libyaml").expect("record written");
    assert_eq!(stored.results.len(), 3);
    assert!(stored.results.iter().all(|r| r.passed));
    assert!(stored.elapsed_time_ms > 0);
    assert_eq!(stored.parser_version, "0.2.5");
    assert_eq!(stored.test_suite_version, "v1");

    assert_eq!(recorder.states.first(), Some(&RunState::LoadingSuite));
    assert_eq!(recorder.states.last(), Some(&RunState::Completed));
    assert!(recorder.states.contains(&RunState::Running { index: 2, total: 3 }));
    assert_eq!(recorder.finished.len(), 3);
    assert_eq!(invoker.calls_for("libyaml"), 3);
}

#[test]
fn accepting_an_error_test_fails_only_that_test() {
    let cache = ResultCache::in_memory();
    let invoker = ScriptedInvoker::new();
    invoker.respond("libyaml", "a: 1\n]", InvocationResponse::success(MAP_EVENTS));
    let exec = executor(invoker, cache.clone());

    completed(
        exec.run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut NoopObserver)
            .unwrap(),
    );

    let stored = cache.read("libyaml").unwrap();
    assert_eq!(stored.passed(), 2);
    assert_eq!(stored.failed(), 1);
    let failing: Vec<_> = stored.results.iter().filter(|r| !r.passed).collect();
    assert_eq!(failing[0].test_id, "236B");
}

#[test]
fn valid_cache_is_reused_without_invoking() {
    let cache = ResultCache::in_memory();
    let invoker = ScriptedInvoker::new();
    let exec = executor(invoker.clone(), cache);
    let token = CancellationToken::new();

    completed(exec.run(&RunRequest::new(libyaml()), &token, &mut NoopObserver).unwrap());
    let calls = invoker.total_calls();

    let again = completed(exec.run(&RunRequest::new(libyaml()), &token, &mut NoopObserver).unwrap());
    assert!(again.from_cache);
    assert_eq!(again.rows.len(), 3);
    assert_eq!(again.rows[0].test_name, "Spec Example 2.4");
    assert_eq!(invoker.total_calls(), calls);

    let forced = completed(
        exec.run(&RunRequest::new(libyaml()).forced(true), &token, &mut NoopObserver)
            .unwrap(),
    );
    assert!(!forced.from_cache);
    assert_eq!(invoker.total_calls(), calls + 3);
}

#[test]
fn version_bump_invalidates_cache() {
    let cache = ResultCache::in_memory();
    let invoker = ScriptedInvoker::new();
    let exec = executor(invoker.clone(), cache.clone());
    let token = CancellationToken::new();
    completed(exec.run(&RunRequest::new(libyaml()), &token, &mut NoopObserver).unwrap());

    let bumped = ParserDescriptor::new("libyaml", "libyaml", "0.2.6", "C");
    let report = completed(exec.run(&RunRequest::new(bumped), &token, &mut NoopObserver).unwrap());
    assert!(!report.from_cache);
    assert_eq!(invoker.calls_for("libyaml"), 6);
    assert_eq!(cache.read("libyaml").unwrap().parser_version, "0.2.6");
}

/// Cancels the token as soon as the second test starts.
struct CancelOnSecond {
    token: CancellationToken,
}

impl RunObserver for CancelOnSecond {
    fn on_row_started(&mut self, index: usize, _row: &ResultRow) {
        if index == 1 {
            self.token.cancel();
        }
    }
}

#[test]
fn aborted_run_leaves_previous_record_untouched() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = ResultCache::new(Arc::clone(&store) as Arc<dyn CacheStore>);
    let invoker = ScriptedInvoker::new();
    let exec = executor(invoker, cache.clone());

    completed(
        exec.run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut NoopObserver)
            .unwrap(),
    );
    let before = cache.read("libyaml").unwrap();
    let raw_before = store.get("test-results-libyaml").unwrap().expect("raw record");

    let token = CancellationToken::new();
    let mut observer = CancelOnSecond {
        token: token.clone(),
    };
    let outcome = exec
        .run(&RunRequest::new(libyaml()).forced(true), &token, &mut observer)
        .unwrap();
    assert_eq!(outcome, RunOutcome::Aborted { completed: 1 });
    assert_eq!(cache.read("libyaml"), Some(before));
    assert_eq!(
        store.get("test-results-libyaml").unwrap().as_deref(),
        Some(raw_before.as_str())
    );
}

#[test]
fn aborted_first_run_writes_nothing() {
    let cache = ResultCache::in_memory();
    let exec = executor(ScriptedInvoker::new(), cache.clone());
    let token = CancellationToken::new();
    let mut observer = CancelOnSecond {
        token: token.clone(),
    };
    let outcome = exec.run(&RunRequest::new(libyaml()), &token, &mut observer).unwrap();
    assert!(matches!(outcome, RunOutcome::Aborted { .. }));
    assert_eq!(cache.read("libyaml"), None);
    assert_eq!(cache.count(), 0);
}

#[test]
fn second_concurrent_run_for_same_parser_is_suppressed() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (entered_in, release_in) = (Arc::clone(&entered), Arc::clone(&release));
    let invoker: Arc<dyn ParserInvoker> =
        Arc::new(move |_id: &str, yaml: &str| -> Result<InvocationResponse> {
            if yaml == "a: 1" {
                entered_in.wait();
                release_in.wait();
            }
            Ok(common::correct_response(yaml))
        });
    let exec = Arc::new(executor(invoker, ResultCache::in_memory()));

    let background = {
        let exec = Arc::clone(&exec);
        thread::spawn(move || {
            exec.run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut NoopObserver)
        })
    };
    entered.wait();

    let mut recorder = Recorder::default();
    let second = exec
        .run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut recorder)
        .unwrap();
    assert_eq!(second, RunOutcome::Suppressed);
    assert_eq!(recorder.states, vec![RunState::Suppressed]);

    release.wait();
    let first = background.join().unwrap().unwrap();
    assert!(matches!(first, RunOutcome::Completed(_)));
    assert!(exec.registry().active().is_empty());
}

#[test]
fn corpus_load_failure_is_surfaced_and_cache_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(JsonFileSuiteLoader::new(dir.path().join("missing.json")));
    let cache = ResultCache::in_memory();
    let exec = TestExecutor::new(
        loader,
        ScriptedInvoker::new(),
        Arc::new(Comparator::builtin().unwrap()),
        cache.clone(),
    );
    let mut recorder = Recorder::default();
    let err = exec
        .run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut recorder)
        .unwrap_err();
    assert_eq!(err.code(), "YP-2001");
    assert_eq!(recorder.states.last(), Some(&RunState::Failed));
    assert_eq!(cache.count(), 0);
    // The guard was released, so another attempt is not suppressed.
    assert!(exec.registry().active().is_empty());
}

#[test]
fn memoized_file_corpus_with_file_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let suite_path = write_suite_file(dir.path(), &sample_suite("2024-01"));
    let loader = Arc::new(MemoizedLoader::new(JsonFileSuiteLoader::new(&suite_path)));
    let cache = ResultCache::new(Arc::new(FileCacheStore::new(dir.path().join("cache"))));
    let invoker = ScriptedInvoker::new();
    let exec = TestExecutor::new(
        Arc::clone(&loader) as Arc<dyn SuiteLoader>,
        invoker.clone(),
        Arc::new(Comparator::builtin().unwrap()),
        cache,
    );
    let token = CancellationToken::new();
    completed(exec.run(&RunRequest::new(libyaml()), &token, &mut NoopObserver).unwrap());

    // Corpus file is gone but the memoized copy still serves.
    std::fs::remove_file(&suite_path).unwrap();
    let reopened = ResultCache::new(Arc::new(FileCacheStore::new(dir.path().join("cache"))));
    let exec = TestExecutor::new(
        loader,
        invoker.clone(),
        Arc::new(Comparator::builtin().unwrap()),
        reopened,
    );
    let report = completed(exec.run(&RunRequest::new(libyaml()), &token, &mut NoopObserver).unwrap());
    assert!(report.from_cache);
    assert_eq!(report.suite_version, "2024-01");
    assert_eq!(invoker.total_calls(), 3);
}

#[test]
fn quota_exhausted_store_still_completes_run() {
    let cache = ResultCache::new(Arc::new(MemoryCacheStore::with_quota(8)));
    let exec = executor(ScriptedInvoker::new(), cache.clone());
    let report = completed(
        exec.run(&RunRequest::new(libyaml()), &CancellationToken::new(), &mut NoopObserver)
            .unwrap(),
    );
    assert_eq!(report.rows.len(), 3);
    assert_eq!(cache.read("libyaml"), None);
}
