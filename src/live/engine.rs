//! One live cycle: the reference first, then every other parser at once.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use serde::Serialize;

use crate::catalog::{Catalog, ParserDescriptor};
use crate::compare::Comparator;
use crate::core::cancel::CancellationToken;
use crate::invoke::{InvocationResponse, ParserInvoker, VersionMismatch};
use crate::logger::{ActivityEvent, ActivityLoggerHandle};

/// How often the collector wakes to look at the cancellation token.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(20);

/// Which rule decided a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Reference,
    ConnectionFailure,
    StatusParity,
    /// The reference rejected the input.
    InvalidInput,
    OutputCompared,
}

/// Per-parser state within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveParserResult {
    pub parser_id: String,
    pub output: String,
    pub status: i32,
    pub loading: bool,
    pub agrees: Option<bool>,
    /// Green header: the input is valid YAML and the parser agrees.
    pub visually_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_mismatch: Option<VersionMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

impl LiveParserResult {
    /// Placeholder while the parser has not answered.
    #[must_use]
    pub fn loading(parser_id: impl Into<String>) -> Self {
        Self {
            parser_id: parser_id.into(),
            output: String::new(),
            status: 0,
            loading: true,
            agrees: None,
            visually_matches: None,
            version_mismatch: None,
            verdict: None,
        }
    }

    /// The reference agrees with itself; it is green only on valid input.
    #[must_use]
    pub fn reference(parser_id: impl Into<String>, response: InvocationResponse) -> Self {
        let valid = response.is_success();
        Self::decided(parser_id, response, true, valid, Verdict::Reference)
    }

    fn decided(
        parser_id: impl Into<String>,
        response: InvocationResponse,
        agrees: bool,
        visually_matches: bool,
        verdict: Verdict,
    ) -> Self {
        Self {
            parser_id: parser_id.into(),
            output: response.output,
            status: response.status,
            loading: false,
            agrees: Some(agrees),
            visually_matches: Some(visually_matches),
            version_mismatch: response.version_mismatch,
            verdict: Some(verdict),
        }
    }

    #[must_use]
    pub fn disagrees(&self) -> bool {
        !self.loading && self.agrees != Some(true)
    }
}

/// Agreement of one candidate with the reference's response.
///
/// Rules apply in order: transport failure, status-only parity, invalid input,
/// then full output comparison.
#[must_use]
pub fn classify(
    candidate: &ParserDescriptor,
    response: InvocationResponse,
    reference: &InvocationResponse,
    comparator: &Comparator,
) -> LiveParserResult {
    let id = candidate.id.as_str();
    if response.is_transport_failure() {
        return LiveParserResult::decided(id, response, false, false, Verdict::ConnectionFailure);
    }
    if candidate.is_status_only() {
        let agrees = reference.is_success() == response.is_success();
        let visible = reference.is_success() && agrees;
        return LiveParserResult::decided(id, response, agrees, visible, Verdict::StatusParity);
    }
    if !reference.is_success() {
        let agrees = !response.is_success();
        return LiveParserResult::decided(id, response, agrees, false, Verdict::InvalidInput);
    }
    let agrees =
        response.is_success() && comparator.agrees(&reference.output, &response.output, id);
    LiveParserResult::decided(id, response, agrees, agrees, Verdict::OutputCompared)
}

/// Status-bar counts over every non-reference parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementSummary {
    pub total: usize,
    pub disagreeing: usize,
    pub disagreeing_names: Vec<String>,
    /// Some parser has not answered yet.
    pub loading: bool,
}

impl AgreementSummary {
    /// Parsers missing from `results` count as loading.
    #[must_use]
    pub fn from_results(catalog: &Catalog, results: &[LiveParserResult]) -> Self {
        let by_id: HashMap<&str, &LiveParserResult> =
            results.iter().map(|r| (r.parser_id.as_str(), r)).collect();
        let mut disagreeing_names = Vec::new();
        let mut pending = 0;
        let mut total = 0;
        for parser in catalog.candidates() {
            total += 1;
            match by_id.get(parser.id.as_str()) {
                Some(result) if !result.loading => {
                    if result.agrees != Some(true) {
                        disagreeing_names.push(parser.name.clone());
                    }
                }
                _ => pending += 1,
            }
        }
        Self {
            total,
            disagreeing: disagreeing_names.len(),
            disagreeing_names,
            loading: pending > 0,
        }
    }
}

/// Results of a finished cycle, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveCycle {
    pub input: String,
    pub results: Vec<LiveParserResult>,
}

impl LiveCycle {
    #[must_use]
    pub fn get(&self, parser_id: &str) -> Option<&LiveParserResult> {
        self.results.iter().find(|r| r.parser_id == parser_id)
    }

    #[must_use]
    pub fn summary(&self, catalog: &Catalog) -> AgreementSummary {
        AgreementSummary::from_results(catalog, &self.results)
    }
}

/// Fans one input out to every parser in the catalog.
pub struct LiveEngine {
    catalog: Arc<Catalog>,
    invoker: Arc<dyn ParserInvoker>,
    comparator: Arc<Comparator>,
    activity: Option<ActivityLoggerHandle>,
}

impl LiveEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        invoker: Arc<dyn ParserInvoker>,
        comparator: Arc<Comparator>,
    ) -> Self {
        Self {
            catalog,
            invoker,
            comparator,
            activity: None,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: ActivityLoggerHandle) -> Self {
        self.activity = Some(activity);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run a cycle; `None` when `token` was cancelled before it finished.
    pub fn run_cycle(&self, yaml: &str, token: &CancellationToken) -> Option<LiveCycle> {
        self.run_cycle_with(yaml, token, &mut |_| {})
    }

    /// Like [`run_cycle`](Self::run_cycle), reporting each result as it lands.
    pub fn run_cycle_with(
        &self,
        yaml: &str,
        token: &CancellationToken,
        on_result: &mut dyn FnMut(&LiveParserResult),
    ) -> Option<LiveCycle> {
        if token.is_cancelled() {
            return None;
        }
        let started = Instant::now();
        let reference_id = self.catalog.reference_id().to_string();
        let reference_response = invoke_folded(self.invoker.as_ref(), &reference_id, yaml);
        if token.is_cancelled() {
            return None;
        }
        let reference = LiveParserResult::reference(&reference_id, reference_response.clone());
        on_result(&reference);

        let mut collected: HashMap<String, LiveParserResult> = HashMap::new();
        collected.insert(reference_id, reference);

        let candidates: Vec<ParserDescriptor> = self.catalog.candidates().cloned().collect();
        let (tx, rx) = bounded::<LiveParserResult>(candidates.len().max(1));
        let yaml_shared: Arc<str> = Arc::from(yaml);
        let reference_shared = Arc::new(reference_response);

        for candidate in candidates {
            let tx = tx.clone();
            let invoker = Arc::clone(&self.invoker);
            let comparator = Arc::clone(&self.comparator);
            let yaml = Arc::clone(&yaml_shared);
            let reference = Arc::clone(&reference_shared);
            let id = candidate.id.clone();
            let spawned = thread::Builder::new()
                .name(format!("yp-live-{id}"))
                .spawn(move || {
                    let response = invoke_folded(invoker.as_ref(), &candidate.id, &yaml);
                    let result = classify(&candidate, response, &reference, &comparator);
                    // A cancelled cycle has dropped the receiver.
                    let _ = tx.send(result);
                });
            if let Err(error) = spawned {
                let result = LiveParserResult::decided(
                    id.as_str(),
                    InvocationResponse::transport_failure(format!(
                        "failed to spawn invocation thread: {error}"
                    )),
                    false,
                    false,
                    Verdict::ConnectionFailure,
                );
                on_result(&result);
                collected.insert(id, result);
            }
        }
        drop(tx);

        loop {
            match rx.recv_timeout(CANCEL_CHECK_INTERVAL) {
                Ok(result) => {
                    if token.is_cancelled() {
                        return None;
                    }
                    on_result(&result);
                    collected.insert(result.parser_id.clone(), result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if token.is_cancelled() {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if token.is_cancelled() {
            return None;
        }

        let results: Vec<LiveParserResult> = self
            .catalog
            .all()
            .iter()
            .map(|parser| {
                collected.remove(&parser.id).unwrap_or_else(|| {
                    // The worker died before reporting.
                    LiveParserResult::decided(
                        parser.id.as_str(),
                        InvocationResponse::transport_failure("parser invocation did not report"),
                        false,
                        false,
                        Verdict::ConnectionFailure,
                    )
                })
            })
            .collect();

        let cycle = LiveCycle {
            input: yaml.to_string(),
            results,
        };
        let summary = cycle.summary(&self.catalog);
        self.log(ActivityEvent::LiveCycleCompleted {
            total: summary.total,
            disagreeing: summary.disagreeing,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        Some(cycle)
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(activity) = &self.activity {
            activity.send(event);
        }
    }
}

/// Invoker errors become transport failures in the live path.
fn invoke_folded(invoker: &dyn ParserInvoker, parser_id: &str, yaml: &str) -> InvocationResponse {
    invoker
        .invoke(parser_id, yaml)
        .unwrap_or_else(|error| InvocationResponse::transport_failure(error.to_string()))
}
