//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Everything else sends
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so
//! a slow disk never stalls a test run; overflow is counted and reported in
//! the log itself.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{ParityError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── events ────────────────────

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        version: String,
        config_hash: String,
    },
    RunStarted {
        parser_id: String,
        parser_version: String,
        suite_version: String,
        total: usize,
        forced: bool,
    },
    CacheHit {
        parser_id: String,
        parser_version: String,
        suite_version: String,
        passed: usize,
        failed: usize,
    },
    RunCompleted {
        parser_id: String,
        parser_version: String,
        suite_version: String,
        passed: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    RunAborted {
        parser_id: String,
        completed: usize,
    },
    RunFailed {
        parser_id: String,
        error_code: String,
        error_message: String,
    },
    RunSuppressed {
        parser_id: String,
    },
    CacheWriteFailed {
        key: String,
        error_code: String,
        error_message: String,
    },
    CacheReadFailed {
        key: String,
        details: String,
    },
    CacheCleared {
        scope: String,
        removed: usize,
    },
    LiveCycleCompleted {
        total: usize,
        disagreeing: usize,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel that stops the logger thread after flushing.
    Shutdown,
}

// ──────────────────── handle ────────────────────

/// Cheaply cloneable sender side of the logger.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("dropped_events", &self.dropped_events())
            .finish_non_exhaustive()
    }
}

impl ActivityLoggerHandle {
    /// Non-blocking send; a full channel drops the event and bumps the counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the thread to flush and exit; join its handle to wait.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn new(jsonl: JsonlConfig) -> Self {
        Self {
            jsonl,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the logger thread. It runs until `shutdown()` or until every handle
/// is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let jsonl = config.jsonl;
    let join = thread::Builder::new()
        .name("yp-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl, &dropped))
        .map_err(|e| ParityError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} activity events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
        // Runs are interactive; flush so `tail -f` sees events promptly.
        if rx.is_empty() {
            jsonl.flush();
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── conversion ────────────────────

#[allow(clippy::too_many_lines)]
fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::RunStarted {
            parser_id,
            parser_version,
            suite_version,
            total,
            forced,
        } => {
            let mut e = LogEntry::new(EventType::RunStart, Severity::Info)
                .parser(parser_id)
                .versions(parser_version, suite_version);
            e.total = Some(*total as u64);
            e.details = Some(format!("forced={forced}"));
            e
        }
        ActivityEvent::CacheHit {
            parser_id,
            parser_version,
            suite_version,
            passed,
            failed,
        } => {
            let mut e = LogEntry::new(EventType::CacheHit, Severity::Info)
                .parser(parser_id)
                .versions(parser_version, suite_version);
            e.passed = Some(*passed as u64);
            e.failed = Some(*failed as u64);
            e.ok = Some(true);
            e
        }
        ActivityEvent::RunCompleted {
            parser_id,
            parser_version,
            suite_version,
            passed,
            failed,
            elapsed_ms,
        } => {
            let mut e = LogEntry::new(EventType::RunComplete, Severity::Info)
                .parser(parser_id)
                .versions(parser_version, suite_version);
            e.passed = Some(*passed as u64);
            e.failed = Some(*failed as u64);
            e.total = Some((*passed + *failed) as u64);
            e.duration_ms = Some(*elapsed_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::RunAborted {
            parser_id,
            completed,
        } => {
            let mut e = LogEntry::new(EventType::RunAbort, Severity::Info).parser(parser_id);
            e.details = Some(format!("discarded {completed} results"));
            e.ok = Some(false);
            e
        }
        ActivityEvent::RunFailed {
            parser_id,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::RunFail, Severity::Critical).parser(parser_id);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::RunSuppressed { parser_id } => {
            let mut e = LogEntry::new(EventType::RunSuppress, Severity::Warning).parser(parser_id);
            e.details = Some("run already active for this parser".to_string());
            e
        }
        ActivityEvent::CacheWriteFailed {
            key,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::CacheWriteFail, Severity::Warning);
            e.cache_key = Some(key.clone());
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::CacheReadFailed { key, details } => {
            let mut e = LogEntry::new(EventType::CacheReadFail, Severity::Warning);
            e.cache_key = Some(key.clone());
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::CacheCleared { scope, removed } => {
            let mut e = LogEntry::new(EventType::CacheClear, Severity::Info);
            e.details = Some(format!("scope={scope} removed={removed}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::LiveCycleCompleted {
            total,
            disagreeing,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::LiveCycle, Severity::Info);
            e.total = Some(*total as u64);
            e.failed = Some(*disagreeing as u64);
            e.passed = Some(total.saturating_sub(*disagreeing) as u64);
            e.duration_ms = Some(*duration_ms);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        // The writer loop stops before converting a shutdown.
        ActivityEvent::Shutdown => LogEntry::new(EventType::SessionStart, Severity::Info),
    }
}

// ──────────────────── tests ────────────────────
