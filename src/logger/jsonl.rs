//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line. When the primary file cannot be
//! written the writer degrades: fallback file, then stderr with a `[YP-JSONL]`
//! prefix, then silent discard. Logging never fails a run.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::errors::{ParityError, Result};

const BUFFER_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Activity event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    RunStart,
    RunComplete,
    RunAbort,
    RunFail,
    RunSuppress,
    CacheHit,
    CacheWriteFail,
    CacheReadFail,
    CacheClear,
    LiveCycle,
    Error,
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// `YP-xxxx` code when something failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            parser_id: None,
            parser_version: None,
            suite_version: None,
            cache_key: None,
            total: None,
            passed: None,
            failed: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn parser(mut self, parser_id: &str) -> Self {
        self.parser_id = Some(parser_id.to_string());
        self
    }

    #[must_use]
    pub fn versions(mut self, parser_version: &str, suite_version: &str) -> Self {
        self.parser_version = Some(parser_version.to_string());
        self.suite_version = Some(suite_version.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would exceed this size.
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval: Duration,
}

impl JsonlConfig {
    /// Defaults for a log at `path`, with a fallback in the temp directory.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: Some(std::env::temp_dir().join("yparity-activity.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval: Duration::from_secs(10),
        }
    }
}

enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    fn name(&self) -> &'static str {
        match self {
            Self::Primary(_) => "primary",
            Self::Fallback(_) => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }

    fn file(&mut self) -> Option<&mut BufWriter<File>> {
        match self {
            Self::Primary(w) | Self::Fallback(w) => Some(w),
            Self::Stderr | Self::Discard => None,
        }
    }
}

/// Append-only JSONL writer with size rotation and a degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    bytes_written: u64,
    last_fsync: Instant,
}

impl JsonlWriter {
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
            last_fsync: Instant::now(),
        };
        writer.sink = match open_append(&writer.config.path) {
            Ok((file, size)) => {
                writer.bytes_written = size;
                Sink::Primary(BufWriter::with_capacity(BUFFER_CAPACITY, file))
            }
            Err(_) => writer.open_fallback(),
        };
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[YP-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
        self.last_fsync = Instant::now();
    }

    /// `primary`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        self.sink.name()
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.bytes_written + len > self.config.max_size_bytes && self.sink.file().is_some() {
            self.rotate();
        }

        loop {
            match &mut self.sink {
                Sink::Primary(w) | Sink::Fallback(w) => {
                    if w.write_all(line.as_bytes()).is_ok() {
                        self.bytes_written += len;
                        if self.last_fsync.elapsed() >= self.config.fsync_interval {
                            self.fsync();
                        }
                        return;
                    }
                    self.degrade();
                }
                Sink::Stderr => {
                    if write!(io::stderr(), "[YP-JSONL] {line}").is_ok() {
                        return;
                    }
                    self.degrade();
                }
                Sink::Discard => return,
            }
        }
    }

    fn open_fallback(&mut self) -> Sink {
        let Some(path) = self.config.fallback_path.clone() else {
            let _ = writeln!(
                io::stderr(),
                "[YP-JSONL] activity log unwritable and no fallback configured, using stderr"
            );
            return Sink::Stderr;
        };
        match open_append(&path) {
            Ok((file, size)) => {
                let _ = writeln!(
                    io::stderr(),
                    "[YP-JSONL] activity log unwritable, using fallback: {}",
                    path.display()
                );
                self.bytes_written = size;
                Sink::Fallback(BufWriter::with_capacity(BUFFER_CAPACITY, file))
            }
            Err(_) => {
                let _ = writeln!(io::stderr(), "[YP-JSONL] fallback unwritable, using stderr");
                Sink::Stderr
            }
        }
    }

    fn degrade(&mut self) {
        let current = std::mem::replace(&mut self.sink, Sink::Discard);
        self.sink = match current {
            Sink::Primary(_) => self.open_fallback(),
            Sink::Fallback(_) => Sink::Stderr,
            Sink::Stderr | Sink::Discard => Sink::Discard,
        };
    }

    fn rotate(&mut self) {
        let base = match &self.sink {
            Sink::Primary(_) => self.config.path.clone(),
            Sink::Fallback(_) => match &self.config.fallback_path {
                Some(path) => path.clone(),
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };
        let is_primary = matches!(self.sink, Sink::Primary(_));
        self.flush();
        self.sink = Sink::Discard;

        // foo.jsonl.N is dropped, foo.jsonl.(i) moves to .(i+1), foo.jsonl becomes .1
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.bytes_written = 0;
                let writer = BufWriter::with_capacity(BUFFER_CAPACITY, file);
                self.sink = if is_primary {
                    Sink::Primary(writer)
                } else {
                    Sink::Fallback(writer)
                };
            }
            Err(_) => {
                self.sink = if is_primary {
                    self.open_fallback()
                } else {
                    Sink::Stderr
                };
            }
        }
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ParityError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ParityError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: PathBuf) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn entries_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::new(EventType::RunStart, Severity::Info).parser("libyaml"));
        writer.write_entry(&LogEntry::new(EventType::CacheHit, Severity::Info));
        writer.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "run_start");
        assert_eq!(first["severity"], "info");
        assert_eq!(first["parser_id"], "libyaml");
    }

    #[test]
    fn unset_fields_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::new(EventType::SessionStart, Severity::Info));
        writer.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("parser_id"));
        assert!(!line.contains("duration_ms"));
    }

    #[test]
    fn rotation_keeps_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut cfg = config(path.clone());
        cfg.max_size_bytes = 120;
        let mut writer = JsonlWriter::open(cfg);
        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::LiveCycle, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(!rotated_name(&path, 4).exists());
        assert_eq!(writer.state(), "primary");
    }

    #[test]
    fn unwritable_primary_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut cfg = config(blocker.join("activity.jsonl"));
        cfg.fallback_path = Some(fallback.clone());

        let mut writer = JsonlWriter::open(cfg);
        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::new(EventType::Error, Severity::Warning));
        writer.flush();
        assert!(!fs::read_to_string(&fallback).unwrap().is_empty());
    }

    #[test]
    fn no_fallback_degrades_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let writer = JsonlWriter::open(config(blocker.join("activity.jsonl")));
        assert_eq!(writer.state(), "stderr");
    }
}
