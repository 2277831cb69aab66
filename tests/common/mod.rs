#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use yaml_parity::core::errors::Result;
use yaml_parity::invoke::{InvocationResponse, ParserInvoker};
use yaml_parity::suite::{TestCase, TestSuite};

// ──────────────────── fixtures ────────────────────

/// `a: 1` as an event stream.
pub const MAP_EVENTS: &str = "+STR\n+DOC\n+MAP\n=VAL :a\n=VAL :1\n-MAP\n-DOC\n-STR";
/// `- x` as an event stream.
pub const SEQ_EVENTS: &str = "+STR\n+DOC\n+SEQ\n=VAL :x\n-SEQ\n-DOC\n-STR";

/// Three tests: two accepting, one error test.
pub fn sample_suite(version: &str) -> TestSuite {
    TestSuite::new(
        version,
        vec![
            TestCase::accepting("229Q", "Spec Example 2.4", "a: 1", MAP_EVENTS),
            TestCase::accepting("26DV", "Block sequence", "- x", SEQ_EVENTS),
            TestCase::rejecting("236B", "Invalid value after mapping", "a: 1\n]"),
        ],
    )
    .expect("valid sample suite")
}

pub fn write_suite_file(dir: &Path, suite: &TestSuite) -> PathBuf {
    let path = dir.join("suite.json");
    fs::write(&path, serde_json::to_string(suite).expect("serialize suite")).expect("write suite");
    path
}

// ──────────────────── fake invokers ────────────────────

/// A parser that parses the sample suite's inputs correctly.
pub fn correct_response(yaml: &str) -> InvocationResponse {
    match yaml {
        "a: 1" => InvocationResponse::success(MAP_EVENTS),
        "- x" => InvocationResponse::success(SEQ_EVENTS),
        _ => InvocationResponse::parse_error(1, "syntax error"),
    }
}

/// Programmable invoker that counts calls per parser.
#[derive(Default)]
pub struct ScriptedInvoker {
    responses: Mutex<HashMap<(String, String), InvocationResponse>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Override the response for one parser on one input.
    pub fn respond(&self, parser_id: &str, yaml: &str, response: InvocationResponse) {
        self.responses
            .lock()
            .insert((parser_id.to_string(), yaml.to_string()), response);
    }

    pub fn calls_for(&self, parser_id: &str) -> usize {
        self.calls.lock().get(parser_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl ParserInvoker for ScriptedInvoker {
    fn invoke(&self, parser_id: &str, yaml: &str) -> Result<InvocationResponse> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(parser_id.to_string()).or_default() += 1;
        let scripted = self
            .responses
            .lock()
            .get(&(parser_id.to_string(), yaml.to_string()))
            .cloned();
        Ok(scripted.unwrap_or_else(|| correct_response(yaml)))
    }
}

// ──────────────────── CLI runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Runs the binary with `HOME` and every data path inside `home`.
pub fn run_cli_case(case_name: &str, home: &Path, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, home, args, &[])
}

pub fn run_cli_case_with_env(
    case_name: &str,
    home: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
) -> CmdResult {
    let root = std::env::temp_dir().join("yparity-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_yparity"));

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", home)
        .env("YP_PATHS_CACHE_DIR", home.join("cache"))
        .env("YP_PATHS_ACTIVITY_LOG", home.join("activity.jsonl"))
        .env_remove("YP_OUTPUT_FORMAT")
        .envs(envs.iter().copied())
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute yparity command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    let _ = writeln!(log_content, "case={case_name}");
    let _ = writeln!(log_content, "bin={}", bin_path.display());
    let _ = writeln!(log_content, "args={args:?}");
    let _ = writeln!(log_content, "status={}", output.status);
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Each stdout line parsed as JSON.
pub fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line is JSON"))
        .collect()
}
