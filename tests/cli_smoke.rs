//! CLI smoke tests against the built binary. Parsers are stood in for by
//! `cat`, which echoes an event-stream input back as its own output.

mod common;

use std::fs;

use common::{json_lines, run_cli_case, run_cli_case_with_env};
use yaml_parity::suite::{TestCase, TestSuite};

const EVENTS: &str = "+STR\n+DOC\n=VAL :a\n-DOC\n-STR";

#[test]
fn help_command_prints_usage() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case("help_command_prints_usage", home.path(), &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: yparity [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_flag_prints_version() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case("version_flag_prints_version", home.path(), &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn parsers_json_lists_catalog() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case("parsers_json_lists_catalog", home.path(), &["parsers", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let lines = json_lines(&result.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["command"], "parsers");
    assert_eq!(lines[0]["reference"], "refparse");
    let parsers = lines[0]["parsers"].as_array().unwrap();
    assert!(parsers.iter().any(|p| p["id"] == "refhs" && p["comparison"] == "status_only"));
}

#[test]
fn missing_explicit_config_is_a_user_error() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("nope.toml");
    let result = run_cli_case(
        "missing_explicit_config_is_a_user_error",
        home.path(),
        &["--config", missing.to_str().unwrap(), "config", "show"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("YP-1002"));
}

#[test]
fn invalid_env_override_fails_validation() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case_with_env(
        "invalid_env_override_fails_validation",
        home.path(),
        &["config", "validate", "--json"],
        &[("YP_INVOKER_TIMEOUT_MS", "0")],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let lines = json_lines(&result.stdout);
    assert_eq!(lines[0]["valid"], false);
}

#[test]
fn diff_reports_agreement_and_difference() {
    let home = tempfile::tempdir().unwrap();
    let reference = home.path().join("ref.events");
    let same = home.path().join("same.events");
    let other = home.path().join("other.events");
    fs::write(&reference, "+STR\n+DOC\n=VAL :a\n-DOC\n-STR\n").unwrap();
    fs::write(&same, "+STR\n+DOC ---\n=VAL :a\n-DOC\n-STR\n").unwrap();
    fs::write(&other, "+STR\n+DOC\n=VAL :b\n-DOC\n-STR\n").unwrap();

    let agree = run_cli_case(
        "diff_agree",
        home.path(),
        &["diff", "goyaml", reference.to_str().unwrap(), same.to_str().unwrap(), "--json"],
    );
    assert!(agree.status.success(), "log: {}", agree.log_path.display());
    assert_eq!(json_lines(&agree.stdout)[0]["agrees"], true);

    let differ = run_cli_case(
        "diff_differ",
        home.path(),
        &["diff", "goyaml", reference.to_str().unwrap(), other.to_str().unwrap(), "--json"],
    );
    assert_eq!(differ.status.code(), Some(4), "log: {}", differ.log_path.display());
    let payload = &json_lines(&differ.stdout)[0];
    assert_eq!(payload["agrees"], false);
    assert_eq!(payload["firstDiffLine"], 3);
}

#[cfg(unix)]
#[test]
fn compare_with_echoing_parsers_agrees() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case_with_env(
        "compare_with_echoing_parsers_agrees",
        home.path(),
        &["compare", "--yaml", EVENTS, "--json"],
        &[("YP_INVOKER_COMMAND_TEMPLATE", "cat")],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = &json_lines(&result.stdout)[0];
    assert_eq!(payload["summary"]["disagreeing"], 0);
    assert_eq!(payload["summary"]["loading"], false);
}

#[cfg(unix)]
#[test]
fn compare_flags_a_disagreeing_parser() {
    let home = tempfile::tempdir().unwrap();
    let script = home.path().join("fake-parser.sh");
    fs::write(
        &script,
        "#!/bin/sh\nif [ \"$1\" = \"libyaml\" ]; then cat >/dev/null; echo broken; exit 0; fi\ncat\n",
    )
    .unwrap();
    let template = format!("sh {} {{id}}", script.display());
    let result = run_cli_case_with_env(
        "compare_flags_a_disagreeing_parser",
        home.path(),
        &["compare", "--yaml", EVENTS, "--json"],
        &[("YP_INVOKER_COMMAND_TEMPLATE", template.as_str())],
    );
    assert_eq!(result.status.code(), Some(4), "log: {}", result.log_path.display());
    let payload = &json_lines(&result.stdout)[0];
    assert_eq!(payload["summary"]["disagreeing"], 1);
    assert_eq!(payload["summary"]["disagreeingNames"][0], "libyaml");
}

#[cfg(unix)]
#[test]
fn run_then_cache_and_runs_commands() {
    let home = tempfile::tempdir().unwrap();
    let suite = TestSuite::new(
        "v1",
        vec![
            TestCase::accepting("ECHO", "Echoed events", EVENTS, EVENTS),
            TestCase::rejecting("BAD1", "Must be rejected", "]["),
        ],
    )
    .unwrap();
    let suite_path = common::write_suite_file(home.path(), &suite);
    let suite_arg = suite_path.to_str().unwrap();
    let envs = [("YP_INVOKER_COMMAND_TEMPLATE", "cat")];

    let first = run_cli_case_with_env(
        "run_first",
        home.path(),
        &["run", "libyaml", "--suite", suite_arg, "--failures", "--json"],
        &envs,
    );
    assert!(first.status.success(), "log: {}", first.log_path.display());
    let report = &json_lines(&first.stdout)[0];
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["fromCache"], false);
    assert_eq!(report["passed"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["failures"][0], "BAD1");

    let second = run_cli_case_with_env(
        "run_second",
        home.path(),
        &["run", "libyaml", "--suite", suite_arg, "--json"],
        &envs,
    );
    assert!(second.status.success(), "log: {}", second.log_path.display());
    assert_eq!(json_lines(&second.stdout)[0]["fromCache"], true);

    let runs = run_cli_case("runs", home.path(), &["runs", "--json"]);
    assert!(runs.status.success(), "log: {}", runs.log_path.display());
    let rows = &json_lines(&runs.stdout)[0]["runs"];
    assert_eq!(rows[0]["parserId"], "libyaml");
    assert_eq!(rows[0]["percent"], 50.0);

    let listed = run_cli_case("cache_list", home.path(), &["cache", "list", "--json"]);
    assert_eq!(json_lines(&listed.stdout)[0]["records"][0]["parser"], "libyaml");

    let cleared = run_cli_case("cache_clear_all", home.path(), &["cache", "clear-all", "--json"]);
    assert!(cleared.status.success(), "log: {}", cleared.log_path.display());
    assert_eq!(json_lines(&cleared.stdout)[0]["removed"], 1);

    let show = run_cli_case("cache_show_missing", home.path(), &["cache", "show", "libyaml"]);
    assert_eq!(show.status.code(), Some(1), "log: {}", show.log_path.display());

    let log = fs::read_to_string(home.path().join("activity.jsonl")).unwrap();
    assert!(log.contains("\"session_start\""));
    assert!(log.contains("\"run_complete\""));
    assert!(log.contains("\"cache_hit\""));
}
