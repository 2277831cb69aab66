//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use signal_hook::consts::{SIGINT, SIGTERM};
use thiserror::Error;

use yaml_parity::cache::{FileCacheStore, ResultCache, TestResultCache};
use yaml_parity::catalog::{Catalog, ParserDescriptor, builtin};
use yaml_parity::compare::Comparator;
use yaml_parity::core::cancel::CancellationToken;
use yaml_parity::core::config::Config;
use yaml_parity::core::errors::ParityError;
use yaml_parity::live::{LiveCycle, LiveEngine, LiveParserResult, LiveTrigger, Verdict};
use yaml_parity::logger::jsonl::JsonlConfig;
use yaml_parity::logger::{ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger};
use yaml_parity::runner::report::{
    CompareSort, CompareSortColumn, RunSummary, SortDirection, TestSort, TestSortColumn,
    comparison_rows, format_elapsed, sort_comparisons, sort_rows,
};
use yaml_parity::runner::{
    ResultRow, RunObserver, RunOutcome, RunReport, RunRequest, RunState, TestExecutor,
};
use yaml_parity::suite::{JsonFileSuiteLoader, MemoizedLoader};

/// yparity: differential testing for YAML parsers.
#[derive(Debug, Parser)]
#[command(
    name = "yparity",
    author,
    version,
    about = "Compare YAML parser event streams against a reference implementation",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run parsers against the conformance corpus.
    Run(RunArgs),
    /// Compare every parser against the reference on one input.
    Compare(CompareArgs),
    /// Re-compare a file each time it changes.
    Watch(WatchArgs),
    /// Show the normalized difference between two event streams.
    Diff(DiffArgs),
    /// List known parsers.
    Parsers(ParsersArgs),
    /// Inspect or clear stored run results.
    Cache(CacheArgs),
    /// Compare stored runs across parsers.
    Runs(RunsArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Parser ids to run.
    #[arg(value_name = "PARSER", required_unless_present = "all")]
    parsers: Vec<String>,
    /// Run every parser in the catalog.
    #[arg(long, conflicts_with = "parsers")]
    all: bool,
    /// Ignore a valid cached result and run again.
    #[arg(long)]
    force: bool,
    /// Corpus file (overrides `paths.suite_file`).
    #[arg(long, value_name = "PATH")]
    suite: Option<PathBuf>,
    /// List failing tests after each run.
    #[arg(long)]
    failures: bool,
    /// Ordering of listed tests.
    #[arg(long, value_enum, default_value_t = TestSortColumn::Id)]
    sort: TestSortColumn,
    /// Reverse the ordering of listed tests.
    #[arg(long)]
    desc: bool,
}

#[derive(Debug, Clone, Args)]
struct CompareArgs {
    /// YAML file to compare; reads stdin when omitted or `-`.
    #[arg(value_name = "FILE", conflicts_with = "yaml")]
    input: Option<PathBuf>,
    /// Inline YAML instead of a file.
    #[arg(long, value_name = "TEXT")]
    yaml: Option<String>,
    /// Only show these parsers (comma-separated ids).
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    parsers: Vec<String>,
    /// Print each parser's raw output.
    #[arg(long)]
    output: bool,
}

#[derive(Debug, Clone, Args)]
struct WatchArgs {
    /// YAML file to watch.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Active parsers (comma-separated ids); defaults to `live.parsers`.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    parsers: Vec<String>,
    /// Quiet period before re-running (overrides `live.debounce_ms`).
    #[arg(long, value_name = "MILLISECONDS")]
    debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct DiffArgs {
    /// Parser whose rewrite rules apply to the candidate side.
    #[arg(value_name = "PARSER")]
    parser: String,
    /// Reference event stream.
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,
    /// Candidate event stream.
    #[arg(value_name = "CANDIDATE")]
    candidate: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct ParsersArgs {
    /// Only the parsers shown by default in live mode.
    #[arg(long)]
    visible: bool,
}

#[derive(Debug, Clone, Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum CacheCommand {
    /// List stored records.
    List,
    /// Show one parser's stored record.
    Show(CacheShowArgs),
    /// Remove one parser's stored record.
    Clear(CacheClearArgs),
    /// Remove every stored record.
    ClearAll,
}

#[derive(Debug, Clone, Args)]
struct CacheShowArgs {
    #[arg(value_name = "PARSER")]
    parser: String,
    /// List failing tests.
    #[arg(long)]
    failures: bool,
}

#[derive(Debug, Clone, Args)]
struct CacheClearArgs {
    #[arg(value_name = "PARSER")]
    parser: String,
}

#[derive(Debug, Clone, Args)]
struct RunsArgs {
    /// Column to order by.
    #[arg(long, value_enum, default_value_t = CompareSortColumn::Percent)]
    sort: CompareSortColumn,
    /// Direction; text columns default to ascending, numbers to descending.
    #[arg(long, value_enum)]
    direction: Option<SortDirection>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded, or parsers disagree.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<ParityError> for CliError {
    /// Configuration and lookup errors (`YP-1xxx`) are the user's to fix.
    fn from(error: ParityError) -> Self {
        if error.code().starts_with("YP-1") {
            Self::User(error.to_string())
        } else {
            Self::Runtime(error.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_batch(cli, args),
        Command::Compare(args) => run_compare(cli, args),
        Command::Watch(args) => run_watch(cli, args),
        Command::Diff(args) => run_diff(cli, args),
        Command::Parsers(args) => run_parsers(cli, args),
        Command::Cache(args) => run_cache(cli, args),
        Command::Runs(args) => run_runs(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── session ────────────────────

/// Loaded config plus the activity logger; shuts the logger down on drop.
struct Session {
    config: Config,
    activity: Option<ActivityLoggerHandle>,
    logger_thread: Option<thread::JoinHandle<()>>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = Config::load(cli.config.as_deref())?;
        let logger_config = ActivityLoggerConfig::new(JsonlConfig::at(&config.paths.activity_log));
        let (activity, logger_thread) = match spawn_logger(logger_config) {
            Ok((handle, join)) => (Some(handle), Some(join)),
            Err(e) => {
                if !cli.quiet {
                    eprintln!("[YP-LOG] activity log disabled: {e}");
                }
                (None, None)
            }
        };
        if let Some(activity) = &activity {
            activity.send(ActivityEvent::SessionStarted {
                version: env!("CARGO_PKG_VERSION").to_string(),
                config_hash: config.stable_hash().unwrap_or_default(),
            });
        }
        Ok(Self {
            config,
            activity,
            logger_thread,
        })
    }

    // Both were built once during validation, so failure here is a bug.
    fn catalog(&self) -> Result<Arc<Catalog>, CliError> {
        self.config
            .build_catalog()
            .map(Arc::new)
            .map_err(|e| CliError::Internal(e.to_string()))
    }

    fn comparator(&self) -> Result<Arc<Comparator>, CliError> {
        self.config
            .build_comparator()
            .map(Arc::new)
            .map_err(|e| CliError::Internal(e.to_string()))
    }

    fn cache(&self) -> ResultCache {
        let cache = ResultCache::new(Arc::new(FileCacheStore::new(&self.config.paths.cache_dir)));
        match &self.activity {
            Some(activity) => cache.with_activity(activity.clone()),
            None => cache,
        }
    }

    fn live_engine(&self, catalog: Arc<Catalog>) -> Result<LiveEngine, CliError> {
        let engine = LiveEngine::new(catalog, self.config.build_invoker(), self.comparator()?);
        Ok(match &self.activity {
            Some(activity) => engine.with_activity(activity.clone()),
            None => engine,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(activity) = &self.activity {
            activity.shutdown();
        }
        if let Some(join) = self.logger_thread.take() {
            let _ = join.join();
        }
    }
}

/// Token cancelled by SIGINT/SIGTERM.
fn signal_token() -> CancellationToken {
    let token = CancellationToken::new();
    for (name, signal) in [("SIGINT", SIGINT), ("SIGTERM", SIGTERM)] {
        if let Err(e) = signal_hook::flag::register(signal, token.as_flag()) {
            eprintln!("[YP-SIGNAL] failed to register {name}: {e}");
        }
    }
    token
}

// ──────────────────── run ────────────────────

/// Human-mode run feedback: one row per finished test when verbose,
/// otherwise a single rewritten progress line on a terminal.
struct RowPrinter {
    rows: bool,
    progress: bool,
    line_open: bool,
}

impl RowPrinter {
    fn for_cli(cli: &Cli, mode: OutputMode) -> Self {
        let human = mode == OutputMode::Human && !cli.quiet;
        Self {
            rows: human && cli.verbose,
            progress: human && !cli.verbose && io::stderr().is_terminal(),
            line_open: false,
        }
    }
}

fn progress_line(parser_id: &str, index: usize, total: usize) -> String {
    format!("{parser_id}: test {}/{total}", index + 1)
}

impl RunObserver for RowPrinter {
    fn on_state(&mut self, parser_id: &str, state: &RunState) {
        if !self.progress {
            return;
        }
        if let RunState::Running { index, total } = state {
            eprint!("\r{}", progress_line(parser_id, *index, *total).dimmed());
            let _ = io::stderr().flush();
            self.line_open = true;
        } else if self.line_open {
            eprintln!();
            self.line_open = false;
        }
    }

    fn on_row_finished(&mut self, index: usize, row: &ResultRow) {
        if self.rows {
            let mark = if row.passed {
                "PASS".green()
            } else {
                "FAIL".red()
            };
            eprintln!("  {:>4} {mark} {} {}", index + 1, row.test_id, row.test_name.dimmed());
        }
    }
}

fn run_batch(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let catalog = session.catalog()?;
    let parsers: Vec<ParserDescriptor> = if args.all {
        catalog.all().to_vec()
    } else {
        args.parsers
            .iter()
            .map(|id| catalog.require(id).cloned())
            .collect::<Result<_, _>>()?
    };

    let suite_path = args
        .suite
        .clone()
        .unwrap_or_else(|| session.config.paths.suite_file.clone());
    let loader = Arc::new(MemoizedLoader::new(JsonFileSuiteLoader::new(suite_path)));
    let mut executor = TestExecutor::new(
        loader,
        session.config.build_invoker(),
        session.comparator()?,
        session.cache(),
    );
    if let Some(activity) = &session.activity {
        executor = executor.with_activity(activity.clone());
    }

    let mode = output_mode(cli);
    let token = signal_token();
    let sort = TestSort {
        column: args.sort,
        direction: if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
    };
    let mut observer = RowPrinter::for_cli(cli, mode);
    let mut failed_runs = Vec::new();

    for parser in parsers {
        let request = RunRequest::new(parser.clone()).forced(args.force);
        match executor.run(&request, &token, &mut observer) {
            Ok(RunOutcome::Completed(mut report)) => {
                sort_rows(&mut report.rows, sort);
                emit_run_report(cli, mode, &parser, &report, args.failures)?;
            }
            Ok(RunOutcome::Aborted { completed }) => {
                emit_run_event(mode, &parser, "aborted", json!({ "completed": completed }))?;
                return Err(CliError::Partial(format!(
                    "run of {} interrupted after {completed} tests",
                    parser.id
                )));
            }
            Ok(RunOutcome::Suppressed) => {
                emit_run_event(mode, &parser, "suppressed", json!({}))?;
            }
            Err(e) => {
                emit_run_event(
                    mode,
                    &parser,
                    "failed",
                    json!({ "code": e.code(), "error": e.to_string() }),
                )?;
                failed_runs.push(parser.id.clone());
            }
        }
    }

    if failed_runs.is_empty() {
        Ok(())
    } else {
        Err(CliError::Runtime(format!(
            "run failed for: {}",
            failed_runs.join(", ")
        )))
    }
}

fn emit_run_report(
    cli: &Cli,
    mode: OutputMode,
    parser: &ParserDescriptor,
    report: &RunReport,
    list_failures: bool,
) -> Result<(), CliError> {
    let summary = RunSummary::from_rows(&report.rows, report.total_tests);
    let failures: Vec<&ResultRow> = report.rows.iter().filter(|r| !r.passed).collect();
    match mode {
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            let cached = if report.from_cache {
                " (cached)".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "{} {}: {}/{} passed ({}%) in {}{cached}",
                parser.name.bold(),
                report.parser_version,
                summary.passed.to_string().green(),
                summary.total,
                summary.pass_percent_label(),
                format_elapsed(report.elapsed_ms),
            );
            if list_failures {
                for row in failures {
                    println!("  {} {} {}", "FAIL".red(), row.test_id, row.test_name);
                }
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "run",
                "parser": parser.id,
                "outcome": "completed",
                "fromCache": report.from_cache,
                "parserVersion": report.parser_version,
                "suiteVersion": report.suite_version,
                "passed": summary.passed,
                "failed": summary.failed,
                "total": summary.total,
                "percent": summary.pass_percent_label(),
                "elapsedMs": report.elapsed_ms,
            });
            if list_failures {
                payload["failures"] =
                    Value::from(failures.iter().map(|r| r.test_id.clone()).collect::<Vec<_>>());
            }
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn emit_run_event(
    mode: OutputMode,
    parser: &ParserDescriptor,
    outcome: &str,
    extra: Value,
) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            let label = match outcome {
                "failed" => outcome.red(),
                _ => outcome.yellow(),
            };
            let detail = extra
                .get("error")
                .and_then(Value::as_str)
                .map(|e| format!(": {e}"))
                .unwrap_or_default();
            eprintln!("{} {label}{detail}", parser.name.bold());
            Ok(())
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "run",
                "parser": parser.id,
                "outcome": outcome,
            });
            if let (Some(target), Some(fields)) = (payload.as_object_mut(), extra.as_object()) {
                target.extend(fields.clone());
            }
            write_json_line(&payload)
        }
    }
}

// ──────────────────── live ────────────────────

fn run_compare(cli: &Cli, args: &CompareArgs) -> Result<(), CliError> {
    let yaml = match (&args.yaml, &args.input) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) if path != Path::new("-") => read_text(path)?,
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let session = Session::open(cli)?;
    let catalog = session.catalog()?;
    let shown = resolve_shown(&catalog, &args.parsers, None)?;
    let engine = session.live_engine(Arc::clone(&catalog))?;
    let token = signal_token();
    let Some(cycle) = engine.run_cycle(&yaml, &token) else {
        return Err(CliError::Partial("comparison interrupted".to_string()));
    };

    emit_cycle(cli, output_mode(cli), &catalog, &cycle, &shown, args.output)?;

    let disagreeing: Vec<&str> = cycle
        .results
        .iter()
        .filter(|r| shown.contains(&r.parser_id) && r.disagrees())
        .map(|r| catalog.display_name(&r.parser_id))
        .collect();
    if disagreeing.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial(format!(
            "{} parser(s) disagree with {}: {}",
            disagreeing.len(),
            catalog.reference().name,
            disagreeing.join(", ")
        )))
    }
}

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let catalog = session.catalog()?;
    let shown = resolve_shown(&catalog, &args.parsers, Some(session.config.live.parsers.as_slice()))?;
    let engine = session.live_engine(Arc::clone(&catalog))?;
    let debounce = args
        .debounce_ms
        .map_or_else(|| session.config.live.debounce(), Duration::from_millis);
    let poll_interval = session.config.live.poll_interval();
    let mode = output_mode(cli);
    let token = signal_token();
    let mut trigger = LiveTrigger::new(debounce);

    if mode == OutputMode::Human && !cli.quiet {
        eprintln!(
            "watching {} (debounce {} ms, Ctrl-C to stop)",
            args.file.display(),
            debounce.as_millis()
        );
    }

    while !token.is_cancelled() {
        let now = Instant::now();
        match fs::read_to_string(&args.file) {
            Ok(text) => {
                trigger.observe(&text, shown.iter().cloned(), now);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CliError::Runtime(format!(
                    "read {}: {e}",
                    args.file.display()
                )));
            }
        }

        if let Some(inputs) = trigger.poll(now) {
            let active: Vec<String> = inputs.active.iter().cloned().collect();
            match engine.run_cycle(&inputs.input, &token) {
                Some(cycle) => {
                    trigger.complete(&inputs);
                    emit_cycle(cli, mode, &catalog, &cycle, &active, false)?;
                }
                None => {
                    trigger.abandon();
                    break;
                }
            }
        }
        thread::sleep(poll_interval);
    }
    Ok(())
}

/// Ids to display, always including the reference.
fn resolve_shown(
    catalog: &Catalog,
    requested: &[String],
    fallback: Option<&[String]>,
) -> Result<Vec<String>, CliError> {
    let ids: Vec<String> = if !requested.is_empty() {
        requested.to_vec()
    } else if let Some(configured) = fallback {
        if configured.is_empty() {
            builtin::DEFAULT_VISIBLE
                .iter()
                .filter(|id| catalog.get(id).is_some())
                .map(ToString::to_string)
                .collect()
        } else {
            configured.to_vec()
        }
    } else {
        catalog.all().iter().map(|p| p.id.clone()).collect()
    };

    let mut shown = vec![catalog.reference_id().to_string()];
    for id in ids {
        catalog.require(&id)?;
        if !shown.contains(&id) {
            shown.push(id);
        }
    }
    Ok(shown)
}

fn emit_cycle(
    cli: &Cli,
    mode: OutputMode,
    catalog: &Catalog,
    cycle: &LiveCycle,
    shown: &[String],
    with_output: bool,
) -> Result<(), CliError> {
    let summary = cycle.summary(catalog);
    let visible: Vec<&LiveParserResult> = cycle
        .results
        .iter()
        .filter(|r| shown.contains(&r.parser_id))
        .collect();
    match mode {
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            for result in &visible {
                print_live_result(catalog, result, with_output);
            }
            if summary.disagreeing == 0 {
                println!(
                    "{}",
                    format!("all {} parsers agree", summary.total).green()
                );
            } else {
                println!(
                    "{}",
                    format!(
                        "{} of {} parsers disagree: {}",
                        summary.disagreeing,
                        summary.total,
                        summary.disagreeing_names.join(", ")
                    )
                    .red()
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "compare",
                "results": visible,
                "summary": summary,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_live_result(catalog: &Catalog, result: &LiveParserResult, with_output: bool) {
    let mark = if result.visually_matches == Some(true) {
        "✓".green()
    } else if result.agrees == Some(true) {
        "~".yellow()
    } else {
        "✗".red()
    };
    let verdict = match result.verdict {
        Some(Verdict::Reference) => "reference",
        Some(Verdict::ConnectionFailure) => "connection failed",
        Some(Verdict::StatusParity) => "status parity",
        Some(Verdict::InvalidInput) => "invalid input",
        Some(Verdict::OutputCompared) => "output compared",
        None => "pending",
    };
    println!(
        "{mark} {:<20} status {:>3}  {}",
        catalog.display_name(&result.parser_id),
        result.status,
        verdict.dimmed()
    );
    if let Some(mismatch) = &result.version_mismatch {
        println!(
            "    sandbox is {}, this client requires {}",
            mismatch.found, mismatch.required
        );
    }
    if with_output {
        for line in result.output.lines() {
            println!("    {line}");
        }
    }
}

// ──────────────────── diff ────────────────────

fn run_diff(cli: &Cli, args: &DiffArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let comparator = config.build_comparator()?;
    let reference = read_text(&args.reference)?;
    let candidate = read_text(&args.candidate)?;
    let pair = comparator.normalize_pair(&reference, &candidate, &args.parser);

    match output_mode(cli) {
        OutputMode::Human => {
            if pair.agrees {
                println!("{}", "event streams agree".green());
            } else {
                print!("{}", pair.unified_diff());
                if let Some(line) = pair.first_diff_line() {
                    println!("first difference at normalized line {line}");
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "diff",
                "parser": args.parser,
                "agrees": pair.agrees,
                "firstDiffLine": pair.first_diff_line(),
                "reference": pair.reference,
                "candidate": pair.candidate,
                "diff": pair.unified_diff(),
            });
            write_json_line(&payload)?;
        }
    }

    if pair.agrees {
        Ok(())
    } else {
        Err(CliError::Partial("event streams differ".to_string()))
    }
}

// ──────────────────── parsers ────────────────────

fn run_parsers(cli: &Cli, args: &ParsersArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let catalog = config.build_catalog()?;
    let parsers: Vec<&ParserDescriptor> = catalog
        .all()
        .iter()
        .filter(|p| !args.visible || builtin::DEFAULT_VISIBLE.contains(&p.id.as_str()))
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            for parser in parsers {
                let mut tags = Vec::new();
                if parser.id == catalog.reference_id() {
                    tags.push("reference");
                }
                if parser.is_status_only() {
                    tags.push("status-only");
                }
                println!(
                    "{:<14} {:<20} {:<10} {:<12} {}",
                    parser.id.bold(),
                    parser.name,
                    parser.version,
                    parser.language,
                    tags.join(",").dimmed()
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "parsers",
                "reference": catalog.reference_id(),
                "parsers": parsers,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── cache + runs ────────────────────

fn run_cache(cli: &Cli, args: &CacheArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let cache = session.cache();
    let catalog = session.catalog()?;
    let mode = output_mode(cli);

    match &args.command {
        CacheCommand::List => {
            let records = cache.enumerate_all();
            let unreadable = cache.count().saturating_sub(records.len());
            match mode {
                OutputMode::Human => {
                    if records.is_empty() {
                        println!("No stored results in {}", session.config.paths.cache_dir.display());
                    }
                    for (id, record) in &records {
                        print_record_line(&catalog, id, record);
                    }
                    if unreadable > 0 {
                        println!("{}", format!("{unreadable} unreadable record(s)").yellow());
                    }
                }
                OutputMode::Json => {
                    let entries: Vec<Value> = records
                        .iter()
                        .map(|(id, record)| record_json(&catalog, id, record))
                        .collect();
                    write_json_line(&json!({
                        "command": "cache list",
                        "records": entries,
                        "unreadable": unreadable,
                    }))?;
                }
            }
            Ok(())
        }
        CacheCommand::Show(show) => {
            let record = cache
                .read(&show.parser)
                .ok_or_else(|| CliError::User(format!("no stored results for {}", show.parser)))?;
            let failures: Vec<&str> = record
                .results
                .iter()
                .filter(|r| !r.passed)
                .map(|r| r.test_id.as_str())
                .collect();
            match mode {
                OutputMode::Human => {
                    print_record_line(&catalog, &show.parser, &record);
                    if show.failures {
                        for id in failures {
                            println!("  {} {id}", "FAIL".red());
                        }
                    }
                }
                OutputMode::Json => {
                    let mut payload = record_json(&catalog, &show.parser, &record);
                    payload["command"] = Value::from("cache show");
                    if show.failures {
                        payload["failures"] = Value::from(failures);
                    }
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        CacheCommand::Clear(clear) => {
            cache.clear(&clear.parser);
            match mode {
                OutputMode::Human => println!("Cleared stored results for {}", clear.parser),
                OutputMode::Json => write_json_line(&json!({
                    "command": "cache clear",
                    "parser": clear.parser,
                }))?,
            }
            Ok(())
        }
        CacheCommand::ClearAll => {
            let removed = cache.clear_all();
            match mode {
                OutputMode::Human => println!("Removed {removed} stored record(s)"),
                OutputMode::Json => write_json_line(&json!({
                    "command": "cache clear-all",
                    "removed": removed,
                }))?,
            }
            Ok(())
        }
    }
}

/// A record is stale once the catalog's parser version moves on.
fn is_stale(catalog: &Catalog, parser_id: &str, record: &TestResultCache) -> bool {
    catalog
        .get(parser_id)
        .is_some_and(|p| p.version != record.parser_version)
}

fn print_record_line(catalog: &Catalog, parser_id: &str, record: &TestResultCache) {
    let stale = if is_stale(catalog, parser_id, record) {
        " stale".yellow().to_string()
    } else {
        String::new()
    };
    println!(
        "{:<14} {:<10} suite {:<10} {}/{} passed in {}{stale}",
        parser_id.bold(),
        record.parser_version,
        record.test_suite_version,
        record.passed(),
        record.results.len(),
        format_elapsed(record.elapsed_time_ms),
    );
}

fn record_json(catalog: &Catalog, parser_id: &str, record: &TestResultCache) -> Value {
    json!({
        "parser": parser_id,
        "parserVersion": record.parser_version,
        "suiteVersion": record.test_suite_version,
        "passed": record.passed(),
        "failed": record.failed(),
        "total": record.results.len(),
        "elapsedMs": record.elapsed_time_ms,
        "stale": is_stale(catalog, parser_id, record),
    })
}

fn run_runs(cli: &Cli, args: &RunsArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let catalog = session.catalog()?;
    let mut rows = comparison_rows(&session.cache().enumerate_all(), &catalog);
    let direction = args.direction.unwrap_or(match args.sort {
        CompareSortColumn::ParserName | CompareSortColumn::Version => SortDirection::Asc,
        _ => CompareSort::default().direction,
    });
    sort_comparisons(
        &mut rows,
        CompareSort {
            column: args.sort,
            direction,
        },
    );

    match output_mode(cli) {
        OutputMode::Human => {
            if rows.is_empty() {
                println!("No stored runs. Use `yparity run` first.");
                return Ok(());
            }
            println!(
                "{:<20} {:<10} {:>6} {:>6} {:>6} {:>7} {:>9}",
                "PARSER", "VERSION", "PASS", "FAIL", "TOTAL", "%", "TIME"
            );
            for row in &rows {
                println!(
                    "{:<20} {:<10} {:>6} {:>6} {:>6} {:>7} {:>9}",
                    row.parser_name,
                    row.version,
                    row.passed,
                    row.failed,
                    row.total,
                    row.percent_label(),
                    format_elapsed(row.elapsed_ms),
                );
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "runs",
                "runs": rows,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output ────────────────────

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CliError::User(format!("{} not found", path.display())),
        _ => CliError::Runtime(format!("read {}: {e}", path.display())),
    })
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("YP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
