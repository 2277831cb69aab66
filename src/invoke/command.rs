//! Local-command invoker: one executable per parser.
//!
//! The YAML input is written to the child's stdin; the event stream is read
//! from stdout and the exit code becomes the status. A child that cannot be
//! spawned, is killed by a signal, or outlives the timeout is reported as a
//! transport failure.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::errors::{ParityError, Result};
use crate::invoke::{InvocationResponse, ParserInvoker};

/// Placeholder in command templates replaced by the parser id.
pub const ID_PLACEHOLDER: &str = "{id}";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs `yaml-test-parse-<id>`-style executables.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    template: String,
    overrides: HashMap<String, Vec<String>>,
    timeout: Duration,
}

impl CommandInvoker {
    #[must_use]
    pub fn new(template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            template: template.into(),
            overrides: HashMap::new(),
            timeout,
        }
    }

    /// Use an explicit argv for one parser instead of the template.
    #[must_use]
    pub fn with_override(mut self, parser_id: impl Into<String>, argv: Vec<String>) -> Self {
        self.overrides.insert(parser_id.into(), argv);
        self
    }

    /// Resolved argv for a parser.
    pub fn argv_for(&self, parser_id: &str) -> Result<Vec<String>> {
        let argv: Vec<String> = match self.overrides.get(parser_id) {
            Some(argv) => argv.clone(),
            None => self
                .template
                .split_whitespace()
                .map(|part| part.replace(ID_PLACEHOLDER, parser_id))
                .collect(),
        };
        if argv.is_empty() {
            return Err(ParityError::Invocation {
                parser_id: parser_id.to_string(),
                details: "no command configured".to_string(),
            });
        }
        Ok(argv)
    }
}

impl ParserInvoker for CommandInvoker {
    fn invoke(&self, parser_id: &str, yaml: &str) -> Result<InvocationResponse> {
        let argv = self.argv_for(parser_id)?;
        let spawned = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(error) => {
                return Ok(InvocationResponse::transport_failure(format!(
                    "failed to start {}: {error}",
                    argv[0]
                )));
            }
        };

        let stdin = child.stdin.take();
        let input = yaml.to_string();
        let writer = thread::spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes())?;
            }
            Ok(())
        });
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let exit = wait_with_timeout(&mut child, self.timeout);
        // A parser may exit before consuming stdin; a broken pipe is not an error.
        let _ = writer.join();
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        let response = match exit {
            WaitOutcome::Exited(Some(0)) => InvocationResponse::success(stdout),
            WaitOutcome::Exited(Some(code)) => {
                let output = if stdout.trim().is_empty() { stderr } else { stdout };
                InvocationResponse::parse_error(code, output)
            }
            WaitOutcome::Exited(None) => {
                InvocationResponse::transport_failure(format!("{} terminated by signal", argv[0]))
            }
            WaitOutcome::TimedOut => InvocationResponse::transport_failure(format!(
                "{} timed out after {} ms",
                argv[0],
                self.timeout.as_millis()
            )),
            WaitOutcome::Failed(error) => {
                InvocationResponse::transport_failure(format!("waiting for {}: {error}", argv[0]))
            }
        };
        Ok(response)
    }
}

enum WaitOutcome {
    Exited(Option<i32>),
    TimedOut,
    Failed(io::Error),
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> WaitOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Exited(status.code()),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return WaitOutcome::TimedOut;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(error) => return WaitOutcome::Failed(error),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
