//! Sandbox invoker: HTTP form POST to a parser sandbox through `curl`.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;

use crate::core::errors::{ParityError, Result};
use crate::invoke::{InvocationResponse, ParserInvoker};

const MISMATCH_MARKER: &str = "Requires sandbox version ";
const STATUS_SEPARATOR: char = '\n';

#[derive(Debug, Deserialize)]
struct SandboxBody {
    status: i32,
    #[serde(default)]
    output: String,
}

/// Posts `text=<yaml>` to `<url>/?version=..&parser=yaml-test-parse-<id>`.
#[derive(Debug, Clone)]
pub struct SandboxInvoker {
    base_url: String,
    required_version: String,
    timeout: Duration,
}

impl SandboxInvoker {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        required_version: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            required_version: required_version.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn request_url(&self, parser_id: &str) -> String {
        format!(
            "{}/?version={}&parser=yaml-test-parse-{}",
            self.base_url,
            encode_query_component(&self.required_version),
            encode_query_component(parser_id)
        )
    }
}

impl ParserInvoker for SandboxInvoker {
    fn invoke(&self, parser_id: &str, yaml: &str) -> Result<InvocationResponse> {
        let max_time = format!("{:.3}", self.timeout.as_secs_f64());
        let spawned = Command::new("curl")
            .args([
                "-sS",
                "-X",
                "POST",
                "--max-time",
                &max_time,
                "-H",
                "Content-Type: application/x-www-form-urlencoded",
                "--data-urlencode",
                "text@-",
                "-w",
                "\n%{http_code}",
            ])
            .arg(self.request_url(parser_id))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = spawned.map_err(|e| ParityError::Invocation {
            parser_id: parser_id.to_string(),
            details: format!("curl not found or failed: {e}"),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // curl reads the whole body before sending; a failed write shows up as
            // a curl error below.
            let _ = stdin.write_all(yaml.as_bytes());
        }
        let output = child.wait_with_output().map_err(|e| ParityError::Invocation {
            parser_id: parser_id.to_string(),
            details: format!("waiting for curl: {e}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(InvocationResponse::transport_failure(format!(
                "sandbox request failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(parse_reply(&raw, &self.required_version))
    }
}

/// Interpret curl's stdout: response body followed by `\n<http_code>`.
#[must_use]
pub fn parse_reply(raw: &str, required_version: &str) -> InvocationResponse {
    let (body, code) = match raw.rsplit_once(STATUS_SEPARATOR) {
        Some((body, code)) => (body, code.trim()),
        None => ("", raw.trim()),
    };
    let Ok(http_code) = code.parse::<u16>() else {
        return InvocationResponse::transport_failure(format!(
            "unreadable sandbox reply: {}",
            raw.trim()
        ));
    };

    if !(200..300).contains(&http_code) {
        if let Some(found) = mismatch_version(body) {
            return InvocationResponse::version_mismatch(required_version, found);
        }
        return InvocationResponse::transport_failure(format!("HTTP {http_code}"));
    }

    match serde_json::from_str::<SandboxBody>(body) {
        Ok(reply) => InvocationResponse::parse_error(reply.status, reply.output),
        Err(e) => InvocationResponse::transport_failure(format!("invalid sandbox response: {e}")),
    }
}

fn mismatch_version(body: &str) -> Option<&str> {
    let start = body.find(MISMATCH_MARKER)? + MISMATCH_MARKER.len();
    let found = body[start..].split_whitespace().next()?;
    Some(found)
}

fn encode_query_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
