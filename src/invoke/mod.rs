//! Parser invocation capability.
//!
//! The engine never talks to a parser directly; it goes through a
//! [`ParserInvoker`]. A response with status `0` is success, any other
//! non-negative status is a parser-reported parse error, and
//! [`STATUS_TRANSPORT_FAILURE`] means the parser could not be reached at all.
//! `Err` is reserved for failures where invoking that parser is impossible
//! (misconfiguration, missing tooling).

pub mod command;
pub mod sandbox;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

/// Parser accepted the input.
pub const STATUS_SUCCESS: i32 = 0;
/// Parser could not be reached (connection, spawn, timeout).
pub const STATUS_TRANSPORT_FAILURE: i32 = -1;

/// The parser backend runs a different version than the one required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMismatch {
    pub required: String,
    pub found: String,
}

/// Result of one parser invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status: i32,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_mismatch: Option<VersionMismatch>,
}

impl InvocationResponse {
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS,
            output: output.into(),
            version_mismatch: None,
        }
    }

    #[must_use]
    pub fn parse_error(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
            version_mismatch: None,
        }
    }

    #[must_use]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_TRANSPORT_FAILURE,
            output: message.into(),
            version_mismatch: None,
        }
    }

    #[must_use]
    pub fn version_mismatch(required: impl Into<String>, found: impl Into<String>) -> Self {
        let required = required.into();
        let found = found.into();
        Self {
            status: STATUS_TRANSPORT_FAILURE,
            output: format!(
                "Version mismatch: sandbox is {found}, but this client requires {required}"
            ),
            version_mismatch: Some(VersionMismatch { required, found }),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        self.status == STATUS_TRANSPORT_FAILURE
    }
}

/// Injected capability that runs one parser over one YAML input.
///
/// Implementations own timeouts and retries; callers impose none.
pub trait ParserInvoker: Send + Sync {
    fn invoke(&self, parser_id: &str, yaml: &str) -> Result<InvocationResponse>;
}

impl<F> ParserInvoker for F
where
    F: Fn(&str, &str) -> Result<InvocationResponse> + Send + Sync,
{
    fn invoke(&self, parser_id: &str, yaml: &str) -> Result<InvocationResponse> {
        self(parser_id, yaml)
    }
}
