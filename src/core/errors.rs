//! YP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ParityError>;

/// Top-level error type for yaml_parity.
#[derive(Debug, Error)]
pub enum ParityError {
    #[error("[YP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[YP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[YP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[YP-1101] invalid rewrite rule for parser {parser_id}: {details}")]
    InvalidRule { parser_id: String, details: String },

    #[error("[YP-1201] unknown parser: {parser_id}")]
    UnknownParser { parser_id: String },

    #[error("[YP-2001] test corpus load failure from {source_name}: {details}")]
    CorpusLoad {
        source_name: String,
        details: String,
    },

    #[error("[YP-2002] parser invocation failure for {parser_id}: {details}")]
    Invocation { parser_id: String, details: String },

    #[error("[YP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[YP-2201] cache store failure for key {key}: {details}")]
    CacheStore { key: String, details: String },

    #[error("[YP-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[YP-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[YP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl ParityError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "YP-1001",
            Self::MissingConfig { .. } => "YP-1002",
            Self::ConfigParse { .. } => "YP-1003",
            Self::InvalidRule { .. } => "YP-1101",
            Self::UnknownParser { .. } => "YP-1201",
            Self::CorpusLoad { .. } => "YP-2001",
            Self::Invocation { .. } => "YP-2002",
            Self::Serialization { .. } => "YP-2101",
            Self::CacheStore { .. } => "YP-2201",
            Self::Io { .. } => "YP-3002",
            Self::ChannelClosed { .. } => "YP-3003",
            Self::Runtime { .. } => "YP-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::CorpusLoad { .. }
                | Self::Invocation { .. }
                | Self::CacheStore { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for ParityError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ParityError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_variant() -> Vec<ParityError> {
        vec![
            ParityError::InvalidConfig {
                details: String::new(),
            },
            ParityError::MissingConfig {
                path: PathBuf::new(),
            },
            ParityError::ConfigParse {
                context: "",
                details: String::new(),
            },
            ParityError::InvalidRule {
                parser_id: String::new(),
                details: String::new(),
            },
            ParityError::UnknownParser {
                parser_id: String::new(),
            },
            ParityError::CorpusLoad {
                source_name: String::new(),
                details: String::new(),
            },
            ParityError::Invocation {
                parser_id: String::new(),
                details: String::new(),
            },
            ParityError::Serialization {
                context: "",
                details: String::new(),
            },
            ParityError::CacheStore {
                key: String::new(),
                details: String::new(),
            },
            ParityError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            ParityError::ChannelClosed { component: "" },
            ParityError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = every_variant();
        let codes: Vec<&str> = errors.iter().map(ParityError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_carries_code_prefix() {
        for err in every_variant() {
            assert!(err.code().starts_with("YP-"));
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code: {msg}"
            );
        }
    }

    #[test]
    fn corpus_error_mentions_source() {
        let err = ParityError::CorpusLoad {
            source_name: "tests.json".to_string(),
            details: "HTTP 404".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tests.json"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            ParityError::Invocation {
                parser_id: "libyaml".to_string(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(ParityError::ChannelClosed { component: "live" }.is_retryable());
        assert!(
            !ParityError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ParityError::UnknownParser {
                parser_id: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = ParityError::io(
            "/tmp/cache/test-results-libyaml.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "YP-3002");
        assert!(err.to_string().contains("test-results-libyaml.json"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: ParityError = json_err.into();
        assert_eq!(err.code(), "YP-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: ParityError = toml_err.into();
        assert_eq!(err.code(), "YP-1003");
    }
}
