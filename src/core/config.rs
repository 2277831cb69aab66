//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ParserDescriptor, builtin};
use crate::compare::Comparator;
use crate::compare::rules::RuleSpec;
use crate::core::errors::{ParityError, Result};
use crate::invoke::ParserInvoker;
use crate::invoke::command::{CommandInvoker, ID_PLACEHOLDER};
use crate::invoke::sandbox::SandboxInvoker;

/// Full yparity configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub invoker: InvokerConfig,
    pub live: LiveConfig,
    pub compare: CompareConfig,
    pub catalog: CatalogConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Directory holding one `test-results-<id>.json` record per parser.
    pub cache_dir: PathBuf,
    pub activity_log: PathBuf,
    /// Conformance corpus in JSON form.
    pub suite_file: PathBuf,
}

/// How parsers are reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokerMode {
    /// Local executables, one per parser.
    #[default]
    Command,
    /// Remote parser sandbox over HTTP.
    Sandbox,
}

impl std::str::FromStr for InvokerMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(format!("expected command|sandbox, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InvokerConfig {
    pub mode: InvokerMode,
    /// Command line with `{id}` replaced by the parser id.
    pub command_template: String,
    /// Explicit argv per parser id, overriding the template.
    pub commands: HashMap<String, Vec<String>>,
    pub sandbox_url: String,
    /// Sandbox version this client requires.
    pub sandbox_version: String,
    pub timeout_ms: u64,
}

/// Live comparison loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LiveConfig {
    /// Quiet period after the last edit before a cycle starts.
    pub debounce_ms: u64,
    /// How often `watch` samples the input file.
    pub poll_interval_ms: u64,
    /// Active parser ids; empty means every catalog entry.
    pub parsers: Vec<String>,
}

/// Extra rewrite rules appended after the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CompareConfig {
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    pub reference: String,
    /// Replaces the built-in parser table when non-empty.
    pub parsers: Vec<ParserDescriptor>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[YP-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("yparity").join("config.toml");
        let data = home_dir.join(".local").join("share").join("yparity");
        Self {
            config_file: cfg,
            cache_dir: data.join("cache"),
            activity_log: data.join("activity.jsonl"),
            suite_file: data.join("yaml-test-suite.json"),
        }
    }
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            mode: InvokerMode::Command,
            command_template: format!("yaml-test-parse-{ID_PLACEHOLDER}"),
            commands: HashMap::new(),
            sandbox_url: "https://localhost:7481".to_string(),
            sandbox_version: "0.1.0".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            poll_interval_ms: 100,
            parsers: Vec::new(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            reference: builtin::REFERENCE_ID.to_string(),
            parsers: Vec::new(),
        }
    }
}

impl InvokerConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LiveConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ParityError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(ParityError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let mut canonical = serde_json::to_value(self)?;
        // HashMap order is not stable; sort command overrides by key.
        if let Some(commands) = canonical
            .get_mut("invoker")
            .and_then(|invoker| invoker.get_mut("commands"))
            && let Some(map) = commands.as_object()
        {
            let sorted: std::collections::BTreeMap<_, _> = map.clone().into_iter().collect();
            *commands = serde_json::to_value(sorted)?;
        }
        let canonical = serde_json::to_string(&canonical)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Catalog described by the `[catalog]` section.
    pub fn build_catalog(&self) -> Result<Catalog> {
        let parsers = if self.catalog.parsers.is_empty() {
            builtin::parsers()
        } else {
            self.catalog.parsers.clone()
        };
        Catalog::new(self.catalog.reference.clone(), parsers)
    }

    /// Comparator with the built-in table plus `[[compare.rules]]`.
    pub fn build_comparator(&self) -> Result<Comparator> {
        Comparator::with_extra_rules(&self.compare.rules)
    }

    /// Invoker selected by `[invoker].mode`.
    #[must_use]
    pub fn build_invoker(&self) -> Arc<dyn ParserInvoker> {
        match self.invoker.mode {
            InvokerMode::Command => {
                let mut invoker =
                    CommandInvoker::new(self.invoker.command_template.clone(), self.invoker.timeout());
                for (id, argv) in &self.invoker.commands {
                    invoker = invoker.with_override(id.clone(), argv.clone());
                }
                Arc::new(invoker)
            }
            InvokerMode::Sandbox => Arc::new(SandboxInvoker::new(
                self.invoker.sandbox_url.clone(),
                self.invoker.sandbox_version.clone(),
                self.invoker.timeout(),
            )),
        }
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // paths
        if let Some(raw) = lookup("YP_PATHS_CACHE_DIR") {
            self.paths.cache_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("YP_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("YP_PATHS_SUITE_FILE") {
            self.paths.suite_file = PathBuf::from(raw);
        }

        // invoker
        if let Some(raw) = lookup("YP_INVOKER_MODE") {
            self.invoker.mode = raw.parse().map_err(|details: String| ParityError::ConfigParse {
                context: "env",
                details: format!("YP_INVOKER_MODE={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("YP_INVOKER_COMMAND_TEMPLATE") {
            self.invoker.command_template = raw;
        }
        if let Some(raw) = lookup("YP_INVOKER_SANDBOX_URL") {
            self.invoker.sandbox_url = raw;
        }
        if let Some(raw) = lookup("YP_INVOKER_SANDBOX_VERSION") {
            self.invoker.sandbox_version = raw;
        }
        if let Some(raw) = lookup("YP_INVOKER_TIMEOUT_MS") {
            self.invoker.timeout_ms = parse_env_u64("YP_INVOKER_TIMEOUT_MS", &raw)?;
        }

        // live
        if let Some(raw) = lookup("YP_LIVE_DEBOUNCE_MS") {
            self.live.debounce_ms = parse_env_u64("YP_LIVE_DEBOUNCE_MS", &raw)?;
        }
        if let Some(raw) = lookup("YP_LIVE_POLL_INTERVAL_MS") {
            self.live.poll_interval_ms = parse_env_u64("YP_LIVE_POLL_INTERVAL_MS", &raw)?;
        }

        // catalog
        if let Some(raw) = lookup("YP_CATALOG_REFERENCE") {
            self.catalog.reference = raw;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.invoker.timeout_ms == 0 {
            return Err(ParityError::InvalidConfig {
                details: "invoker.timeout_ms must be > 0".to_string(),
            });
        }
        match self.invoker.mode {
            InvokerMode::Command => {
                if self.invoker.command_template.trim().is_empty() {
                    return Err(ParityError::InvalidConfig {
                        details: "invoker.command_template must not be empty in command mode"
                            .to_string(),
                    });
                }
                if let Some((id, _)) = self.invoker.commands.iter().find(|(_, argv)| argv.is_empty())
                {
                    return Err(ParityError::InvalidConfig {
                        details: format!("invoker.commands.{id} must name an executable"),
                    });
                }
            }
            InvokerMode::Sandbox => {
                let url = self.invoker.sandbox_url.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ParityError::InvalidConfig {
                        details: format!(
                            "invoker.sandbox_url must be an http(s) URL, got {url:?}"
                        ),
                    });
                }
                if self.invoker.sandbox_version.trim().is_empty() {
                    return Err(ParityError::InvalidConfig {
                        details: "invoker.sandbox_version must not be empty in sandbox mode"
                            .to_string(),
                    });
                }
            }
        }

        if self.live.poll_interval_ms == 0 {
            return Err(ParityError::InvalidConfig {
                details: "live.poll_interval_ms must be > 0".to_string(),
            });
        }
        if self.live.debounce_ms > 60_000 {
            return Err(ParityError::InvalidConfig {
                details: format!(
                    "live.debounce_ms must be <= 60000, got {}",
                    self.live.debounce_ms
                ),
            });
        }

        let catalog = self.build_catalog()?;
        for id in &self.live.parsers {
            catalog.require(id)?;
        }
        self.build_comparator()?;

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|error| ParityError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
