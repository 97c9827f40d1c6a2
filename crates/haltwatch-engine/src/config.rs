//! Engine configuration.
//!
//! Per Iron Lotus Framework: Configuration is validated at load time (Poka-Yoke),
//! with sensible defaults and clear error messages.

use std::str::FromStr;
use std::time::Duration;

use haltwatch_core::EXIT_UNCAUGHT_EXCEPTION;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// What a worker does after a task raises a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FatalErrorPolicy {
    /// Abort the job and surface the fatal error to the caller.
    #[default]
    Propagate,
    /// Ask the process to exit with `status`, then abort the job.
    ///
    /// This is how a standalone executor behaves. In a single-process engine
    /// it would take the caller's process down with it.
    ExitProcess {
        /// Exit status passed to `haltwatch_core::exit`.
        #[serde(default = "default_exit_status")]
        status: i32,
    },
}

const fn default_exit_status() -> i32 {
    EXIT_UNCAUGHT_EXCEPTION
}

impl FatalErrorPolicy {
    /// Exit-process policy with the conventional uncaught-error status.
    #[must_use]
    pub const fn exit_process() -> Self {
        Self::ExitProcess {
            status: EXIT_UNCAUGHT_EXCEPTION,
        }
    }
}

/// Parsed single-process master URL.
///
/// | URL | Workers | Attempts per task |
/// |-----|---------|-------------------|
/// | `local` | 1 | 1 |
/// | `local[N]` | N | 1 |
/// | `local[*]` | available parallelism | 1 |
/// | `local[N,F]` | N | F |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Master {
    /// Worker threads.
    pub threads: usize,
    /// Attempts allowed per task before the job aborts.
    pub max_failures: u32,
}

impl Master {
    /// Parses a master URL.
    ///
    /// # Errors
    /// Returns an error for anything other than a `local` URL.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == "local" {
            return Ok(Self {
                threads: 1,
                max_failures: 1,
            });
        }

        let inner = url
            .strip_prefix("local[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                EngineError::config(format!(
                    "unsupported master URL '{url}': only single-process local modes are available"
                ))
            })?;

        let (threads, failures) = match inner.split_once(',') {
            Some((threads, failures)) => (threads.trim(), Some(failures.trim())),
            None => (inner.trim(), None),
        };

        let threads = if threads == "*" {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            threads
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    EngineError::config(format!("invalid worker count '{threads}' in '{url}'"))
                })?
        };

        let max_failures = match failures {
            Some(failures) => failures
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    EngineError::config(format!("invalid max failures '{failures}' in '{url}'"))
                })?,
            None => 1,
        };

        Ok(Self {
            threads,
            max_failures,
        })
    }
}

impl FromStr for Master {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Application name (used for worker thread names and logs).
    pub app_name: String,

    /// Master URL, see [`Master`].
    #[serde(default = "default_master")]
    pub master: String,

    /// Behavior after a fatal task error.
    #[serde(default)]
    pub fatal_policy: FatalErrorPolicy,

    /// Partitions created by `parallelize` (defaults to the worker count).
    #[serde(default)]
    pub default_parallelism: Option<usize>,

    /// Time allowed for workers to finish when the context stops
    /// (humantime format, e.g. `"5s"`).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

fn default_master() -> String {
    "local".to_string()
}

fn default_shutdown_timeout() -> String {
    "10s".to_string()
}

impl EngineConfig {
    /// Creates a configuration for `local` mode.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            master: default_master(),
            fatal_policy: FatalErrorPolicy::default(),
            default_parallelism: None,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }

    /// Sets the application name.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Sets the master URL.
    #[must_use]
    pub fn with_master(mut self, master: impl Into<String>) -> Self {
        self.master = master.into();
        self
    }

    /// Sets the fatal error policy.
    #[must_use]
    pub const fn with_fatal_policy(mut self, policy: FatalErrorPolicy) -> Self {
        self.fatal_policy = policy;
        self
    }

    /// Sets the default number of partitions.
    #[must_use]
    pub const fn with_default_parallelism(mut self, partitions: usize) -> Self {
        self.default_parallelism = Some(partitions);
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = humantime::format_duration(timeout).to_string();
        self
    }

    /// Returns the parsed master URL.
    ///
    /// # Errors
    /// Returns an error if the master URL is invalid.
    pub fn master(&self) -> Result<Master> {
        Master::parse(&self.master)
    }

    /// Returns the parsed shutdown timeout.
    ///
    /// # Errors
    /// Returns an error if the timeout is not a valid humantime duration.
    pub fn shutdown_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.shutdown_timeout).map_err(|e| {
            EngineError::config(format!(
                "invalid shutdown_timeout '{}': {e}",
                self.shutdown_timeout
            ))
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(EngineError::config("app_name cannot be empty"));
        }

        self.master()?;
        self.shutdown_timeout()?;

        if self.default_parallelism == Some(0) {
            return Err(EngineError::config("default_parallelism must be at least 1"));
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::config(format!("failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text cannot be parsed or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EngineError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
