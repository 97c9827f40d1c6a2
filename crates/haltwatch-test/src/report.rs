//! Containment observations and reports.
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! The verdict is derived from recorded evidence, not from which error
//! happened to surface.

use std::any::Any;
use std::error::Error;
use std::time::Duration;

use haltwatch_core::{ExitAttempt, ExitDenied};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TestError};

/// What the monitored call did, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    /// The call returned `Ok`.
    Completed,
    /// The guard's exit denial escaped the call.
    GuardIntercepted {
        /// Status of the escaped exit request.
        status: i32,
    },
    /// The call returned an error (e.g. a job aborted by a fatal task error).
    SubsystemFailure {
        /// Top-level error message.
        message: String,
        /// Messages of the error's source chain, outermost first.
        chain: Vec<String>,
    },
    /// The call unwound with a payload other than an exit denial.
    Panicked {
        /// Panic message, when the payload is a string.
        message: String,
    },
}

impl Observation {
    /// Classifies the outcome of a monitored call run under `catch_unwind`.
    pub fn classify<T, E>(outcome: std::thread::Result<std::result::Result<T, E>>) -> Self
    where
        E: Error + 'static,
    {
        match outcome {
            Ok(Ok(_)) => Self::Completed,
            Ok(Err(err)) => Self::from_error(&err),
            Err(payload) => Self::from_panic(payload.as_ref()),
        }
    }

    fn from_error(err: &(dyn Error + 'static)) -> Self {
        if let Some(denied) = err.downcast_ref::<ExitDenied>() {
            return Self::GuardIntercepted {
                status: denied.status,
            };
        }

        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self::SubsystemFailure {
            message: err.to_string(),
            chain,
        }
    }

    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(denied) = payload.downcast_ref::<ExitDenied>() {
            Self::GuardIntercepted {
                status: denied.status,
            }
        } else if let Some(msg) = payload.downcast_ref::<&str>() {
            Self::Panicked {
                message: (*msg).to_string(),
            }
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            Self::Panicked {
                message: msg.clone(),
            }
        } else {
            Self::Panicked {
                message: "Box<dyn Any>".to_string(),
            }
        }
    }

    /// Returns true if the guard's denial escaped.
    #[must_use]
    pub const fn is_guard_intercepted(&self) -> bool {
        matches!(self, Self::GuardIntercepted { .. })
    }
}

/// A single check item in the report evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    /// Check name.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional message.
    pub message: Option<String>,
}

/// Evidence gathered from one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainmentReport {
    /// Harness label.
    pub label: String,
    /// Classified outcome of the monitored call.
    pub observation: Observation,
    /// Exit attempts intercepted by the guard.
    pub exit_attempts: u64,
    /// First intercepted attempt.
    pub first_attempt: Option<ExitAttempt>,
    /// Whether the authority after the run is the one before it.
    pub authority_restored: bool,
    /// Wall-clock duration of the monitored call.
    pub elapsed: Duration,
    /// Individual checks, in evaluation order.
    pub checks: Vec<CheckItem>,
}

impl ContainmentReport {
    pub(crate) fn new(
        label: String,
        observation: Observation,
        exit_attempts: u64,
        first_attempt: Option<ExitAttempt>,
        authority_restored: bool,
        elapsed: Duration,
    ) -> Self {
        let mut report = Self {
            label,
            observation,
            exit_attempts,
            first_attempt,
            authority_restored,
            elapsed,
            checks: Vec::new(),
        };
        report.checks = report.evaluate();
        report
    }

    fn evaluate(&self) -> Vec<CheckItem> {
        let escaped = match &self.observation {
            Observation::GuardIntercepted { status } => Some(format!(
                "exit denial with status {status} escaped the monitored call"
            )),
            _ => None,
        };

        vec![
            CheckItem {
                name: "no_escaped_exit".to_string(),
                passed: escaped.is_none(),
                message: escaped,
            },
            CheckItem {
                name: "no_recorded_exit".to_string(),
                passed: self.first_attempt.is_none(),
                message: self.first_attempt.as_ref().map(|a| a.to_string()),
            },
            CheckItem {
                name: "authority_restored".to_string(),
                passed: self.authority_restored,
                message: None,
            },
        ]
    }

    /// Returns true if every check passed.
    #[must_use]
    pub fn contained(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    /// Judges the evidence.
    ///
    /// An escaped denial fails first; a recorded attempt fails even when
    /// nothing escaped; a missing restoration fails last.
    ///
    /// # Errors
    /// Returns the first failed check as a [`TestError`].
    pub fn verdict(&self) -> Result<()> {
        if let Observation::GuardIntercepted { status } = self.observation {
            return Err(TestError::ExitEscaped {
                denied: ExitDenied::new(status),
                attempt: self.first_attempt.clone(),
            });
        }

        if let Some(attempt) = &self.first_attempt {
            return Err(TestError::ExitAttempted {
                attempt: attempt.clone(),
                attempts: self.exit_attempts,
            });
        }

        if !self.authority_restored {
            return Err(TestError::assertion(
                "process-wide authority differs from the one before the run",
            ));
        }

        Ok(())
    }

    /// Consumes the report, returning it only if the verdict passes.
    ///
    /// # Errors
    /// Returns the first failed check as a [`TestError`].
    pub fn into_verdict(self) -> Result<Self> {
        self.verdict()?;
        Ok(self)
    }
}
