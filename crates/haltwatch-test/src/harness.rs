//! Exit-interception test harness.
//!
//! # Toyota Way: Built-in Quality (品質の作り込み)
//! Quality cannot be inspected in; it must be built in.
//!
//! The harness installs an [`ExitGuard`], runs the monitored call, restores
//! the previous authority on every exit path, and only then judges the
//! evidence.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use haltwatch_core::{ExitGuard, current_authority, lock_authority, same_authority};

use crate::error::Result;
use crate::report::{ContainmentReport, Observation};

/// Test harness that detects process exit attempts made by a monitored call.
#[derive(Debug, Clone)]
pub struct ContainmentHarness {
    label: String,
    guard_name: String,
}

impl ContainmentHarness {
    /// Creates a new test harness builder.
    #[must_use]
    pub fn builder() -> ContainmentHarnessBuilder {
        ContainmentHarnessBuilder::default()
    }

    /// Creates a new test harness with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns the harness label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs `monitored` under a fresh exit guard and returns the evidence,
    /// whatever it shows.
    ///
    /// Errors returned by `monitored` and panics unwinding out of it are
    /// classified into the report, never propagated.
    ///
    /// # Errors
    /// Returns an error only if the guard cannot be installed.
    pub fn observe<T, E, F>(&self, monitored: F) -> Result<ContainmentReport>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error + 'static,
    {
        // Held across the whole run so `before` and `after` are comparable.
        let _exclusive = lock_authority();
        let before = current_authority();

        let guard = ExitGuard::named(self.guard_name.clone());
        let scope = guard.install()?;

        tracing::info!(harness = %self.label, "running monitored call");
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(monitored));
        let elapsed = started.elapsed();

        let observation = Observation::classify(outcome);
        let first_attempt = scope.uninstall();

        let after = current_authority();
        let authority_restored = match (&before, &after) {
            (None, None) => true,
            (Some(before), Some(after)) => same_authority(before, after),
            _ => false,
        };

        let report = ContainmentReport::new(
            self.label.clone(),
            observation,
            guard.attempt_count(),
            first_attempt,
            authority_restored,
            elapsed,
        );

        if report.contained() {
            tracing::info!(harness = %self.label, observation = ?report.observation, "exit contained");
        } else {
            tracing::warn!(
                harness = %self.label,
                observation = ?report.observation,
                attempts = report.exit_attempts,
                "containment check failed"
            );
        }

        Ok(report)
    }

    /// Runs `monitored` and fails if it escaped or attempted a process exit.
    ///
    /// # Errors
    /// Returns [`crate::TestError::ExitEscaped`] if the guard's denial
    /// escaped the call, [`crate::TestError::ExitAttempted`] if the guard
    /// recorded any attempt, or a guard installation error.
    pub fn run<T, E, F>(&self, monitored: F) -> Result<ContainmentReport>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error + 'static,
    {
        self.observe(monitored)?.into_verdict()
    }
}

impl Default for ContainmentHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ContainmentHarness`].
#[derive(Debug, Default)]
pub struct ContainmentHarnessBuilder {
    label: Option<String>,
    guard_name: Option<String>,
}

impl ContainmentHarnessBuilder {
    /// Sets the label used in logs and reports.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the name of the installed guard.
    #[must_use]
    pub fn with_guard_name(mut self, name: impl Into<String>) -> Self {
        self.guard_name = Some(name.into());
        self
    }

    /// Builds the test harness.
    #[must_use]
    pub fn build(self) -> ContainmentHarness {
        ContainmentHarness {
            label: self.label.unwrap_or_else(|| "containment".to_string()),
            guard_name: self.guard_name.unwrap_or_else(|| "no-exit-guard".to_string()),
        }
    }
}
