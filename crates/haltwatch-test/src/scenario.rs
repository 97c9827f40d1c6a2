//! The local-mode fatal error scenario.
//!
//! Start a local context, distribute three strings, raise a linkage error
//! from the task processing `"Two"`, and check that the failure reaches the
//! caller as an error instead of a process exit.

use haltwatch_engine::{EngineConfig, LocalContext};

use crate::error::Result;
use crate::harness::ContainmentHarness;
use crate::report::ContainmentReport;
use crate::workload::FatalWorkload;

/// Application name used by the scenario's context.
pub const SCENARIO_APP_NAME: &str = "FatalErrorContainmentLocalMode";

/// Items distributed by the scenario.
pub const SCENARIO_ITEMS: [&str; 3] = ["One", "Two", "Three"];

/// A monitored call that runs one fatal workload on a fresh local context.
#[derive(Debug, Clone)]
pub struct LocalModeScenario {
    config: EngineConfig,
    items: Vec<String>,
    workload: FatalWorkload<String>,
}

impl LocalModeScenario {
    /// Creates the canonical scenario: master `local`, items
    /// `["One", "Two", "Three"]`, linkage error on `"Two"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::new(SCENARIO_APP_NAME),
            items: SCENARIO_ITEMS.iter().map(ToString::to_string).collect(),
            workload: FatalWorkload::linkage().on_item("Two".to_string()),
        }
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the injected workload.
    #[must_use]
    pub fn with_workload(mut self, workload: FatalWorkload<String>) -> Self {
        self.workload = workload;
        self
    }

    /// Replaces the distributed items.
    #[must_use]
    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = items.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the injected workload.
    #[must_use]
    pub const fn workload(&self) -> &FatalWorkload<String> {
        &self.workload
    }

    /// Runs the scenario under `harness` and returns the evidence.
    ///
    /// The context is created and stopped inside the monitored call, so
    /// worker start-up and shutdown are covered by the guard too.
    ///
    /// # Errors
    /// Returns [`crate::TestError::Engine`] if the configuration is invalid,
    /// or [`crate::TestError::Guard`] if the guard cannot be installed.
    pub fn observe(&self, harness: &ContainmentHarness) -> Result<ContainmentReport> {
        self.config.validate()?;

        harness.observe(|| {
            let ctx = LocalContext::new(self.config.clone())?;
            let dataset = ctx.parallelize(self.items.iter().cloned())?;
            dataset.foreach(self.workload.task())
        })
    }

    /// Runs the scenario under `harness` and judges it.
    ///
    /// # Errors
    /// Returns [`crate::TestError::ExitEscaped`] or
    /// [`crate::TestError::ExitAttempted`] if the engine tried to terminate
    /// the process.
    pub fn run(&self, harness: &ContainmentHarness) -> Result<ContainmentReport> {
        self.observe(harness)?.into_verdict()
    }
}

impl Default for LocalModeScenario {
    fn default() -> Self {
        Self::new()
    }
}
