//! Test error types.

use haltwatch_core::{ExitAttempt, ExitDenied};

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Testing errors.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The guard's exit denial escaped the monitored call.
    #[error("caught exit denial escaping the monitored call: {denied}")]
    ExitEscaped {
        /// The escaped denial.
        denied: ExitDenied,
        /// First attempt recorded by the guard.
        attempt: Option<ExitAttempt>,
    },

    /// The guard recorded an exit attempt during the monitored call.
    #[error("exit guard captured a process exit attempt ({attempts} in total), first: {attempt}")]
    ExitAttempted {
        /// First recorded attempt.
        attempt: ExitAttempt,
        /// All attempts seen by the guard.
        attempts: u64,
    },

    /// Assertion failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Guard installation error.
    #[error("guard error: {0}")]
    Guard(#[from] haltwatch_core::GuardError),

    /// Engine configuration rejected before the monitored call.
    #[error("engine error: {0}")]
    Engine(#[from] haltwatch_engine::EngineError),
}

impl TestError {
    /// Creates an assertion error.
    #[must_use]
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }

    /// Returns true if the error reports a process exit attempt.
    #[must_use]
    pub const fn is_exit_attempt(&self) -> bool {
        matches!(self, Self::ExitEscaped { .. } | Self::ExitAttempted { .. })
    }
}
