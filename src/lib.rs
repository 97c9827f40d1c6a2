//! Haltwatch: Fatal-Error Containment Verification
//!
//! Part of the PAIML Sovereign AI Stack.
//!
//! Runs a data-processing job under a process-wide exit guard and fails the
//! run if anything inside the job tried to terminate the process.
//!
//! # Quick Start
//!
//! ```rust
//! use haltwatch::prelude::*;
//!
//! let harness = ContainmentHarness::new();
//! let report = LocalModeScenario::new().run(&harness).expect("contained");
//! assert!(report.contained());
//! ```

pub use haltwatch_core as core;
pub use haltwatch_engine as engine;
pub use haltwatch_test as test;

/// Prelude module for common imports.
pub mod prelude {
    pub use haltwatch_core::{
        Authority, ExitAttempt, ExitDenied, ExitGuard, GuardError, InstalledGuard, exit,
    };
    pub use haltwatch_engine::{
        Dataset, EngineConfig, EngineError, FatalError, FatalErrorPolicy, FatalKind, LocalContext,
        TaskError, TaskFailure,
    };
    pub use haltwatch_test::{
        ContainmentHarness, ContainmentReport, FatalWorkload, LocalModeScenario, Observation,
        RaiseStyle, TestError,
    };
}
