// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # haltwatch-test
//!
//! Verification harness for fatal-error containment.
//!
//! This crate provides:
//! - **Containment harness**: Runs a monitored call under an exit guard and
//!   judges whether it tried to terminate the process
//! - **Fatal workloads**: Task callbacks that raise classified fatal errors
//! - **Local-mode scenario**: The three-item linkage error regression check
//! - **Falsification tests**: Popperian tests for containment claims
//!
//! ## Iron Lotus Framework
//!
//! - **Built-in Quality** (品質の作り込み): Quality cannot be inspected in
//! - **Popperian Falsification**: Tests designed to refute claims
//! - **Genchi Genbutsu**: Verdicts come from recorded evidence
//!
//! ## Example
//!
//! ```rust
//! use haltwatch_test::{ContainmentHarness, LocalModeScenario};
//!
//! let harness = ContainmentHarness::builder().with_label("local-mode").build();
//! let report = LocalModeScenario::new().run(&harness).expect("no exit attempted");
//! assert_eq!(report.exit_attempts, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod harness;
pub mod report;
pub mod scenario;
pub mod workload;

pub use error::{Result, TestError};
pub use harness::{ContainmentHarness, ContainmentHarnessBuilder};
pub use report::{CheckItem, ContainmentReport, Observation};
pub use scenario::{LocalModeScenario, SCENARIO_APP_NAME, SCENARIO_ITEMS};
pub use workload::{FatalWorkload, RaiseStyle};

/// Installs a test-friendly `tracing` subscriber.
///
/// Honors `RUST_LOG` and falls back to `info`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
