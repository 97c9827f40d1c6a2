// Examples are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Fatal-Error Containment Example
//!
//! Runs the local-mode scenario under the exit guard and prints the report.
//!
//! # Usage
//!
//! ```bash
//! # Default engine: the linkage error reaches the caller
//! cargo run --example containment
//!
//! # Use a different master URL
//! cargo run --example containment -- --master "local[4]"
//!
//! # Engine that exits on fatal errors: the harness reports the attempt
//! cargo run --example containment -- --exit-process
//! ```

use haltwatch_engine::{EngineConfig, FatalErrorPolicy};
use haltwatch_test::{ContainmentHarness, LocalModeScenario, SCENARIO_APP_NAME};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: containment [--master URL] [--exit-process]");
        return;
    }

    let master = args
        .iter()
        .position(|a| a == "--master")
        .and_then(|i| args.get(i + 1))
        .map_or("local", String::as_str);

    let mut config = EngineConfig::new(SCENARIO_APP_NAME).with_master(master);
    if args.iter().any(|a| a == "--exit-process") {
        config = config.with_fatal_policy(FatalErrorPolicy::exit_process());
    }

    let harness = ContainmentHarness::builder()
        .with_label("containment-demo")
        .build();
    let report = LocalModeScenario::new()
        .with_config(config)
        .observe(&harness)
        .expect("guard installs");

    println!(
        "{}",
        serde_json::to_string_pretty(&report).expect("report serializes")
    );

    match report.verdict() {
        Ok(()) => tracing::info!("fatal error contained, process exit never attempted"),
        Err(err) => {
            tracing::error!(%err, "containment failed");
            std::process::exit(1);
        }
    }
}
