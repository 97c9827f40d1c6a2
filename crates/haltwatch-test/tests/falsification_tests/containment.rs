//! Falsification Tests: Category C - Fatal Error Containment (F021-F032)
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! Judge containment from the guard's evidence, not from which error surfaced.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use haltwatch_core::{
    Authority, EXIT_UNCAUGHT_EXCEPTION, ExitGuard, current_authority, lock_authority,
    same_authority,
};
use haltwatch_engine::{EngineConfig, EngineError, FatalErrorPolicy, FatalKind, LocalContext};
use haltwatch_test::{
    ContainmentHarness, FatalWorkload, LocalModeScenario, Observation, RaiseStyle,
    SCENARIO_APP_NAME, TestError, init_tracing,
};
use proptest::prelude::*;

const ALL_KINDS: [FatalKind; 5] = [
    FatalKind::VirtualMachine,
    FatalKind::ThreadDeath,
    FatalKind::Interrupted,
    FatalKind::Linkage,
    FatalKind::Control,
];

fn harness(label: &str) -> ContainmentHarness {
    init_tracing();
    ContainmentHarness::builder().with_label(label).build()
}

// =============================================================================
// F021-F024: The Local-Mode Scenario
// =============================================================================

/// F021: A linkage error on "Two" under `local` never attempts a process exit
///
/// # Falsification Attempt
/// Run the canonical scenario; any recorded or escaped exit falsifies the claim.
#[test]
fn f021_canonical_scenario_contained() {
    let scenario = LocalModeScenario::new();
    let result = scenario.run(&harness("f021"));

    let report = result.unwrap_or_else(|e| panic!("F021 FALSIFIED: {e}"));
    assert_eq!(report.exit_attempts, 0);
    assert!(report.first_attempt.is_none());
    assert!(report.authority_restored);
    assert!(report.contained());
}

/// F022: The scenario's failure surfaces as a subsystem error naming the cause
///
/// # Falsification Attempt
/// Inspect the classified observation.
#[test]
fn f022_failure_surfaces_as_subsystem_error() {
    let report = LocalModeScenario::new()
        .observe(&harness("f022"))
        .expect("observe");

    match report.observation {
        Observation::SubsystemFailure { message, chain } => {
            assert!(message.contains("aborted"), "F022 FALSIFIED: {message}");
            assert!(
                chain.iter().any(|c| c.contains("linkage error: fake missing definition")),
                "F022 FALSIFIED: cause missing from {chain:?}"
            );
        }
        other => panic!("F022 FALSIFIED: unexpected observation {other:?}"),
    }
}

/// F023: Every fatal kind, returned or panicked, is contained on several workers
///
/// # Falsification Attempt
/// Cross all five kinds with both raise styles under `local[3]`.
#[test]
fn f023_every_fatal_kind_contained() {
    for kind in ALL_KINDS {
        for style in [RaiseStyle::Return, RaiseStyle::Panic] {
            let workload = FatalWorkload::new(kind, "injected")
                .on_item("Two".to_string())
                .raising(style);
            let scenario = LocalModeScenario::new()
                .with_config(EngineConfig::new(SCENARIO_APP_NAME).with_master("local[3]"))
                .with_workload(workload.clone());

            let report = scenario
                .run(&harness("f023"))
                .unwrap_or_else(|e| panic!("F023 FALSIFIED for {kind} / {style:?}: {e}"));
            assert!(matches!(
                report.observation,
                Observation::SubsystemFailure { .. }
            ));
            assert_eq!(workload.injections(), 1);
        }
    }
}

/// F024: The verdict does not depend on the attempt budget
///
/// # Falsification Attempt
/// Repeat the scenario with a generous retry budget.
#[test]
fn f024_contained_with_retry_budget() {
    let scenario = LocalModeScenario::new()
        .with_config(EngineConfig::new(SCENARIO_APP_NAME).with_master("local[2,4]"));

    assert!(
        scenario.run(&harness("f024")).is_ok(),
        "F024 FALSIFIED: retries produced an exit attempt"
    );
    assert_eq!(scenario.workload().injections(), 1);
}

// =============================================================================
// F025-F028: Regression Guard
// =============================================================================

/// F025: An engine that exits on fatal errors is caught even though it
/// swallows the denial
///
/// # Falsification Attempt
/// Enable the exit-process policy; the harness must still fail the run.
#[test]
fn f025_exit_process_policy_detected() {
    let scenario = LocalModeScenario::new().with_config(
        EngineConfig::new(SCENARIO_APP_NAME).with_fatal_policy(FatalErrorPolicy::exit_process()),
    );

    let err = scenario
        .run(&harness("f025"))
        .expect_err("F025 FALSIFIED: exit attempt went unnoticed");

    match err {
        TestError::ExitAttempted { attempt, attempts } => {
            assert_eq!(attempt.status, EXIT_UNCAUGHT_EXCEPTION);
            assert_eq!(attempts, 1);
        }
        other => panic!("F025 FALSIFIED: unexpected error {other}"),
    }
}

/// F026: The swallowed attempt is visible in the report evidence
///
/// # Falsification Attempt
/// Observe instead of judging and inspect the checks.
#[test]
fn f026_swallowed_attempt_in_evidence() {
    let scenario = LocalModeScenario::new().with_config(
        EngineConfig::new(SCENARIO_APP_NAME)
            .with_fatal_policy(FatalErrorPolicy::ExitProcess { status: 3 }),
    );
    let report = scenario.observe(&harness("f026")).expect("observe");

    assert!(!report.contained());
    assert!(!report.observation.is_guard_intercepted());
    let failed: Vec<&str> = report
        .checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(failed, vec!["no_recorded_exit"], "F026 FALSIFIED: {failed:?}");
    assert_eq!(report.first_attempt.map(|a| a.status), Some(3));
}

/// F027: An exit on the harness thread escapes and fails the run
///
/// # Falsification Attempt
/// Call `exit` directly from the monitored call.
#[test]
fn f027_exit_on_harness_thread_escapes() {
    let err = harness("f027")
        .run(|| -> Result<(), EngineError> { haltwatch_core::exit(1) })
        .expect_err("F027 FALSIFIED: escaped exit went unnoticed");

    match err {
        TestError::ExitEscaped { denied, attempt } => {
            assert_eq!(denied.status, 1);
            assert_eq!(attempt.map(|a| a.status), Some(1));
        }
        other => panic!("F027 FALSIFIED: unexpected error {other}"),
    }
}

/// F028: An exit from a worker thread started by the monitored call is recorded
///
/// # Falsification Attempt
/// Exit from a task on the engine's own runtime threads.
#[test]
fn f028_exit_from_engine_worker_recorded() {
    let err = harness("f028")
        .run(|| {
            let ctx = LocalContext::new(EngineConfig::new("f028").with_master("local[2]"))?;
            let dataset = ctx.parallelize(vec![1, 2])?;
            dataset.foreach(|item| {
                if *item == 2 {
                    haltwatch_core::exit(9);
                }
                Ok(())
            })
        })
        .expect_err("F028 FALSIFIED: worker exit went unnoticed");

    assert!(
        matches!(err, TestError::ExitAttempted { ref attempt, .. } if attempt.status == 9),
        "F028 FALSIFIED: {err}"
    );
}

// =============================================================================
// F029-F032: Authority Restoration
// =============================================================================

/// F029: The authority is restored even when the monitored call panics
///
/// # Falsification Attempt
/// Run under an outer guard and panic inside the harness.
#[test]
fn f029_authority_restored_after_panic() {
    let _lock = lock_authority();
    let outer = ExitGuard::named("f029-outer");
    let outer_scope = outer.install().expect("outer");

    let report = harness("f029")
        .run(|| -> Result<(), EngineError> { panic!("monitored call blew up") })
        .expect("a plain panic is contained");

    assert!(report.authority_restored);
    let outer_authority: Arc<dyn Authority> = Arc::clone(&outer) as Arc<dyn Authority>;
    let current = current_authority().expect("outer still installed");
    assert!(
        same_authority(&current, &outer_authority),
        "F029 FALSIFIED: outer authority replaced"
    );
    assert_eq!(outer.attempt_count(), 0);
    drop(outer_scope);
}

/// F030: Running the harness twice leaves the authority where it started
///
/// # Falsification Attempt
/// Compare the authority before and after two consecutive runs.
#[test]
fn f030_repeated_runs_idempotent() {
    let _lock = lock_authority();
    let before = current_authority();
    let harness = harness("f030");

    for _ in 0..2 {
        assert!(LocalModeScenario::new().run(&harness).is_ok());
    }

    let after = current_authority();
    let restored = match (&before, &after) {
        (None, None) => true,
        (Some(a), Some(b)) => same_authority(a, b),
        _ => false,
    };
    assert!(restored, "F030 FALSIFIED: authority drifted across runs");
}

/// F031: A caught panic inside the harness does not leave the guard installed
///
/// # Falsification Attempt
/// Unwind out of the harness itself and check the registry.
#[test]
fn f031_no_guard_left_after_outer_unwind() {
    let _lock = lock_authority();
    let before = current_authority();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let report = harness("f031")
            .observe(|| -> Result<(), EngineError> { haltwatch_core::exit(2) })
            .expect("observe");
        assert!(report.authority_restored);
        panic!("unwinding past the harness");
    }));

    assert!(outcome.is_err());
    let after = current_authority();
    assert_eq!(
        before.is_some(),
        after.is_some(),
        "F031 FALSIFIED: guard left behind"
    );
}

/// F032: Report evidence serializes for CI artifacts
///
/// # Falsification Attempt
/// Serialize a report and read the tagged observation back.
#[test]
fn f032_report_serializes() {
    let report = LocalModeScenario::new()
        .run(&harness("f032"))
        .expect("contained");
    let json = serde_json::to_value(&report).expect("serialize");

    assert_eq!(json["observation"]["kind"], "subsystem_failure");
    assert_eq!(json["exit_attempts"], 0);
    assert_eq!(json["checks"].as_array().map(Vec::len), Some(3));
}

// =============================================================================
// Property: containment holds for any item list and target
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever the items and whichever one fails fatally, no exit is attempted.
    #[test]
    fn prop_any_target_is_contained(
        items in proptest::collection::vec("[a-z]{1,6}", 1..8),
        pick in any::<prop::sample::Index>(),
        threads in 1usize..4,
    ) {
        let target = items[pick.index(items.len())].clone();
        let workload = FatalWorkload::linkage().on_item(target);
        let scenario = LocalModeScenario::new()
            .with_config(EngineConfig::new(SCENARIO_APP_NAME).with_master(format!("local[{threads}]")))
            .with_items(items)
            .with_workload(workload);

        let report = scenario.run(&harness("prop")).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(report.exit_attempts, 0);
        prop_assert!(
            matches!(report.observation, Observation::SubsystemFailure { .. }),
            "observation was {:?}",
            report.observation
        );
    }
}
