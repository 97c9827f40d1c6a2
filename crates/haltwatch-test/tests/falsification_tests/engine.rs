//! Falsification Tests: Category B - Local Engine (F011-F020)
//!
//! # Toyota Way: Jidoka (自働化)
//! A fatal task failure stops the job, never the process.

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use haltwatch_engine::{
    EngineConfig, EngineError, FatalError, FatalErrorPolicy, FatalKind, LocalContext, Master,
    TaskError, TaskFailure,
};
use haltwatch_test::{FatalWorkload, RaiseStyle};

fn context(master: &str) -> LocalContext {
    LocalContext::new(EngineConfig::new("falsification-engine").with_master(master))
        .expect("context")
}

// =============================================================================
// F011-F013: Master URLs and Partitioning
// =============================================================================

/// F011: Master URLs map to worker threads and attempt budgets
///
/// # Falsification Attempt
/// Parse every supported form and a set of unsupported ones.
#[test]
fn f011_master_urls_parse() {
    let cases = [
        ("local", 1, 1),
        ("local[3]", 3, 1),
        ("local[2,4]", 2, 4),
    ];
    for (url, threads, max_failures) in cases {
        let master = Master::parse(url).expect("supported");
        assert_eq!(
            master,
            Master {
                threads,
                max_failures
            },
            "F011 FALSIFIED: {url} parsed as {master:?}"
        );
    }

    for url in ["yarn", "cluster://host:7077", "local[0]", "local[1,0]"] {
        assert!(Master::parse(url).is_err(), "F011 FALSIFIED: {url} accepted");
    }
}

/// F012: Partitioning preserves item order
///
/// # Falsification Attempt
/// Collect 100 items over 7 partitions on 4 workers.
#[test]
fn f012_collect_preserves_order() {
    let ctx = context("local[4]");
    let items: Vec<u32> = (0..100).collect();
    let dataset = ctx.parallelize_with_slices(items.clone(), 7).expect("dataset");

    assert_eq!(dataset.num_partitions(), 7);
    assert_eq!(
        dataset.collect().expect("collect"),
        items,
        "F012 FALSIFIED: collected order differs from input"
    );
    assert_eq!(dataset.count().expect("count"), 100);
}

/// F013: The three scenario items split as [One] [Two, Three] over two slices
///
/// # Falsification Attempt
/// Inspect the partitions directly.
#[test]
fn f013_three_items_two_slices() {
    let ctx = context("local[2]");
    let dataset = ctx
        .parallelize_with_slices(["One", "Two", "Three"], 2)
        .expect("dataset");
    let partitions: Vec<Vec<&str>> = dataset.partitions().map(<[&str]>::to_vec).collect();

    assert_eq!(partitions, vec![vec!["One"], vec!["Two", "Three"]]);
}

// =============================================================================
// F014-F017: Failure Handling
// =============================================================================

/// F014: A fatal error is never retried, whatever the attempt budget
///
/// # Falsification Attempt
/// Allow four attempts per task and count injections.
#[test]
fn f014_fatal_error_not_retried() {
    let ctx = context("local[2,4]");
    let workload = FatalWorkload::linkage().on_item("Two".to_string());
    let dataset = ctx
        .parallelize(["One", "Two", "Three"].map(String::from))
        .expect("dataset");

    let err = dataset.foreach(workload.task()).expect_err("aborted");

    assert_eq!(workload.injections(), 1, "F014 FALSIFIED: fatal task retried");
    match err {
        EngineError::JobAborted { attempts, cause, .. } => {
            assert_eq!(attempts, 1);
            assert_eq!(cause.fatal().map(|f| f.kind), Some(FatalKind::Linkage));
        }
        other => panic!("F014 FALSIFIED: unexpected error {other}"),
    }
}

/// F015: A recoverable error is retried up to the budget and no further
///
/// # Falsification Attempt
/// Fail every attempt under `local[1,3]`.
#[test]
fn f015_recoverable_error_retried_to_budget() {
    let ctx = context("local[1,3]");
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    let dataset = ctx.parallelize(vec![1]).expect("dataset");

    let err = dataset
        .foreach(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::recoverable("flaky disk"))
        })
        .expect_err("aborted");

    assert_eq!(calls.load(Ordering::SeqCst), 3, "F015 FALSIFIED: wrong retry count");
    assert!(err.is_recoverable());
}

/// F016: The fatal error is reachable through the aborted job's source chain
///
/// # Falsification Attempt
/// Walk `source()` until the fatal error is found.
#[test]
fn f016_fatal_error_in_source_chain() {
    let ctx = context("local");
    let dataset = ctx.parallelize(["One", "Two", "Three"]).expect("dataset");

    let err = dataset
        .foreach(|item| {
            if *item == "Two" {
                return Err(FatalError::linkage("fake missing definition").into());
            }
            Ok(())
        })
        .expect_err("aborted");

    let mut source = err.source();
    let mut found = false;
    while let Some(cause) = source {
        if cause.downcast_ref::<FatalError>().is_some() {
            found = true;
        }
        source = cause.source();
    }
    assert!(found, "F016 FALSIFIED: fatal error missing from chain of {err}");
}

/// F017: A context survives a failed job
///
/// # Falsification Attempt
/// Abort a job, then run another on the same context.
#[test]
fn f017_context_survives_failed_job() {
    let ctx = context("local[2]");
    let dataset = ctx.parallelize(0..10u32).expect("dataset");

    assert!(dataset
        .foreach(|_| Err(FatalError::stack_overflow("deep recursion").into()))
        .is_err());
    assert_eq!(
        dataset.count().expect("F017 FALSIFIED: context unusable after failure"),
        10
    );
}

// =============================================================================
// F018-F020: Classification and Configuration
// =============================================================================

/// F018: A fatal error raised by panic is classified as fatal
///
/// # Falsification Attempt
/// Raise every fatal kind as a panic payload.
#[test]
fn f018_panic_raised_fatal_is_classified() {
    let ctx = context("local[1,2]");
    for kind in [
        FatalKind::VirtualMachine,
        FatalKind::ThreadDeath,
        FatalKind::Interrupted,
        FatalKind::Linkage,
        FatalKind::Control,
    ] {
        let workload = FatalWorkload::new(kind, "raised").raising(RaiseStyle::Panic);
        let err = ctx
            .parallelize(vec![1u8])
            .expect("dataset")
            .foreach(workload.task())
            .expect_err("aborted");

        assert_eq!(
            err.task_failure(),
            Some(&TaskFailure::Fatal(FatalError::new(kind, "raised"))),
            "F018 FALSIFIED: {kind} misclassified"
        );
        assert_eq!(workload.injections(), 1);
    }
}

/// F019: A plain panic is contained and classified as a panic
///
/// # Falsification Attempt
/// Panic with a string payload inside a task.
#[test]
fn f019_plain_panic_contained() {
    let ctx = context("local");
    let err = ctx
        .parallelize(vec![1u8])
        .expect("dataset")
        .foreach(|_| -> Result<(), TaskError> { panic!("index out of bounds") })
        .expect_err("aborted");

    assert_eq!(
        err.task_failure(),
        Some(&TaskFailure::Panicked("index out of bounds".into())),
        "F019 FALSIFIED: panic escaped or misclassified"
    );
}

/// F020: TOML configuration selects the fatal error policy
///
/// # Falsification Attempt
/// Load an exit-process policy with a custom status.
#[test]
fn f020_toml_selects_policy() {
    let config = EngineConfig::from_toml(
        r#"
        app_name = "f020"
        master = "local[2]"
        shutdown_timeout = "250ms"

        [fatal_policy]
        action = "exit_process"
        status = 3
        "#,
    )
    .expect("valid");

    assert_eq!(
        config.fatal_policy,
        FatalErrorPolicy::ExitProcess { status: 3 },
        "F020 FALSIFIED: policy not loaded"
    );
    assert_eq!(
        config.shutdown_timeout().expect("valid"),
        std::time::Duration::from_millis(250)
    );
}
