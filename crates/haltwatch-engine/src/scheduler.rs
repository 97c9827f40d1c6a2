//! Task scheduling on the local worker runtime.
//!
//! One task per partition. Each task attempt runs the partition function
//! under `catch_unwind`, so nothing a task raises unwinds into the worker
//! runtime; failures are classified into [`TaskFailure`] at this boundary.
//!
//! # Toyota Way: Jidoka (自働化)
//! A fatal failure stops the job at once. Recoverable failures are retried
//! up to the master's attempt budget.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use haltwatch_core::ExitDenied;
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

use crate::config::FatalErrorPolicy;
use crate::error::{EngineError, Result, TaskError, TaskFailure};
use crate::types::{JobId, JobSummary};

/// Parameters shared by every task of a job.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JobSpec {
    pub job_id: JobId,
    pub max_failures: u32,
    pub policy: FatalErrorPolicy,
}

struct TaskSuccess<U> {
    value: U,
    attempts: u32,
}

struct TaskAbort {
    failure: TaskFailure,
    attempts: u32,
}

/// Runs `f` over every partition and returns the per-partition results in
/// partition order.
pub(crate) fn run_job<T, U, F>(
    runtime: &Runtime,
    spec: JobSpec,
    partitions: &[Arc<Vec<T>>],
    f: F,
) -> Result<(Vec<U>, JobSummary)>
where
    T: Send + Sync + 'static,
    U: Send + 'static,
    F: Fn(&[T]) -> std::result::Result<U, TaskError> + Send + Sync + 'static,
{
    let started = Instant::now();
    let f = Arc::new(f);
    let count = partitions.len();

    tracing::info!(
        job = %spec.job_id,
        partitions = count,
        max_failures = spec.max_failures,
        "starting job"
    );

    let (results, task_attempts) = runtime.block_on(async {
        let mut tasks = JoinSet::new();
        for (partition, items) in partitions.iter().enumerate() {
            let items = Arc::clone(items);
            let f = Arc::clone(&f);
            tasks.spawn(async move { (partition, run_task(spec, partition, &items, &*f)) });
        }

        let mut results: Vec<Option<U>> = (0..count).map(|_| None).collect();
        let mut task_attempts = 0u32;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((partition, Ok(success))) => {
                    task_attempts = task_attempts.saturating_add(success.attempts);
                    results[partition] = Some(success.value);
                }
                Ok((partition, Err(abort))) => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}

                    tracing::error!(
                        job = %spec.job_id,
                        partition,
                        attempts = abort.attempts,
                        failure = %abort.failure,
                        "job aborted"
                    );
                    return Err(EngineError::JobAborted {
                        job_id: spec.job_id,
                        partition,
                        attempts: abort.attempts,
                        cause: abort.failure,
                    });
                }
                Err(join_error) => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(EngineError::runtime(format!(
                        "task of job {} did not complete: {join_error}",
                        spec.job_id
                    )));
                }
            }
        }

        Ok((results, task_attempts))
    })?;

    let values = results
        .into_iter()
        .collect::<Option<Vec<U>>>()
        .ok_or_else(|| EngineError::runtime(format!("job {} lost a partition result", spec.job_id)))?;

    let summary = JobSummary {
        job_id: spec.job_id,
        partitions: count,
        task_attempts,
        elapsed: started.elapsed(),
    };

    tracing::info!(
        job = %spec.job_id,
        attempts = summary.task_attempts,
        elapsed = ?summary.elapsed,
        "job finished"
    );

    Ok((values, summary))
}

/// Runs one task to completion, retrying recoverable failures.
fn run_task<T, U, F>(
    spec: JobSpec,
    partition: usize,
    items: &[T],
    f: &F,
) -> std::result::Result<TaskSuccess<U>, TaskAbort>
where
    F: Fn(&[T]) -> std::result::Result<U, TaskError>,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        tracing::debug!(job = %spec.job_id, partition, attempt = attempts, "running task");

        let failure = match catch_unwind(AssertUnwindSafe(|| f(items))) {
            Ok(Ok(value)) => return Ok(TaskSuccess { value, attempts }),
            Ok(Err(err)) => TaskFailure::from(err),
            Err(payload) => TaskFailure::from_panic(payload.as_ref()),
        };

        tracing::warn!(
            job = %spec.job_id,
            partition,
            attempt = attempts,
            failure = %failure,
            "task failed"
        );

        if failure.is_fatal() {
            escalate_fatal(spec, partition);
            return Err(TaskAbort { failure, attempts });
        }

        if !failure.is_retryable() || attempts >= spec.max_failures {
            return Err(TaskAbort { failure, attempts });
        }
    }
}

/// Applies the fatal error policy after a task raised a fatal error.
fn escalate_fatal(spec: JobSpec, partition: usize) {
    let FatalErrorPolicy::ExitProcess { status } = spec.policy else {
        return;
    };

    tracing::error!(
        job = %spec.job_id,
        partition,
        status,
        "fatal error in task, terminating process"
    );

    // A refused exit unwinds; the task still reports its fatal failure.
    if let Err(payload) = catch_unwind(|| {
        haltwatch_core::exit(status);
    }) {
        match payload.downcast_ref::<ExitDenied>() {
            Some(denied) => {
                tracing::warn!(job = %spec.job_id, partition, %denied, "process exit refused");
            }
            None => {
                tracing::warn!(job = %spec.job_id, partition, "process exit unwound");
            }
        }
    }
}
