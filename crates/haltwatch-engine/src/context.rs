//! Single-process engine context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use haltwatch_core::Permission;
use tokio::runtime::Runtime;

use crate::config::{EngineConfig, Master};
use crate::dataset::Dataset;
use crate::error::{EngineError, Result};
use crate::scheduler::JobSpec;
use crate::types::{ContextId, JobId};

/// Entry point of the engine: owns the worker runtime for one application.
///
/// The context is a scoped resource. Dropping it (or calling
/// [`LocalContext::stop`]) shuts the workers down; datasets borrow the
/// context and so cannot outlive it.
pub struct LocalContext {
    id: ContextId,
    config: EngineConfig,
    master: Master,
    shutdown_timeout: Duration,
    runtime: Option<Runtime>,
    next_job: AtomicU64,
}

impl LocalContext {
    /// Starts a context from `config`.
    ///
    /// The process-wide authority is asked for [`Permission::SpawnWorker`]
    /// before the worker threads are started.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the authority
    /// refuses the workers, or the runtime cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let master = config.master()?;
        let shutdown_timeout = config.shutdown_timeout()?;

        haltwatch_core::check_permission(&Permission::SpawnWorker {
            name: config.app_name.clone(),
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(master.threads)
            .thread_name(format!("{}-executor", config.app_name))
            .enable_time()
            .build()?;

        let id = ContextId::new();
        tracing::info!(
            context = %id,
            app = %config.app_name,
            master = %config.master,
            threads = master.threads,
            policy = ?config.fatal_policy,
            "local context started"
        );

        Ok(Self {
            id,
            config,
            master,
            shutdown_timeout,
            runtime: Some(runtime),
            next_job: AtomicU64::new(0),
        })
    }

    /// Returns the context ID.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    /// Returns the configuration the context was started with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the parsed master URL.
    #[must_use]
    pub const fn master(&self) -> Master {
        self.master
    }

    /// Partitions used by [`LocalContext::parallelize`].
    #[must_use]
    pub fn default_parallelism(&self) -> usize {
        self.config.default_parallelism.unwrap_or(self.master.threads)
    }

    /// Returns true once the context has been stopped.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.runtime.is_none()
    }

    /// Distributes `items` over [`LocalContext::default_parallelism`] partitions.
    ///
    /// # Errors
    /// Returns an error if the context has been stopped.
    pub fn parallelize<T>(&self, items: impl IntoIterator<Item = T>) -> Result<Dataset<'_, T>>
    where
        T: Send + Sync + 'static,
    {
        self.parallelize_with_slices(items, self.default_parallelism())
    }

    /// Distributes `items` over `slices` contiguous partitions, preserving order.
    ///
    /// # Errors
    /// Returns an error if `slices` is zero or the context has been stopped.
    pub fn parallelize_with_slices<T>(
        &self,
        items: impl IntoIterator<Item = T>,
        slices: usize,
    ) -> Result<Dataset<'_, T>>
    where
        T: Send + Sync + 'static,
    {
        if self.is_stopped() {
            return Err(EngineError::Stopped(self.id));
        }
        if slices == 0 {
            return Err(EngineError::config("number of slices must be positive"));
        }

        let items: Vec<T> = items.into_iter().collect();
        Ok(Dataset::new(self, slice(items, slices)))
    }

    /// Stops the workers. Idempotent.
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.shutdown_timeout);
            tracing::info!(context = %self.id, app = %self.config.app_name, "local context stopped");
        }
    }

    pub(crate) fn runtime(&self) -> Result<&Runtime> {
        self.runtime.as_ref().ok_or(EngineError::Stopped(self.id))
    }

    pub(crate) fn job_spec(&self) -> JobSpec {
        JobSpec {
            job_id: JobId::new(self.next_job.fetch_add(1, Ordering::SeqCst)),
            max_failures: self.master.max_failures,
            policy: self.config.fatal_policy,
        }
    }
}

impl Drop for LocalContext {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalContext")
            .field("id", &self.id)
            .field("app_name", &self.config.app_name)
            .field("master", &self.master)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Splits `items` into `slices` contiguous runs; partition `i` holds
/// `[i * len / slices, (i + 1) * len / slices)`.
fn slice<T>(items: Vec<T>, slices: usize) -> Vec<Arc<Vec<T>>> {
    let len = items.len();
    let mut remaining = items.into_iter();
    let mut partitions = Vec::with_capacity(slices);
    let mut start = 0;

    for i in 0..slices {
        let end = (i + 1) * len / slices;
        partitions.push(Arc::new(remaining.by_ref().take(end - start).collect()));
        start = end;
    }

    partitions
}
