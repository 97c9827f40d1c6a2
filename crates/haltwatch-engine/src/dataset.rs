//! Partitioned in-memory datasets.

use std::sync::Arc;

use crate::context::LocalContext;
use crate::error::{Result, TaskError};
use crate::scheduler;
use crate::types::JobSummary;

/// An ordered collection split into partitions, bound to the context that
/// created it. Every action runs as one job with one task per partition.
pub struct Dataset<'ctx, T> {
    ctx: &'ctx LocalContext,
    partitions: Vec<Arc<Vec<T>>>,
}

impl<'ctx, T> Dataset<'ctx, T>
where
    T: Send + Sync + 'static,
{
    pub(crate) const fn new(ctx: &'ctx LocalContext, partitions: Vec<Arc<Vec<T>>>) -> Self {
        Self { ctx, partitions }
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Returns the items of each partition, in order.
    pub fn partitions(&self) -> impl Iterator<Item = &[T]> {
        self.partitions.iter().map(|p| p.as_slice())
    }

    /// Applies `f` to every item on the worker threads.
    ///
    /// Items of a partition are processed in order; the first error ends the
    /// task attempt. A task that fails beyond its retry budget, or raises a
    /// fatal error, aborts the job with [`crate::EngineError::JobAborted`].
    ///
    /// # Errors
    /// Returns the job failure, or an error if the context has been stopped.
    pub fn foreach<F>(&self, f: F) -> Result<JobSummary>
    where
        F: Fn(&T) -> std::result::Result<(), TaskError> + Send + Sync + 'static,
    {
        self.foreach_partition(move |items| items.iter().try_for_each(&f))
    }

    /// Applies `f` to each partition as a whole.
    ///
    /// # Errors
    /// Returns the job failure, or an error if the context has been stopped.
    pub fn foreach_partition<F>(&self, f: F) -> Result<JobSummary>
    where
        F: Fn(&[T]) -> std::result::Result<(), TaskError> + Send + Sync + 'static,
    {
        let (_, summary) = self.run(f)?;
        Ok(summary)
    }

    /// Counts the items.
    ///
    /// # Errors
    /// Returns the job failure, or an error if the context has been stopped.
    pub fn count(&self) -> Result<usize> {
        let (counts, _) = self.run(|items| Ok(items.len()))?;
        Ok(counts.into_iter().sum())
    }

    /// Collects all items in order.
    ///
    /// # Errors
    /// Returns the job failure, or an error if the context has been stopped.
    pub fn collect(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        let (chunks, _) = self.run(|items| Ok(items.to_vec()))?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// Applies `f` to every item; the results keep the partitioning.
    ///
    /// # Errors
    /// Returns the job failure, or an error if the context has been stopped.
    pub fn map<U, F>(&self, f: F) -> Result<Dataset<'ctx, U>>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<U, TaskError> + Send + Sync + 'static,
    {
        let (partitions, _) = self.run(move |items| {
            items
                .iter()
                .map(&f)
                .collect::<std::result::Result<Vec<U>, TaskError>>()
        })?;
        Ok(Dataset::new(
            self.ctx,
            partitions.into_iter().map(Arc::new).collect(),
        ))
    }

    fn run<U, F>(&self, f: F) -> Result<(Vec<U>, JobSummary)>
    where
        U: Send + 'static,
        F: Fn(&[T]) -> std::result::Result<U, TaskError> + Send + Sync + 'static,
    {
        let runtime = self.ctx.runtime()?;
        scheduler::run_job(runtime, self.ctx.job_spec(), &self.partitions, f)
    }
}

impl<T> std::fmt::Debug for Dataset<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("context", &self.ctx.id())
            .field("partitions", &self.partitions.len())
            .finish()
    }
}
