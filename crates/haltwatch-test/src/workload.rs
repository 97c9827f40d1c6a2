//! Fatal workload injection.
//!
//! A [`FatalWorkload`] turns a dataset item into a task callback that raises
//! one classified fatal error instead of doing real work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use haltwatch_engine::{FatalError, FatalKind, TaskError};

/// How the fatal error leaves the task callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RaiseStyle {
    /// Returned as `Err(TaskError::Fatal(..))`.
    #[default]
    Return,
    /// Raised as an unwinding panic carrying the [`FatalError`].
    Panic,
}

/// One fatal condition raised from inside the work dispatched to the engine.
#[derive(Debug, Clone)]
pub struct FatalWorkload<T> {
    error: FatalError,
    target: Option<T>,
    style: RaiseStyle,
    injections: Arc<AtomicU64>,
}

impl<T> FatalWorkload<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Creates a workload raising `kind` on every item.
    #[must_use]
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        Self {
            error: FatalError::new(kind, message),
            target: None,
            style: RaiseStyle::default(),
            injections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Linkage error, as raised when a definition is missing at run time.
    #[must_use]
    pub fn linkage() -> Self {
        Self::new(FatalKind::Linkage, "fake missing definition")
    }

    /// Raise only while processing `item`; other items complete normally.
    #[must_use]
    pub fn on_item(mut self, item: T) -> Self {
        self.target = Some(item);
        self
    }

    /// Sets how the error leaves the callback.
    #[must_use]
    pub const fn raising(mut self, style: RaiseStyle) -> Self {
        self.style = style;
        self
    }

    /// Returns the fatal classification.
    #[must_use]
    pub const fn kind(&self) -> FatalKind {
        self.error.kind
    }

    /// Returns the error that will be raised.
    #[must_use]
    pub const fn error(&self) -> &FatalError {
        &self.error
    }

    /// Returns how many times the error has been raised so far.
    #[must_use]
    pub fn injections(&self) -> u64 {
        self.injections.load(Ordering::SeqCst)
    }

    /// Returns the per-item task callback.
    ///
    /// Clones share the injection counter.
    pub fn task(&self) -> impl Fn(&T) -> Result<(), TaskError> + Send + Sync + 'static + use<T>
    where
        T: Clone,
    {
        let workload = self.clone();
        move |item| workload.call(item)
    }

    /// Processes one item.
    ///
    /// # Errors
    /// Returns the fatal error when `item` is targeted and the style is
    /// [`RaiseStyle::Return`].
    pub fn call(&self, item: &T) -> Result<(), TaskError> {
        let targeted = self.target.as_ref().is_none_or(|target| target == item);
        if !targeted {
            return Ok(());
        }

        let count = self.injections.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(kind = %self.error.kind, count, "injecting fatal error");

        match self.style {
            RaiseStyle::Return => Err(self.error.clone().into()),
            RaiseStyle::Panic => self.error.clone().raise(),
        }
    }
}
