//! Engine and task error types.
//!
//! Per Iron Lotus Framework: All errors are explicit. Task failures are
//! classified once, at the task boundary, into [`TaskFailure`]; the job
//! surfaces them wrapped in [`EngineError::JobAborted`].

use std::any::Any;

use haltwatch_core::{ExitDenied, PermissionDenied};
use serde::{Deserialize, Serialize};

use crate::types::{ContextId, JobId};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Classification of non-recoverable task errors.
///
/// None of these are exempted by the engine's "non-fatal" convention: a task
/// raising one is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FatalKind {
    /// Runtime resource exhaustion (stack overflow, out of memory).
    VirtualMachine,
    /// Thread asked to die.
    ThreadDeath,
    /// Work interrupted.
    Interrupted,
    /// Missing or incompatible code definition (class-not-found style).
    Linkage,
    /// Control-flow signal that must not be intercepted.
    Control,
}

impl std::fmt::Display for FatalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::VirtualMachine => "virtual machine error",
            Self::ThreadDeath => "thread death",
            Self::Interrupted => "interruption",
            Self::Linkage => "linkage error",
            Self::Control => "control throwable",
        };
        f.write_str(name)
    }
}

/// A non-recoverable error raised by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FatalError {
    /// Fatal classification.
    pub kind: FatalKind,
    /// Human-readable message.
    pub message: String,
}

impl FatalError {
    /// Creates a fatal error.
    #[must_use]
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a linkage error (missing definition).
    #[must_use]
    pub fn linkage(message: impl Into<String>) -> Self {
        Self::new(FatalKind::Linkage, message)
    }

    /// Creates a stack overflow error.
    #[must_use]
    pub fn stack_overflow(message: impl Into<String>) -> Self {
        Self::new(FatalKind::VirtualMachine, message)
    }

    /// Raises this error as an unwinding panic.
    ///
    /// The engine recognizes the payload and classifies the task failure as
    /// fatal, exactly as if the task had returned it.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }
}

/// Error returned from a task callback.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Non-recoverable error; aborts the job without retry.
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// Ordinary error; the task may be retried.
    #[error(transparent)]
    Recoverable(#[from] anyhow::Error),
}

impl TaskError {
    /// Creates a recoverable error from a message.
    #[must_use]
    pub fn recoverable(msg: impl Into<String>) -> Self {
        Self::Recoverable(anyhow::Error::msg(msg.into()))
    }

    /// Returns true if this error is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Classified outcome of a failed task attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    /// The task raised a fatal error.
    #[error("fatal task error: {0}")]
    Fatal(#[source] FatalError),

    /// The task returned a recoverable error.
    #[error("task error: {0}")]
    Error(String),

    /// The task panicked with an ordinary payload.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task tried to exit the process and the authority refused.
    #[error("task attempted process exit: {0}")]
    ExitIntercepted(#[source] ExitDenied),
}

impl TaskFailure {
    /// Classifies an unwinding panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(fatal) = payload.downcast_ref::<FatalError>() {
            Self::Fatal(fatal.clone())
        } else if let Some(denied) = payload.downcast_ref::<ExitDenied>() {
            Self::ExitIntercepted(*denied)
        } else if let Some(msg) = payload.downcast_ref::<&str>() {
            Self::Panicked((*msg).to_string())
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            Self::Panicked(msg.clone())
        } else {
            Self::Panicked("Box<dyn Any>".to_string())
        }
    }

    /// Returns true if the failure is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Returns true if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Panicked(_))
    }

    /// Returns the fatal error, if this failure is fatal.
    #[must_use]
    pub const fn fatal(&self) -> Option<&FatalError> {
        match self {
            Self::Fatal(fatal) => Some(fatal),
            _ => None,
        }
    }
}

impl From<TaskError> for TaskFailure {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Fatal(fatal) => Self::Fatal(fatal),
            TaskError::Recoverable(err) => Self::Error(format!("{err:#}")),
        }
    }
}

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker runtime error.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A job was aborted because one of its tasks failed.
    #[error(
        "job {job_id} aborted due to task failure: partition {partition} failed {attempts} time(s), most recent failure: {cause}"
    )]
    JobAborted {
        /// The aborted job.
        job_id: JobId,
        /// Partition whose task failed.
        partition: usize,
        /// Attempts made for that task.
        attempts: u32,
        /// Most recent failure.
        #[source]
        cause: TaskFailure,
    },

    /// The context has been stopped.
    #[error("context {0} has been stopped")]
    Stopped(ContextId),

    /// The process-wide authority refused an operation.
    #[error(transparent)]
    Permission(#[from] PermissionDenied),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a runtime error.
    #[must_use]
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Returns the task failure that aborted the job, if any.
    #[must_use]
    pub const fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::JobAborted { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Returns true if resubmitting the job could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::JobAborted { cause, .. } => cause.is_retryable(),
            Self::Runtime(_) | Self::Io(_) => true,
            _ => false,
        }
    }
}
