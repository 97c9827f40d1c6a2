//! Core types shared by the authority registry and the exit guard.
//!
//! Per Iron Lotus Framework: explicit state machines, no implicit transitions.

use std::backtrace::Backtrace;

use serde::{Deserialize, Serialize};

/// Exit status conventionally used when a worker dies from an uncaught
/// fatal error.
pub const EXIT_UNCAUGHT_EXCEPTION: i32 = 50;

/// A privileged operation the process-wide authority may be asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Replace the process-wide authority.
    SetAuthority,
    /// Start a worker thread or runtime.
    SpawnWorker {
        /// Name of the worker pool being started.
        name: String,
    },
    /// Application-defined permission.
    Custom(String),
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetAuthority => write!(f, "set authority"),
            Self::SpawnWorker { name } => write!(f, "spawn worker '{name}'"),
            Self::Custom(name) => write!(f, "custom '{name}'"),
        }
    }
}

/// Record of one intercepted process-termination attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitAttempt {
    /// Status code passed to `exit`.
    pub status: i32,
    /// 1-based position of this attempt among all attempts seen by the guard.
    pub sequence: u64,
    /// Name of the thread that attempted to exit.
    pub thread: String,
    /// Backtrace of the attempt (empty unless `RUST_BACKTRACE` is set).
    pub backtrace: String,
}

impl ExitAttempt {
    /// Captures an attempt from the calling thread.
    #[must_use]
    pub fn capture(status: i32, sequence: u64) -> Self {
        let current = std::thread::current();
        let thread = current
            .name()
            .map_or_else(|| format!("{:?}", current.id()), str::to_string);

        let backtrace = Backtrace::capture();
        let backtrace = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => backtrace.to_string(),
            _ => String::new(),
        };

        Self {
            status,
            sequence,
            thread,
            backtrace,
        }
    }
}

impl std::fmt::Display for ExitAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exit({}) attempt #{} from thread '{}'",
            self.status, self.sequence, self.thread
        )
    }
}

/// Exit guard lifecycle state.
///
/// ```text
/// Uninstalled → Installed → AttemptRecorded
///      ↓            ↓              ↓
///      └────────→ Released ←───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardState {
    /// Created but never installed.
    Uninstalled,
    /// Active authority, no exit attempt seen yet.
    Installed,
    /// Active authority, at least one exit attempt intercepted.
    AttemptRecorded,
    /// Previous authority restored. Terminal.
    Released,
}

impl GuardState {
    /// Returns true while the guard is the active authority.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Installed | Self::AttemptRecorded)
    }

    /// Returns true once the guard has been released.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }
}
