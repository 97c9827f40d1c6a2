//! Error types for haltwatch-core.
//!
//! Per Iron Lotus Framework: All errors are explicit, no panics allowed.
//! The one deliberate exception is [`ExitDenied`], which `exit` raises as an
//! unwinding panic payload because process termination never returns.

use serde::{Deserialize, Serialize};

use crate::types::Permission;

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors raised while installing or releasing an exit guard.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The guard is already the active authority.
    #[error("guard already installed")]
    AlreadyInstalled,

    /// The guard was uninstalled and cannot be reused.
    #[error("guard already released; create a new guard")]
    Released,

    /// The current authority refused the substitution.
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
}

impl GuardError {
    /// Returns true if retrying with a fresh guard could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Released)
    }
}

/// Raised by an authority when a process-termination request is refused.
///
/// `haltwatch_core::exit` turns this into a panic payload, so a denied exit
/// unwinds out of whatever code path requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("caught process exit call with status: {status}")]
pub struct ExitDenied {
    /// Status code the caller tried to exit with.
    pub status: i32,
}

impl ExitDenied {
    /// Creates a denial for the given status code.
    #[must_use]
    pub const fn new(status: i32) -> Self {
        Self { status }
    }
}

/// Raised by an authority when a generic permission check fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("permission denied by {authority}: {permission}")]
pub struct PermissionDenied {
    /// The permission that was requested.
    pub permission: Permission,
    /// Name of the authority that refused it.
    pub authority: String,
}

impl PermissionDenied {
    /// Creates a permission denial.
    #[must_use]
    pub fn new(permission: Permission, authority: impl Into<String>) -> Self {
        Self {
            permission,
            authority: authority.into(),
        }
    }
}
