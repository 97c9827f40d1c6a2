//! Process-wide authority registry.
//!
//! Every privileged operation routed through this crate, process termination
//! first of all, consults the currently installed [`Authority`]. With no
//! authority installed everything is allowed and [`exit`] terminates the
//! process.
//!
//! The registry is global mutable state. Code that swaps it should hold
//! [`lock_authority`] for the whole swap-use-restore interval so concurrent
//! tests in the same process never observe each other's authority;
//! [`crate::ExitGuard::install`] does this automatically.

use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::error::{ExitDenied, PermissionDenied};
use crate::types::Permission;

/// Policy object consulted before privileged operations.
pub trait Authority: Send + Sync {
    /// Returns the authority name (used in logs and denials).
    fn name(&self) -> &str;

    /// Termination hook. Returning `Err` prevents the process from exiting.
    fn check_exit(&self, status: i32) -> Result<(), ExitDenied>;

    /// Generic permission hook for everything other than termination.
    fn check_permission(&self, permission: &Permission) -> Result<(), PermissionDenied>;
}

static CURRENT: RwLock<Option<Arc<dyn Authority>>> = parking_lot::const_rwlock(None);
static EXCLUSIVE: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Serializes authority substitutions across threads.
///
/// Reentrant: the holding thread may install nested guards.
pub fn lock_authority() -> ReentrantMutexGuard<'static, ()> {
    EXCLUSIVE.lock()
}

/// Returns the currently installed authority, if any.
pub fn current_authority() -> Option<Arc<dyn Authority>> {
    CURRENT.read().clone()
}

/// Returns true if `authority` is the one currently installed.
pub fn is_current(authority: &Arc<dyn Authority>) -> bool {
    CURRENT
        .read()
        .as_ref()
        .is_some_and(|current| same_authority(current, authority))
}

/// Installs `next` as the process-wide authority and returns the previous one.
///
/// The currently installed authority is asked for
/// [`Permission::SetAuthority`] first.
///
/// # Errors
/// Returns the denial if the current authority refuses the substitution.
pub fn set_authority(
    next: Option<Arc<dyn Authority>>,
) -> Result<Option<Arc<dyn Authority>>, PermissionDenied> {
    check_permission(&Permission::SetAuthority)?;
    Ok(replace_authority(next))
}

/// Unchecked swap used when restoring a previously captured authority.
/// Restoration must never be refused.
pub(crate) fn replace_authority(next: Option<Arc<dyn Authority>>) -> Option<Arc<dyn Authority>> {
    let next_name = next.as_ref().map(|a| a.name().to_string());
    let previous = std::mem::replace(&mut *CURRENT.write(), next);
    tracing::debug!(
        previous = previous.as_ref().map(|a| a.name()),
        next = next_name.as_deref(),
        "process-wide authority replaced"
    );
    previous
}

/// Asks the current authority whether `permission` is granted.
///
/// # Errors
/// Returns the denial produced by the installed authority.
pub fn check_permission(permission: &Permission) -> Result<(), PermissionDenied> {
    match current_authority() {
        Some(authority) => authority.check_permission(permission),
        None => Ok(()),
    }
}

/// Asks the current authority whether the process may exit with `status`.
///
/// # Errors
/// Returns the denial produced by the installed authority.
pub fn check_exit(status: i32) -> Result<(), ExitDenied> {
    match current_authority() {
        Some(authority) => authority.check_exit(status),
        None => Ok(()),
    }
}

/// Terminates the process, unless the installed authority refuses.
///
/// A refusal is raised as an unwinding panic whose payload is the
/// [`ExitDenied`] value, so this function never returns normally. Callers
/// that catch unwinds can recover it with `payload.downcast_ref::<ExitDenied>()`.
pub fn exit(status: i32) -> ! {
    if let Err(denied) = check_exit(status) {
        tracing::warn!(status, "process exit denied by authority");
        std::panic::panic_any(denied);
    }
    tracing::info!(status, "process exiting");
    std::process::exit(status)
}

/// Compares two authorities by identity.
pub fn same_authority(a: &Arc<dyn Authority>, b: &Arc<dyn Authority>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
