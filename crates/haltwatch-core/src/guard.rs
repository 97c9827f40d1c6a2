//! Exit-interception guard.
//!
//! # Toyota Way: Jidoka (自働化)
//! The guard stops the line instead of the process: every exit request is
//! refused and the first one is kept as evidence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, ReentrantMutexGuard};

use crate::authority::{self, Authority};
use crate::error::{ExitDenied, GuardError, PermissionDenied, Result};
use crate::types::{ExitAttempt, GuardState, Permission};

/// Guards currently installed, oldest first.
static INSTALLED: Mutex<Vec<Arc<ExitGuard>>> = parking_lot::const_mutex(Vec::new());

/// Substitute authority that blocks and records process-termination requests.
///
/// All permission checks other than exit are allowed, so installing the
/// guard has no side effect beyond intercepting `exit`.
pub struct ExitGuard {
    name: String,
    first_attempt: OnceLock<ExitAttempt>,
    attempts: AtomicU64,
    state: Mutex<GuardState>,
    // Authority to hand back on release. Rewritten when a guard beneath
    // this one is released first.
    previous: Mutex<Option<Arc<dyn Authority>>>,
}

impl ExitGuard {
    /// Creates a new, uninstalled guard.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::named("exit-guard")
    }

    /// Creates a new, uninstalled guard with a custom name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            first_attempt: OnceLock::new(),
            attempts: AtomicU64::new(0),
            state: Mutex::new(GuardState::Uninstalled),
            previous: Mutex::new(None),
        })
    }

    /// Captures the current authority and substitutes this guard for it.
    ///
    /// Blocks while another thread holds an installed guard. The returned
    /// scope restores the captured authority when uninstalled or dropped.
    ///
    /// # Errors
    /// Returns an error if the guard is already installed, was already
    /// released, or the current authority refuses the substitution.
    pub fn install(self: &Arc<Self>) -> Result<InstalledGuard> {
        let lock = authority::lock_authority();

        match *self.state.lock() {
            GuardState::Uninstalled => {}
            GuardState::Installed | GuardState::AttemptRecorded => {
                return Err(GuardError::AlreadyInstalled);
            }
            GuardState::Released => return Err(GuardError::Released),
        }

        let substitute: Arc<dyn Authority> = Arc::clone(self) as Arc<dyn Authority>;
        let previous = authority::set_authority(Some(substitute))?;

        tracing::info!(
            guard = %self.name,
            previous = previous.as_ref().map(|a| a.name()),
            "exit guard installed"
        );

        *self.previous.lock() = previous;
        INSTALLED.lock().push(Arc::clone(self));
        *self.state.lock() = GuardState::Installed;

        Ok(InstalledGuard {
            guard: Arc::clone(self),
            released: false,
            _lock: lock,
        })
    }

    /// Returns the first intercepted exit attempt, if any.
    #[must_use]
    pub fn first_attempt(&self) -> Option<ExitAttempt> {
        self.first_attempt.get().cloned()
    }

    /// Returns how many exit attempts were intercepted.
    #[must_use]
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        *self.state.lock()
    }

    /// Returns the guard name.
    #[must_use]
    pub fn guard_name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ExitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitGuard")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("attempts", &self.attempt_count())
            .field("first_attempt", &self.first_attempt.get())
            .finish_non_exhaustive()
    }
}

impl Authority for ExitGuard {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_exit(&self, status: i32) -> std::result::Result<(), ExitDenied> {
        let sequence = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        // First writer wins; later attempts only bump the counter.
        if self.first_attempt.get().is_none()
            && self
                .first_attempt
                .set(ExitAttempt::capture(status, sequence))
                .is_ok()
        {
            let mut state = self.state.lock();
            if *state == GuardState::Installed {
                *state = GuardState::AttemptRecorded;
            }
            drop(state);
            tracing::warn!(guard = %self.name, status, sequence, "intercepted process exit");
        } else {
            tracing::warn!(guard = %self.name, status, sequence, "intercepted repeated process exit");
        }

        Err(ExitDenied::new(status))
    }

    fn check_permission(&self, _permission: &Permission) -> std::result::Result<(), PermissionDenied> {
        Ok(())
    }
}

/// Scope during which an [`ExitGuard`] is the process-wide authority.
///
/// Dropping the scope restores the previous authority, so restoration also
/// happens when the enclosing code unwinds.
pub struct InstalledGuard {
    guard: Arc<ExitGuard>,
    released: bool,
    // Declared last: dropped after `Drop::drop` has restored the authority.
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl InstalledGuard {
    /// Returns the installed guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<ExitGuard> {
        &self.guard
    }

    /// Returns the authority that will be restored.
    #[must_use]
    pub fn previous(&self) -> Option<Arc<dyn Authority>> {
        self.guard.previous.lock().clone()
    }

    /// Restores the previous authority and returns the first recorded
    /// exit attempt.
    pub fn uninstall(mut self) -> Option<ExitAttempt> {
        self.restore();
        self.guard.first_attempt()
    }

    fn restore(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut installed = INSTALLED.lock();
        let position = installed
            .iter()
            .position(|guard| Arc::ptr_eq(guard, &self.guard));
        if let Some(position) = position {
            installed.remove(position);
        }
        let previous = self.guard.previous.lock().take();

        match position.and_then(|position| installed.get(position)) {
            // Released beneath a guard that is still installed: splice this
            // guard out of the chain so the one above restores past it.
            Some(above) => {
                tracing::warn!(
                    guard = %self.guard.name,
                    above = %above.name,
                    "exit guard released out of order"
                );
                *above.previous.lock() = previous;
            }
            None => {
                let own: Arc<dyn Authority> = Arc::clone(&self.guard) as Arc<dyn Authority>;
                if authority::is_current(&own) {
                    authority::replace_authority(previous);
                } else {
                    tracing::error!(
                        guard = %self.guard.name,
                        current = authority::current_authority().as_ref().map(|a| a.name()),
                        "authority replaced while exit guard was installed, leaving it in place"
                    );
                }
            }
        }
        drop(installed);

        *self.guard.state.lock() = GuardState::Released;

        tracing::info!(
            guard = %self.guard.name,
            attempts = self.guard.attempt_count(),
            "exit guard uninstalled"
        );
    }
}

impl Drop for InstalledGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

impl std::fmt::Debug for InstalledGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstalledGuard")
            .field("guard", &self.guard)
            .field("previous", &self.previous().as_ref().map(|a| a.name().to_string()))
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
