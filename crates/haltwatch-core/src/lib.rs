// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # haltwatch-core
//!
//! Process-wide exit authority and exit-interception guard.
//!
//! This crate provides:
//!
//! - [`Authority`] trait and the process-wide registry
//!   ([`current_authority`], [`set_authority`])
//! - [`exit`], the single process-termination entry point that consults the
//!   installed authority
//! - [`ExitGuard`], a substitute authority that refuses and records exits
//! - [`InstalledGuard`], the scope that restores the previous authority
//!
//! ## Iron Lotus Framework
//!
//! - **Jidoka**: An intercepted exit stops the offending code path, not the process
//! - **Poka-Yoke**: Restoration is tied to scope, it cannot be forgotten
//! - **Genchi Genbutsu**: The first attempt is kept with its thread and backtrace
//!
//! ## Example
//!
//! ```rust
//! use haltwatch_core::{ExitGuard, check_exit};
//!
//! let guard = ExitGuard::new();
//! let scope = guard.install().expect("install");
//! assert!(check_exit(1).is_err());
//! let first = scope.uninstall();
//! assert_eq!(first.map(|a| a.status), Some(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod authority;
pub mod error;
pub mod guard;
pub mod types;

pub use authority::{
    Authority, check_exit, check_permission, current_authority, exit, is_current, lock_authority,
    same_authority, set_authority,
};
pub use error::{ExitDenied, GuardError, PermissionDenied, Result};
pub use guard::{ExitGuard, InstalledGuard};
pub use types::{EXIT_UNCAUGHT_EXCEPTION, ExitAttempt, GuardState, Permission};
