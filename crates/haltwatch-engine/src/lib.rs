// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # haltwatch-engine
//!
//! A small single-process data-processing engine.
//!
//! This crate provides:
//!
//! - [`LocalContext`]: owns the worker runtime for one application
//! - [`Dataset`]: ordered, partitioned data with `foreach`, `count`, `collect`
//! - [`TaskFailure`]: classification of what a task raised (fatal error,
//!   recoverable error, panic, intercepted exit)
//! - [`FatalErrorPolicy`]: whether a fatal task error propagates to the
//!   caller or asks the process to exit
//!
//! ## Example
//!
//! ```rust
//! use haltwatch_engine::{EngineConfig, FatalError, LocalContext};
//!
//! let ctx = LocalContext::new(EngineConfig::new("example").with_master("local")).unwrap();
//! let dataset = ctx.parallelize(vec!["One", "Two", "Three"]).unwrap();
//! let err = dataset
//!     .foreach(|_| Err(FatalError::linkage("fake missing definition").into()))
//!     .unwrap_err();
//! assert!(err.task_failure().is_some_and(|f| f.is_fatal()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod dataset;
pub mod error;
mod scheduler;
pub mod types;

pub use config::{EngineConfig, FatalErrorPolicy, Master};
pub use context::LocalContext;
pub use dataset::Dataset;
pub use error::{EngineError, FatalError, FatalKind, Result, TaskError, TaskFailure};
pub use types::{ContextId, JobId, JobSummary};
