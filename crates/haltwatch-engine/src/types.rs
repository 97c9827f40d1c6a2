//! Identifiers and job results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a local context.
///
/// Per Iron Lotus Framework case study, we use UUIDs instead of
/// indices so identifiers stay unique across contexts in one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    /// Creates a new random context ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential job number, scoped to one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    /// Creates a job ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw job number.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of a successfully completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job that completed.
    pub job_id: JobId,
    /// Number of partitions (tasks).
    pub partitions: usize,
    /// Total task attempts, including retries.
    pub task_attempts: u32,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl JobSummary {
    /// Returns how many attempts were retries.
    #[must_use]
    pub fn retries(&self) -> u32 {
        let partitions = u32::try_from(self.partitions).unwrap_or(u32::MAX);
        self.task_attempts.saturating_sub(partitions)
    }
}
