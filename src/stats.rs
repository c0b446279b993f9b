//! Execution statistics boundary.
//!
//! The registry's read paths can hydrate each definition with the number
//! of failed executions recorded against its current uuid. The statistic
//! is produced by whatever runs the scripts; the registry only consults
//! the provider, keyed by uuid, so a content update (which rotates the
//! uuid) naturally resets the visible count.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of per-version execution statistics.
pub trait ExecutionStatsProvider: Send + Sync {
    /// Returns the number of failed executions recorded for `uuid`.
    fn error_count(&self, uuid: &str) -> u64;
}

/// In-memory execution statistics, fed by the host runtime.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    errors: RwLock<HashMap<String, u64>>,
}

impl ExecutionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failed execution against `uuid`.
    pub fn record_error(&self, uuid: &str) {
        let mut errors = self.errors.write();
        *errors.entry(uuid.to_string()).or_insert(0) += 1;
    }

    /// Records one successful execution against `uuid`.
    ///
    /// Successes do not affect the error count; the hook exists so the
    /// host runtime reports every outcome through one interface.
    pub fn record_success(&self, _uuid: &str) {}
}

impl ExecutionStatsProvider for ExecutionTracker {
    fn error_count(&self, uuid: &str) -> u64 {
        self.errors.read().get(uuid).copied().unwrap_or(0)
    }
}
