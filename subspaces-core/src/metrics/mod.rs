//! Metrics for permission checks and fee allowances
//!
//! Counters go through the `metrics` facade; nothing is recorded anywhere
//! until the host application installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Permission metrics
    describe_counter!("subspaces.permissions.checks", "Number of permission checks");
    describe_counter!("subspaces.permissions.denied", "Number of permission checks that were denied");

    // Section metrics
    describe_counter!("subspaces.sections.deleted", "Number of sections deleted, cascades included");

    // Allowance metrics
    describe_counter!("subspaces.grants.created", "Number of allowances granted");
    describe_counter!("subspaces.grants.revoked", "Number of allowances revoked");
    describe_counter!("subspaces.grants.used", "Number of fees paid from an allowance");
    describe_counter!("subspaces.grants.rejected", "Number of fees no allowance would pay");
    describe_counter!("subspaces.grants.exhausted", "Number of allowances removed after being used up");
    describe_counter!("subspaces.grants.expired_removed", "Number of expired allowances removed");
    describe_histogram!("subspaces.grants.use.duration_ms", "Time spent finding an allowance for a fee");

    // Accounts
    describe_counter!("subspaces.accounts.created", "Number of grantee accounts created");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_permission_check(granted: bool) {
    record_counter("subspaces.permissions.checks", 1);
    if !granted {
        record_counter("subspaces.permissions.denied", 1);
    }
}

pub fn record_section_deleted() {
    record_counter("subspaces.sections.deleted", 1);
}

pub fn record_grant_created() {
    record_counter("subspaces.grants.created", 1);
}

pub fn record_grant_revoked() {
    record_counter("subspaces.grants.revoked", 1);
}

pub fn record_grant_used() {
    record_counter("subspaces.grants.used", 1);
}

pub fn record_grant_rejected() {
    record_counter("subspaces.grants.rejected", 1);
}

pub fn record_grant_exhausted() {
    record_counter("subspaces.grants.exhausted", 1);
}

pub fn record_expired_grants_removed(count: u64) {
    record_counter("subspaces.grants.expired_removed", count);
}

pub fn record_account_created() {
    record_counter("subspaces.accounts.created", 1);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();
        // No recorder installed, recording is a no-op
        record_permission_check(false);
        record_expired_grants_removed(3);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("subspaces.test.duration_ms");
        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.stop();
    }
}
