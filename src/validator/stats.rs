use crate::dnssec::ValidationResult;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the engine
#[derive(Debug)]
pub struct ValidatorStats {
    pub tasks_created: AtomicU64,
    pub secure: AtomicU64,
    pub insecure: AtomicU64,
    /// Any failure verdict except cancellation
    pub bogus: AtomicU64,
    pub canceled: AtomicU64,
    pub fetches: AtomicU64,
    pub deadlocks_avoided: AtomicU64,
}

impl Default for ValidatorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorStats {
    pub fn new() -> Self {
        Self {
            tasks_created: AtomicU64::new(0),
            secure: AtomicU64::new(0),
            insecure: AtomicU64::new(0),
            bogus: AtomicU64::new(0),
            canceled: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            deadlocks_avoided: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_created(&self) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deadlock(&self) {
        self.deadlocks_avoided.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_result(&self, result: ValidationResult) {
        let counter = match result {
            ValidationResult::Secure => &self.secure,
            ValidationResult::ProvenInsecure => &self.insecure,
            ValidationResult::Canceled => &self.canceled,
            _ => &self.bogus,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks that finished with any verdict
    pub fn completed(&self) -> u64 {
        [&self.secure, &self.insecure, &self.bogus, &self.canceled]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            secure: self.secure.load(Ordering::Relaxed),
            insecure: self.insecure.load(Ordering::Relaxed),
            bogus: self.bogus.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            deadlocks_avoided: self.deadlocks_avoided.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ValidatorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tasks_created: u64,
    pub secure: u64,
    pub insecure: u64,
    pub bogus: u64,
    pub canceled: u64,
    pub fetches: u64,
    pub deadlocks_avoided: u64,
}
