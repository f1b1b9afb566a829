use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::reconciliation::EngineState;

/// Running totals since the engine started.
#[derive(Debug, Default)]
pub struct EngineStats {
    dispatched: AtomicU64,
    credited: AtomicU64,
    updated: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
    skipped: AtomicU64,
}

impl EngineStats {
    pub fn record_dispatched(&self, count: u64) {
        self.dispatched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_credited(&self) {
        self.credited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, state: EngineState, in_flight: usize) -> EngineStatus {
        EngineStatus {
            state,
            in_flight,
            dispatched: self.dispatched.load(Ordering::Relaxed),
            credited: self.credited.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of the engine, as served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Orders queued or held by a worker.
    pub in_flight: usize,
    /// Orders handed to the job queue.
    pub dispatched: u64,
    /// Orders whose accrual was credited.
    pub credited: u64,
    /// Orders whose update was persisted (credited or not).
    pub updated: u64,
    pub failed: u64,
    pub rate_limited: u64,
    /// Orders dropped by a worker because reconciliation was suspended.
    pub skipped: u64,
}
