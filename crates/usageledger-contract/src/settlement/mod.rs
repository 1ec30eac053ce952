//! Usage settlement
//!
//! A settlement replaces the unpaid usage slice of a pair with fresh
//! cumulative counters, provided at least one counter grew since the last
//! recorded reading.

pub mod engine;

pub use engine::SettlementEngine;

use std::sync::atomic::{AtomicU64, Ordering};

use usageledger_common::Result;

/// Settlement outcome counters
#[derive(Debug, Default)]
pub struct SettlementMetrics {
    pub settled: AtomicU64,
    pub settled_attested: AtomicU64,
    pub declined: AtomicU64,
    pub failed: AtomicU64,
}

impl SettlementMetrics {
    pub(crate) fn record<T>(&self, outcome: &Result<T>, attested: bool) {
        let counter = match outcome {
            Ok(_) if attested => &self.settled_attested,
            Ok(_) => &self.settled,
            Err(e) if e.is_declined() => &self.declined,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> SettlementStats {
        SettlementStats {
            settled: self.settled.load(Ordering::Relaxed),
            settled_attested: self.settled_attested.load(Ordering::Relaxed),
            declined: self.declined.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`SettlementMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementStats {
    pub settled: u64,
    pub settled_attested: u64,
    pub declined: u64,
    pub failed: u64,
}
