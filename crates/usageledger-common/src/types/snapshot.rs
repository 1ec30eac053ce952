//! Oracle-attested usage snapshots
//!
//! A snapshot fixes the cumulative counters an oracle observed for one
//! (owner, consumer) pair at one settlement window. Because the counters and
//! the window travel inside the transaction, every executor that replays the
//! settlement derives the same ledger write.

use serde::{Deserialize, Serialize};

use super::usage_slice::UsageReading;

/// Usage observed by an oracle for a single settlement window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub owner: String,
    pub consumer: String,
    /// Namespace the counters were read from
    pub namespace: String,
    /// Window start (Unix seconds, minute aligned)
    pub window_timestamp: i64,
    pub cpu_cumulative_minutes: f64,
    pub ram_cumulative_minutes: f64,
}

impl UsageSnapshot {
    pub fn new(
        owner: &str,
        consumer: &str,
        namespace: &str,
        window_timestamp: i64,
        reading: UsageReading,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            consumer: consumer.to_string(),
            namespace: namespace.to_string(),
            window_timestamp,
            cpu_cumulative_minutes: reading.cpu_cumulative_minutes,
            ram_cumulative_minutes: reading.ram_cumulative_minutes,
        }
    }

    pub fn reading(&self) -> UsageReading {
        UsageReading::new(self.cpu_cumulative_minutes, self.ram_cumulative_minutes)
    }
}

/// Snapshot with the oracle's Ed25519 signature over its digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUsageSnapshot {
    pub snapshot: UsageSnapshot,
    /// did:key of the signing oracle
    pub oracle_did: String,
    /// Hex-encoded 64-byte signature
    pub signature: String,
}
