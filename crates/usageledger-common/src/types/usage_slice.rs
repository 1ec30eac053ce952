//! UsageSlice - Unpaid compute usage between two parties
//!
//! A usage slice records the cumulative CPU and RAM minutes a consumer has
//! drawn from an owner's namespace, as last observed by a settlement
//! transaction. Key properties:
//! - Counters are absolute cumulative totals, never deltas
//! - At most one unpaid slice exists per (owner, consumer); it is replaced in
//!   place on every successful settlement
//! - Timestamps are truncated to the start of the settlement minute

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UsageLedgerError};
use crate::WINDOW_SECONDS;

/// Usage record as stored on the ledger
///
/// Field names on the wire are fixed by the ledger's record format and must
/// not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSlice {
    /// Id of the transaction that wrote this slice
    pub id: String,

    /// Party whose resources were consumed
    #[serde(rename = "owner_id")]
    pub owner: String,

    /// Party that consumed the resources
    #[serde(rename = "consumer_id")]
    pub consumer: String,

    /// Cumulative CPU usage in minutes
    #[serde(rename = "k8s_cpu_mins")]
    pub cpu_cumulative_minutes: f64,

    /// Cumulative RAM usage in RAM-minutes
    #[serde(rename = "k8s_ram_mins")]
    pub ram_cumulative_minutes: f64,

    /// Settlement window start (Unix seconds)
    #[serde(rename = "epoch")]
    pub timestamp: i64,

    /// Whether a payment step has consumed this slice
    #[serde(rename = "is_paid")]
    pub paid: bool,
}

impl UsageSlice {
    /// Zero-valued unpaid slice used when a pair has never been settled
    pub fn baseline(id: impl Into<String>, owner: &str, consumer: &str) -> Self {
        Self {
            id: id.into(),
            owner: owner.to_string(),
            consumer: consumer.to_string(),
            cpu_cumulative_minutes: 0.0,
            ram_cumulative_minutes: 0.0,
            timestamp: 0,
            paid: false,
        }
    }

    /// Unpaid slice carrying a freshly settled reading
    pub fn settled(
        id: impl Into<String>,
        owner: &str,
        consumer: &str,
        reading: UsageReading,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.to_string(),
            consumer: consumer.to_string(),
            cpu_cumulative_minutes: reading.cpu_cumulative_minutes,
            ram_cumulative_minutes: reading.ram_cumulative_minutes,
            timestamp,
            paid: false,
        }
    }

    /// Counters carried by this slice
    pub fn reading(&self) -> UsageReading {
        UsageReading::new(self.cpu_cumulative_minutes, self.ram_cumulative_minutes)
    }

    /// Encode as the flat JSON object stored on the ledger
    ///
    /// Non-finite counters are refused: serde_json would write them as
    /// `null`, which no later read could decode.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        if !self.reading().is_finite() {
            return Err(UsageLedgerError::Serialization(format!(
                "Failed to encode usage slice: non-finite counters cpu={} ram={}",
                self.cpu_cumulative_minutes, self.ram_cumulative_minutes
            )));
        }
        serde_json::to_vec(self).map_err(|e| {
            UsageLedgerError::Serialization(format!("Failed to encode usage slice: {}", e))
        })
    }

    /// Decode a ledger value
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            UsageLedgerError::Serialization(format!("Failed to decode usage slice: {}", e))
        })
    }
}

impl std::fmt::Display for UsageSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UsageSlice({} -> {}, cpu={}m, ram={}m, epoch={}, paid={})",
            self.owner,
            self.consumer,
            self.cpu_cumulative_minutes,
            self.ram_cumulative_minutes,
            self.timestamp,
            self.paid
        )
    }
}

/// A pair of cumulative counters read from the metrics source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageReading {
    pub cpu_cumulative_minutes: f64,
    pub ram_cumulative_minutes: f64,
}

impl UsageReading {
    pub fn new(cpu_cumulative_minutes: f64, ram_cumulative_minutes: f64) -> Self {
        Self {
            cpu_cumulative_minutes,
            ram_cumulative_minutes,
        }
    }

    /// Both counters are finite
    pub fn is_finite(&self) -> bool {
        self.cpu_cumulative_minutes.is_finite() && self.ram_cumulative_minutes.is_finite()
    }

    /// Both counters are finite and non-negative
    pub fn is_valid_cumulative(&self) -> bool {
        self.is_finite() && self.cpu_cumulative_minutes >= 0.0 && self.ram_cumulative_minutes >= 0.0
    }

    /// Change relative to a previously recorded slice
    pub fn delta_from(&self, previous: &UsageSlice) -> UsageDelta {
        UsageDelta {
            cpu: self.cpu_cumulative_minutes - previous.cpu_cumulative_minutes,
            ram: self.ram_cumulative_minutes - previous.ram_cumulative_minutes,
        }
    }
}

/// Difference between a fresh reading and the recorded slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageDelta {
    pub cpu: f64,
    pub ram: f64,
}

impl UsageDelta {
    /// True when at least one counter grew
    #[inline]
    pub fn has_usage(&self) -> bool {
        self.cpu > 0.0 || self.ram > 0.0
    }
}

/// Start of the minute containing `now`, in Unix seconds
pub fn window_timestamp(now: DateTime<Utc>) -> i64 {
    let secs = now.timestamp();
    secs - secs.rem_euclid(WINDOW_SECONDS)
}
