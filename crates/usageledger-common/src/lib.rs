//! # UsageLedger Common
//!
//! Shared types, errors, and signature primitives for metering compute usage
//! between two parties and recording it on a key-value ledger.
//!
//! ## Core Types
//!
//! - [`UsageSlice`]: the single unpaid usage record kept per (owner, consumer)
//! - [`UsageReading`]: one fresh pair of cumulative CPU/RAM counters
//! - [`UsageSnapshot`]/[`SignedUsageSnapshot`]: oracle-attested readings
//!
//! ## Crypto
//!
//! - [`crypto::did`]: `did:key` identities for snapshot oracles
//! - [`crypto::attestation`]: snapshot signing and verification

pub mod crypto;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    AttestationError, LedgerError, MetricsError, Result, SettlementError, UsageLedgerError,
};
pub use types::{
    snapshot::{SignedUsageSnapshot, UsageSnapshot},
    usage_slice::{window_timestamp, UsageDelta, UsageReading, UsageSlice},
};

/// UsageLedger version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger object type under which usage slices are keyed
pub const USAGE_SLICE_OBJECT_TYPE: &str = "UsageSlice";

/// Seconds in a settlement window
pub const WINDOW_SECONDS: i64 = 60;

/// Kubernetes namespace used when a party has no explicit mapping
pub const DEFAULT_NAMESPACE: &str = "kube-system";
