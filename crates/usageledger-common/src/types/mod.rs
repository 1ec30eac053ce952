//! Core data types for UsageLedger

pub mod snapshot;
pub mod usage_slice;
