//! Cryptographic primitives for UsageLedger
//!
//! This module provides:
//! - DID (did:key) identities for snapshot oracles
//! - Snapshot signing and verification

pub mod attestation;
pub mod did;

// Re-export commonly used items
pub use attestation::{sign_snapshot, snapshot_digest, verify_snapshot};
pub use did::{did_for_signing_key, DidError};
