//! Error types for UsageLedger
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::crypto::did::DidError;

/// Result type alias using UsageLedgerError
pub type Result<T> = std::result::Result<T, UsageLedgerError>;

/// Unified error type for UsageLedger operations
#[derive(Debug, Error)]
pub enum UsageLedgerError {
    // Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Metrics source errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    // Settlement validation errors
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    // Snapshot attestation errors
    #[error("Attestation error: {0}")]
    Attestation(#[from] AttestationError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UsageLedgerError {
    /// Whether the caller may retry the whole operation later.
    ///
    /// Declined settlements and external dependency failures are retryable;
    /// invariant violations and undecodable records are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            UsageLedgerError::Metrics(_) => true,
            UsageLedgerError::Ledger(LedgerError::Io(_)) => true,
            UsageLedgerError::Settlement(SettlementError::NoUsageToSettle { .. }) => true,
            _ => false,
        }
    }

    /// Whether the error requires out-of-band repair
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UsageLedgerError::Ledger(LedgerError::MultipleUnpaidRecords { .. })
                | UsageLedgerError::Serialization(_)
        )
    }

    /// Whether the error is an expected business outcome rather than a defect
    ///
    /// Attestation failures are never declines.
    pub fn is_declined(&self) -> bool {
        matches!(self, UsageLedgerError::Settlement(_))
    }
}

/// Ledger storage errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O failed: {0}")]
    Io(String),

    #[error("Found {count} unpaid usage slices for owner {owner}, consumer {consumer}")]
    MultipleUnpaidRecords {
        owner: String,
        consumer: String,
        count: usize,
    },

    #[error("Invalid composite key attribute {attribute:?}: {reason}")]
    InvalidKeyAttribute { attribute: String, reason: String },
}

/// Metrics source errors
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed metrics response: {0}")]
    Parse(String),
}

/// Settlement validation errors
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("No usage to settle for owner {owner}, consumer {consumer}: cpu delta {delta_cpu}, ram delta {delta_ram}")]
    NoUsageToSettle {
        owner: String,
        consumer: String,
        delta_cpu: f64,
        delta_ram: f64,
    },

    #[error("Snapshot is for {snapshot_owner}/{snapshot_consumer}, not {owner}/{consumer}")]
    PartyMismatch {
        owner: String,
        consumer: String,
        snapshot_owner: String,
        snapshot_consumer: String,
    },

    #[error("Snapshot reads namespace {actual}, owner runs in {expected}")]
    NamespaceMismatch { expected: String, actual: String },

    #[error("Snapshot counters cpu={cpu} ram={ram} are not valid cumulative totals")]
    InvalidReading { cpu: f64, ram: f64 },

    #[error("Snapshot window {window} precedes recorded window {recorded}")]
    StaleSnapshot { window: i64, recorded: i64 },
}

/// Snapshot attestation errors
#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("Oracle is not trusted: {0}")]
    UntrustedOracle(String),

    #[error("Snapshot signature is invalid")]
    InvalidSignature,

    #[error("Malformed signature encoding: {0}")]
    MalformedSignature(String),

    #[error("Oracle identity error: {0}")]
    Did(#[from] DidError),
}

// Implement From for common external error types
impl From<serde_json::Error> for UsageLedgerError {
    fn from(err: serde_json::Error) -> Self {
        UsageLedgerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for UsageLedgerError {
    fn from(err: anyhow::Error) -> Self {
        UsageLedgerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UsageLedgerError::Ledger(LedgerError::MultipleUnpaidRecords {
            owner: "org1".to_string(),
            consumer: "org2".to_string(),
            count: 2,
        });
        let msg = err.to_string();
        assert!(msg.contains("org1"));
        assert!(msg.contains("2 unpaid"));
    }

    #[test]
    fn test_retry_classification() {
        let declined = UsageLedgerError::Settlement(SettlementError::NoUsageToSettle {
            owner: "org1".into(),
            consumer: "org2".into(),
            delta_cpu: 0.0,
            delta_ram: 0.0,
        });
        assert!(declined.is_retryable());
        assert!(declined.is_declined());
        assert!(!declined.is_fatal());

        let unavailable = UsageLedgerError::from(MetricsError::Unavailable("timeout".into()));
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_fatal());

        let corrupt = UsageLedgerError::from(LedgerError::MultipleUnpaidRecords {
            owner: "org1".into(),
            consumer: "org2".into(),
            count: 3,
        });
        assert!(corrupt.is_fatal());
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn test_attestation_failure_is_not_declined() {
        let forged = UsageLedgerError::from(AttestationError::InvalidSignature);
        assert!(!forged.is_declined());
        assert!(!forged.is_retryable());

        let untrusted = UsageLedgerError::from(AttestationError::UntrustedOracle("did:key:z".into()));
        assert!(!untrusted.is_declined());
    }

    #[test]
    fn test_serde_error_is_fatal() {
        let err: UsageLedgerError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, UsageLedgerError::Serialization(_)));
        assert!(err.is_fatal());
    }
}
