//! Snapshot signing and verification
//!
//! The signed message is the BLAKE3 digest of the snapshot's JSON encoding.
//! Field order of [`UsageSnapshot`] is therefore part of the signature format.

use ed25519_dalek::SigningKey;

use super::did::{did_for_signing_key, sign_with_key, verify_with_did};
use crate::error::{AttestationError, Result};
use crate::types::snapshot::{SignedUsageSnapshot, UsageSnapshot};

/// BLAKE3 digest of the snapshot's canonical encoding
pub fn snapshot_digest(snapshot: &UsageSnapshot) -> Result<[u8; 32]> {
    let encoded = serde_json::to_vec(snapshot)?;
    Ok(*blake3::hash(&encoded).as_bytes())
}

/// Sign a snapshot as the oracle holding `signing_key`
pub fn sign_snapshot(signing_key: &SigningKey, snapshot: UsageSnapshot) -> Result<SignedUsageSnapshot> {
    let digest = snapshot_digest(&snapshot)?;
    let signature = sign_with_key(signing_key, &digest);

    Ok(SignedUsageSnapshot {
        snapshot,
        oracle_did: did_for_signing_key(signing_key),
        signature: hex::encode(signature),
    })
}

/// Check that a snapshot was signed by one of `trusted_oracles`
pub fn verify_snapshot(signed: &SignedUsageSnapshot, trusted_oracles: &[String]) -> Result<()> {
    if !trusted_oracles.iter().any(|did| did == &signed.oracle_did) {
        return Err(AttestationError::UntrustedOracle(signed.oracle_did.clone()).into());
    }

    let signature: [u8; 64] = hex::decode(&signed.signature)
        .map_err(|e| AttestationError::MalformedSignature(e.to_string()))?
        .try_into()
        .map_err(|bytes: Vec<u8>| {
            AttestationError::MalformedSignature(format!("expected 64 bytes, got {}", bytes.len()))
        })?;

    let digest = snapshot_digest(&signed.snapshot)?;
    let valid = verify_with_did(&signed.oracle_did, &digest, &signature)
        .map_err(AttestationError::from)?;

    if !valid {
        return Err(AttestationError::InvalidSignature.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UsageLedgerError;
    use crate::types::usage_slice::UsageReading;
    use rand::rngs::OsRng;

    fn snapshot() -> UsageSnapshot {
        UsageSnapshot::new("org1", "org2", "kube-system", 1_700_000_040, UsageReading::new(415.24, 145.02))
    }

    #[test]
    fn test_sign_and_verify_snapshot() {
        let key = SigningKey::generate(&mut OsRng);
        let signed = sign_snapshot(&key, snapshot()).unwrap();
        let trusted = vec![did_for_signing_key(&key)];

        assert_eq!(signed.signature.len(), 128);
        assert!(verify_snapshot(&signed, &trusted).is_ok());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(snapshot_digest(&snapshot()).unwrap(), snapshot_digest(&snapshot()).unwrap());

        let mut other = snapshot();
        other.cpu_cumulative_minutes += 0.01;
        assert_ne!(snapshot_digest(&snapshot()).unwrap(), snapshot_digest(&other).unwrap());
    }

    #[test]
    fn test_untrusted_oracle_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let stranger = SigningKey::generate(&mut OsRng);
        let signed = sign_snapshot(&stranger, snapshot()).unwrap();

        let err = verify_snapshot(&signed, &[did_for_signing_key(&key)]).unwrap_err();
        assert!(matches!(
            err,
            UsageLedgerError::Attestation(AttestationError::UntrustedOracle(_))
        ));
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut signed = sign_snapshot(&key, snapshot()).unwrap();
        signed.snapshot.ram_cumulative_minutes = 9_999.0;

        let err = verify_snapshot(&signed, &[did_for_signing_key(&key)]).unwrap_err();
        assert!(matches!(
            err,
            UsageLedgerError::Attestation(AttestationError::InvalidSignature)
        ));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut signed = sign_snapshot(&key, snapshot()).unwrap();
        signed.signature = "abcd".to_string();

        let err = verify_snapshot(&signed, &[did_for_signing_key(&key)]).unwrap_err();
        assert!(matches!(
            err,
            UsageLedgerError::Attestation(AttestationError::MalformedSignature(_))
        ));
    }
}
