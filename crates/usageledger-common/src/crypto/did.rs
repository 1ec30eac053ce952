//! Oracle identities as `did:key` DIDs
//!
//! Snapshot oracles are identified by the Ed25519 key they sign with,
//! encoded as a W3C `did:key` (multicodec `0xed01`, base58btc, `z` prefix).
//!
//! Reference: https://w3c-ccg.github.io/did-method-key/

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Ed25519 multicodec prefix for did:key
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

const DID_KEY_PREFIX: &str = "did:key:";

/// DID-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DidError {
    #[error("Invalid DID format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid base58 encoding")]
    InvalidEncoding,

    #[error("Invalid multicodec prefix")]
    InvalidMulticodec,

    #[error("Invalid public key")]
    InvalidPublicKey,
}

/// Encode an Ed25519 public key as a full did:key DID
pub fn encode_did_key(public_key: &[u8; 32]) -> String {
    let mut prefixed = Vec::with_capacity(34);
    prefixed.extend_from_slice(&ED25519_MULTICODEC);
    prefixed.extend_from_slice(public_key);

    let encoded = bs58::encode(&prefixed).into_string();
    format!("{}z{}", DID_KEY_PREFIX, encoded)
}

/// Decode a full did:key DID to its Ed25519 public key
pub fn decode_did_key(did: &str) -> Result<[u8; 32], DidError> {
    if !did.starts_with("did:") {
        return Err(DidError::InvalidFormat("DID must start with 'did:'".into()));
    }
    let identifier = did.strip_prefix(DID_KEY_PREFIX).ok_or_else(|| {
        let method = did.split(':').nth(1).unwrap_or_default();
        DidError::UnsupportedMethod(method.to_string())
    })?;

    // Only base58btc multibase is defined for did:key
    let encoded = identifier
        .strip_prefix('z')
        .ok_or_else(|| DidError::InvalidFormat("did:key identifier must be z-prefixed".into()))?;

    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| DidError::InvalidEncoding)?;

    if decoded.len() != 34 || decoded[..2] != ED25519_MULTICODEC {
        return Err(DidError::InvalidMulticodec);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded[2..]);
    Ok(key)
}

/// Verifying key for a did:key DID
pub fn verifying_key(did: &str) -> Result<VerifyingKey, DidError> {
    let key_bytes = decode_did_key(did)?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|_| DidError::InvalidPublicKey)
}

/// DID of the holder of `signing_key`
pub fn did_for_signing_key(signing_key: &SigningKey) -> String {
    encode_did_key(&signing_key.verifying_key().to_bytes())
}

/// Sign data using a signing key, returning signature bytes
pub fn sign_with_key(signing_key: &SigningKey, message: &[u8]) -> [u8; 64] {
    signing_key.sign(message).to_bytes()
}

/// Verify signature using a DID
pub fn verify_with_did(did: &str, message: &[u8], signature: &[u8; 64]) -> Result<bool, DidError> {
    let verifying_key = verifying_key(did)?;
    let sig = Signature::from_bytes(signature);

    Ok(verifying_key.verify(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_did_key_roundtrip() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = signing_key.verifying_key().to_bytes();

        let did = encode_did_key(&public_key);
        assert!(did.starts_with("did:key:z"));
        assert_eq!(decode_did_key(&did).unwrap(), public_key);
        assert_eq!(did_for_signing_key(&signing_key), did);
    }

    #[test]
    fn test_sign_and_verify() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for_signing_key(&signing_key);

        let message = b"usage snapshot";
        let signature = sign_with_key(&signing_key, message);

        assert!(verify_with_did(&did, message, &signature).unwrap());

        // Wrong message should fail
        assert!(!verify_with_did(&did, b"other snapshot", &signature).unwrap());
    }

    #[test]
    fn test_invalid_did() {
        assert!(matches!(decode_did_key("not-a-did"), Err(DidError::InvalidFormat(_))));
        assert!(matches!(
            decode_did_key("did:web:example.com"),
            Err(DidError::UnsupportedMethod(m)) if m == "web"
        ));
        assert!(matches!(decode_did_key("did:key:z0OIl"), Err(DidError::InvalidEncoding)));
        assert!(matches!(
            decode_did_key(&format!("did:key:z{}", bs58::encode([1u8; 34]).into_string())),
            Err(DidError::InvalidMulticodec)
        ));
    }
}
