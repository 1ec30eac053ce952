//! Composite ledger keys
//!
//! Keys use the platform's canonical composite encoding:
//!
//! ```text
//! U+0000 objectType U+0000 attr1 U+0000 attr2 U+0000 ...
//! ```
//!
//! A partial key encodes a prefix of the attributes the same way, so a prefix
//! scan over it selects every record sharing those leading attributes.

use usageledger_common::{LedgerError, Result, UsageSlice, USAGE_SLICE_OBJECT_TYPE};

const MIN_UNICODE_RUNE: char = '\u{0}';
const MAX_UNICODE_RUNE: char = '\u{10FFFF}';
const COMPOSITE_KEY_NAMESPACE: char = '\u{0}';

/// Build a composite key from an object type and its attributes
///
/// Also used for partial keys: pass only the leading attributes.
pub fn create_composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    if object_type.is_empty() {
        return Err(invalid(object_type, "object type must not be empty"));
    }
    validate_attribute(object_type)?;

    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(COMPOSITE_KEY_NAMESPACE);
    key.push_str(object_type);
    key.push(MIN_UNICODE_RUNE);

    for attribute in attributes {
        validate_attribute(attribute)?;
        key.push_str(attribute);
        key.push(MIN_UNICODE_RUNE);
    }
    Ok(key)
}

/// Split a composite key into its object type and attributes
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>)> {
    let body = key
        .strip_prefix(COMPOSITE_KEY_NAMESPACE)
        .and_then(|rest| rest.strip_suffix(MIN_UNICODE_RUNE))
        .ok_or_else(|| invalid(key, "not a composite key"))?;

    let mut parts = body.split(MIN_UNICODE_RUNE).map(str::to_string);
    let object_type = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid(key, "missing object type"))?;

    Ok((object_type, parts.collect()))
}

fn validate_attribute(attribute: &str) -> Result<()> {
    if attribute.contains(MIN_UNICODE_RUNE) || attribute.contains(MAX_UNICODE_RUNE) {
        return Err(invalid(attribute, "contains reserved U+0000 or U+10FFFF"));
    }
    Ok(())
}

fn invalid(attribute: &str, reason: &str) -> usageledger_common::UsageLedgerError {
    LedgerError::InvalidKeyAttribute {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Typed index over usage slice keys: `(owner, consumer, paid)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageSliceKey {
    pub owner: String,
    pub consumer: String,
    pub paid: bool,
}

impl UsageSliceKey {
    pub fn new(owner: &str, consumer: &str, paid: bool) -> Self {
        Self {
            owner: owner.to_string(),
            consumer: consumer.to_string(),
            paid,
        }
    }

    pub fn for_slice(slice: &UsageSlice) -> Self {
        Self::new(&slice.owner, &slice.consumer, slice.paid)
    }

    /// Full ledger key
    pub fn to_ledger_key(&self) -> Result<String> {
        create_composite_key(
            USAGE_SLICE_OBJECT_TYPE,
            &[&self.owner, &self.consumer, paid_attribute(self.paid)],
        )
    }

    /// Partial key selecting the unpaid slice(s) of a pair
    pub fn unpaid_prefix(owner: &str, consumer: &str) -> Result<String> {
        create_composite_key(USAGE_SLICE_OBJECT_TYPE, &[owner, consumer, paid_attribute(false)])
    }

    /// Partial key selecting every usage slice
    pub fn namespace_prefix() -> Result<String> {
        create_composite_key(USAGE_SLICE_OBJECT_TYPE, &[])
    }

    /// Parse a full usage slice key
    pub fn from_ledger_key(key: &str) -> Result<Self> {
        let (object_type, attributes) = split_composite_key(key)?;
        if object_type != USAGE_SLICE_OBJECT_TYPE {
            return Err(invalid(&object_type, "not a usage slice key"));
        }

        match attributes.as_slice() {
            [owner, consumer, paid] => {
                let paid = match paid.as_str() {
                    "true" => true,
                    "false" => false,
                    other => return Err(invalid(other, "paid flag must be true or false")),
                };
                Ok(Self::new(owner, consumer, paid))
            }
            _ => Err(invalid(key, "usage slice keys have exactly three attributes")),
        }
    }
}

fn paid_attribute(paid: bool) -> &'static str {
    if paid {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usageledger_common::UsageLedgerError;

    #[test]
    fn test_canonical_encoding() {
        let key = create_composite_key("UsageSlice", &["org1", "org2", "false"]).unwrap();
        assert_eq!(key, "\u{0}UsageSlice\u{0}org1\u{0}org2\u{0}false\u{0}");
    }

    #[test]
    fn test_partial_key_is_prefix() {
        let full = UsageSliceKey::new("org1", "org2", false).to_ledger_key().unwrap();
        let unpaid = UsageSliceKey::unpaid_prefix("org1", "org2").unwrap();
        let namespace = UsageSliceKey::namespace_prefix().unwrap();

        assert!(full.starts_with(&unpaid));
        assert!(full.starts_with(&namespace));

        let paid = UsageSliceKey::new("org1", "org2", true).to_ledger_key().unwrap();
        assert!(!paid.starts_with(&unpaid));
    }

    #[test]
    fn test_prefix_does_not_match_longer_party_names() {
        let unpaid = UsageSliceKey::unpaid_prefix("org1", "org2").unwrap();
        let other = UsageSliceKey::new("org1", "org22", false).to_ledger_key().unwrap();
        assert!(!other.starts_with(&unpaid));
    }

    #[test]
    fn test_key_parse_roundtrip() {
        let key = UsageSliceKey::new("org1", "org2", true);
        let parsed = UsageSliceKey::from_ledger_key(&key.to_ledger_key().unwrap()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_split_composite_key() {
        let key = create_composite_key("Asset", &["a", "", "c"]).unwrap();
        let (object_type, attributes) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, "Asset");
        assert_eq!(attributes, vec!["a", "", "c"]);

        assert!(split_composite_key("plain-key").is_err());
    }

    #[test]
    fn test_reserved_runes_rejected() {
        for bad in ["org\u{0}1", "org\u{10FFFF}"] {
            let err = create_composite_key("UsageSlice", &[bad]).unwrap_err();
            assert!(matches!(
                err,
                UsageLedgerError::Ledger(LedgerError::InvalidKeyAttribute { .. })
            ));
        }
        assert!(create_composite_key("", &["org1"]).is_err());
    }

    #[test]
    fn test_wrong_object_type_rejected() {
        let key = create_composite_key("Asset", &["org1", "org2", "false"]).unwrap();
        assert!(UsageSliceKey::from_ledger_key(&key).is_err());
    }
}
