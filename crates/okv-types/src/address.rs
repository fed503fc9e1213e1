//! Record addressing and segment validation.
//!
//! Every stored record is identified by an [`Address`]: a (namespace, id, key)
//! triple. Namespaces isolate scopes (a bucket, a directory, a sub-map), ids
//! group the versions of one logical object, and keys name a single version
//! slot. A key of [`DEFAULT_KEY`] is reserved by the appender layer for
//! latest-pointer records.
//!
//! Valid segments:
//! - Must be non-empty
//! - Must not contain whitespace, `/`, `\`, or `:` (the composite-key delimiter)
//! - Must not contain `..` (parent traversal)
//! - Must not start with `.`

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// The reserved version key used for latest-pointer records and as the
/// default when a caller does not name a key.
pub const DEFAULT_KEY: &str = "default";

/// Characters that are forbidden anywhere in an address segment.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '/', '\\', ':'];

/// Validate one address segment (namespace, id, or key).
///
/// `field` names the segment in error messages.
///
/// # Examples
///
/// ```
/// use okv_types::validate_segment;
///
/// assert!(validate_segment("namespace", "prod").is_ok());
/// assert!(validate_segment("namespace", "").is_err());
/// assert!(validate_segment("id", "a/b").is_err());
/// ```
pub fn validate_segment(field: &'static str, value: &str) -> Result<(), AddressError> {
    if value.is_empty() {
        return Err(AddressError::InvalidSegment {
            field,
            reason: format!("{field} must not be empty"),
        });
    }

    for ch in FORBIDDEN_CHARS {
        if value.contains(*ch) {
            return Err(AddressError::InvalidSegment {
                field,
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    // Must not contain `..` (parent traversal on filesystem backends).
    if value.contains("..") {
        return Err(AddressError::InvalidSegment {
            field,
            reason: "must not contain '..'".into(),
        });
    }

    // Hidden-file prefixes collide with backend bookkeeping entries.
    if value.starts_with('.') {
        return Err(AddressError::InvalidSegment {
            field,
            reason: "must not start with '.'".into(),
        });
    }

    Ok(())
}

/// The unique identity of one record slot: (namespace, id, key).
///
/// At most one live record exists per address at any time. Construction
/// validates all three segments, so backends only ever see well-formed
/// addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub namespace: String,
    pub id: String,
    pub key: String,
}

impl Address {
    /// Create a validated address.
    pub fn new(namespace: &str, id: &str, key: &str) -> Result<Self, AddressError> {
        validate_segment("namespace", namespace)?;
        validate_segment("id", id)?;
        validate_segment("key", key)?;
        Ok(Self {
            namespace: namespace.to_string(),
            id: id.to_string(),
            key: key.to_string(),
        })
    }

    /// Create the address of the latest-pointer slot for `id`: key is
    /// [`DEFAULT_KEY`].
    pub fn latest(namespace: &str, id: &str) -> Result<Self, AddressError> {
        Self::new(namespace, id, DEFAULT_KEY)
    }

    /// The composite string form `namespace:id:key`, used as a map key by
    /// in-memory backends.
    pub fn composite(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.id, self.key)
    }

    /// Returns `true` if this address names the reserved latest-pointer slot.
    pub fn is_pointer_slot(&self) -> bool {
        self.key == DEFAULT_KEY
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.id, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_address() {
        let addr = Address::new("prod", "hello", "world").unwrap();
        assert_eq!(addr.namespace, "prod");
        assert_eq!(addr.id, "hello");
        assert_eq!(addr.key, "world");
        assert_eq!(addr.composite(), "prod:hello:world");
    }

    #[test]
    fn latest_uses_default_key() {
        let addr = Address::latest("prod", "doc").unwrap();
        assert_eq!(addr.key, DEFAULT_KEY);
        assert!(addr.is_pointer_slot());
    }

    #[test]
    fn empty_segments_rejected() {
        assert!(Address::new("", "id", "key").is_err());
        assert!(Address::new("ns", "", "key").is_err());
        assert!(Address::new("ns", "id", "").is_err());
    }

    #[test]
    fn forbidden_characters_rejected() {
        assert!(Address::new("a/b", "id", "key").is_err());
        assert!(Address::new("ns", "a\\b", "key").is_err());
        assert!(Address::new("ns", "id", "a:b").is_err());
        assert!(Address::new("ns", "a b", "key").is_err());
    }

    #[test]
    fn traversal_and_dotfiles_rejected() {
        assert!(Address::new("ns", "..", "key").is_err());
        assert!(Address::new("ns", "id", ".hidden").is_err());
    }

    #[test]
    fn display_matches_composite() {
        let addr = Address::new("ns", "id", "key").unwrap();
        assert_eq!(addr.to_string(), addr.composite());
    }
}
