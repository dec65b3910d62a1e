//! A sha-256 content address, used wherever the system needs identical
//! content to yield an identical id (memory deduplication, operator id
//! derivation from `endpoint|method`).

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// A 32-byte sha-256 digest with ergonomic hex/base64 codecs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// The all-zero hash, useful as a sentinel "no content yet" value.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Hash arbitrary bytes.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(digest.into())
    }

    /// Hash bytes under a domain separation tag, so the same bytes hashed
    /// for two different purposes never collide.
    #[must_use]
    pub fn hash_with_domain(domain: &str, data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash a JSON-serializable value via its canonical (key-sorted) form.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn hash_json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        let canonical = serde_json::to_value(value)?;
        let sorted = sort_json_keys(&canonical);
        let bytes = serde_json::to_vec(&sorted)?;
        Ok(Self::hash(&bytes))
    }

    /// Wrap a raw 32-byte digest without hashing.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as a lowercase hex string.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Render the first `n` hex characters (e.g. for a short display id).
    #[must_use]
    pub fn to_hex_prefix(self, n: usize) -> String {
        let full = self.to_hex();
        full.chars().take(n).collect()
    }

    /// Parse from a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidHex`] or [`CryptoError::WrongLength`].
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Render as URL-safe base64 (no padding).
    #[must_use]
    pub fn to_base64(self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse from URL-safe base64 (no padding).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidBase64`] or [`CryptoError::WrongLength`].
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::WrongLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

fn sort_json_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_json_keys(&map[&k]));
            }
            serde_json::Value::Object(sorted)
        },
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_json_keys).collect())
        },
        other => other.clone(),
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex_prefix(8))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_hashes_equal() {
        assert_eq!(ContentHash::hash(b"abc"), ContentHash::hash(b"abc"));
        assert_ne!(ContentHash::hash(b"abc"), ContentHash::hash(b"abd"));
    }

    #[test]
    fn domain_separation_changes_output() {
        assert_ne!(
            ContentHash::hash_with_domain("memory", b"x"),
            ContentHash::hash_with_domain("operator", b"x")
        );
    }

    #[test]
    fn hex_round_trip() {
        let h = ContentHash::hash(b"round trip me");
        let hex = h.to_hex();
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), h);
    }

    #[test]
    fn base64_round_trip() {
        let h = ContentHash::hash(b"b64");
        let encoded = h.to_base64();
        assert_eq!(ContentHash::from_base64(&encoded).unwrap(), h);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(
            ContentHash::from_hex("deadbeef"),
            Err(CryptoError::WrongLength(_))
        ));
    }

    #[test]
    fn json_hash_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(
            ContentHash::hash_json(&a).unwrap(),
            ContentHash::hash_json(&b).unwrap()
        );
    }

    #[test]
    fn serde_round_trip_is_hex_string() {
        let h = ContentHash::hash(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
