use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for a stored object.
///
/// An `ObjectId` is a 32-byte BLAKE3 digest. Whoever produces an object is
/// responsible for computing its id (see `cask-crypto`); backends index by
/// the id as supplied and do not re-verify the id/payload correspondence.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Hash raw bytes into an `ObjectId` (plain BLAKE3, no domain tag).
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a digest that was computed elsewhere.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The null id (all zeros), used as a "no object" sentinel.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` for the null sentinel.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form (first 8 characters), for logs and `Debug`.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| TypeError::InvalidLength {
            expected: 32,
            actual: v.len(),
        })?;
        Ok(Self(digest))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ObjectId {
    fn from(digest: [u8; 32]) -> Self {
        Self(digest)
    }
}

impl From<ObjectId> for [u8; 32] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(ObjectId::from_bytes(b"abc"), ObjectId::from_bytes(b"abc"));
    }

    #[test]
    fn distinct_content_distinct_ids() {
        assert_ne!(ObjectId::from_bytes(b"abc"), ObjectId::from_bytes(b"abd"));
    }

    #[test]
    fn null_sentinel() {
        assert!(ObjectId::null().is_null());
        assert!(!ObjectId::from_bytes(b"x").is_null());
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_bytes(b"roundtrip");
        assert_eq!(ObjectId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(
            ObjectId::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert!(matches!(
            ObjectId::from_hex("abcd"),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 2
            })
        ));
    }

    #[test]
    fn display_is_full_hex() {
        let id = ObjectId::from_bytes(b"display");
        assert_eq!(format!("{id}").len(), 64);
    }

    #[test]
    fn debug_uses_short_hex() {
        let id = ObjectId::from_bytes(b"debug");
        let dbg = format!("{id:?}");
        assert!(dbg.starts_with("ObjectId("));
        assert!(dbg.contains(&id.short_hex()));
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::from_bytes(b"serde");
        let json = serde_json::to_string(&id).unwrap();
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn digest_conversions() {
        let digest = [7u8; 32];
        let id = ObjectId::from_digest(digest);
        assert_eq!(<[u8; 32]>::from(id), digest);
        assert_eq!(ObjectId::from(digest), id);
    }
}
