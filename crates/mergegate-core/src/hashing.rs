// crates/mergegate-core/src/hashing.rs
// ============================================================================
// Module: Canonical Encoding & Hashing
// Description: RFC 8785 JSON canonicalization, trailing-newline framing, and
//              content hashing.
// Purpose: Provide the single byte-stable encoding every other component
//          hashes, diffs, and writes to disk.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Canonical encoding is load-bearing: plan hashes, artifact hashes, and
//! cross-run determinism all derive from it. `serde_jcs` already implements
//! RFC 8785 (recursive key sort, ECMAScript-style number normalization); this
//! module adds the specification's own requirement of a trailing newline on
//! every top-level encoding and a size-limited hashing variant for defensive
//! use by the deliverables writer.

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Errors raised while canonically encoding or hashing a value.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value could not be canonicalized (e.g. a non-finite float, or a
    /// structure `serde_json` cannot represent).
    #[error("failed to canonicalize value: {0}")]
    Canonicalization(String),
    /// The encoded payload exceeded the caller-supplied size limit.
    #[error("encoded payload of {actual_bytes} bytes exceeds limit of {max_bytes} bytes")]
    SizeLimitExceeded {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual encoded size in bytes.
        actual_bytes: usize,
    },
}

/// Supported hash algorithms for merge-train artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

/// Default hash algorithm.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self { algorithm, value: hex_encode(bytes) }
    }
}

/// Returns canonical JSON bytes for a serializable value, with a trailing
/// newline appended to the top-level encoding.
///
/// # Errors
///
/// Returns [`EncodeError::Canonicalization`] when serialization fails (for
/// example, the value contains a non-finite float).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = serde_jcs::to_vec(value).map_err(|err| EncodeError::Canonicalization(err.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Encodes a value canonically and rejects payloads over `max_bytes`.
///
/// # Errors
///
/// Returns [`EncodeError::Canonicalization`] when serialization fails, or
/// [`EncodeError::SizeLimitExceeded`] when the encoded size exceeds the limit.
pub fn encode_with_limit<T: Serialize + ?Sized>(value: &T, max_bytes: usize) -> Result<Vec<u8>, EncodeError> {
    let bytes = encode(value)?;
    if bytes.len() > max_bytes {
        return Err(EncodeError::SizeLimitExceeded { max_bytes, actual_bytes: bytes.len() });
    }
    Ok(bytes)
}

/// Hashes a serializable value's canonical encoding.
///
/// # Errors
///
/// Returns [`EncodeError::Canonicalization`] when serialization fails.
pub fn hash_canonical<T: Serialize + ?Sized>(algorithm: HashAlgorithm, value: &T) -> Result<HashDigest, EncodeError> {
    let bytes = encode(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            HashDigest::new(HashAlgorithm::Sha256, &hasher.finalize())
        }
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::Map;
    use serde_json::Value;
    use serde_json::json;

    use super::*;

    #[test]
    fn s6_canonical_round_trip() {
        let value = json!({"z": 1, "a": [3, 1, 2], "m": {"b": 2, "a": 1}});
        let bytes = encode(&value).expect("encode");
        assert_eq!(bytes, b"{\"a\":[3,1,2],\"m\":{\"a\":1,\"b\":2},\"z\":1}\n".to_vec());
    }

    #[test]
    fn encode_is_idempotent_under_reparse() {
        let value = json!({"b": 2, "a": [1, 2, 3]});
        let once = encode(&value).expect("encode once");
        let reparsed: Value = serde_json::from_slice(&once).expect("reparse");
        let twice = encode(&reparsed).expect("encode twice");
        assert_eq!(once, twice);
    }

    #[test]
    fn key_order_does_not_affect_hash() {
        let mut map_a = Map::new();
        map_a.insert("b".to_string(), json!(2));
        map_a.insert("a".to_string(), json!(1));

        let mut map_b = Map::new();
        map_b.insert("a".to_string(), json!(1));
        map_b.insert("b".to_string(), json!(2));

        let hash_a = hash_canonical(HashAlgorithm::Sha256, &Value::Object(map_a)).expect("hash a");
        let hash_b = hash_canonical(HashAlgorithm::Sha256, &Value::Object(map_b)).expect("hash b");
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn numeric_representation_is_normalized() {
        let hash_a = hash_canonical(HashAlgorithm::Sha256, &json!(1.0)).expect("hash a");
        let hash_b = hash_canonical(HashAlgorithm::Sha256, &json!(1)).expect("hash b");
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn rejects_nan() {
        #[derive(Serialize)]
        struct Wrapper {
            value: f64,
        }
        let err = encode(&Wrapper { value: f64::NAN }).unwrap_err();
        assert!(matches!(err, EncodeError::Canonicalization(_)));
    }

    #[test]
    fn size_limit_rejects_oversized_payload() {
        let value = json!({"data": "x".repeat(64)});
        let err = encode_with_limit(&value, 16).unwrap_err();
        assert!(matches!(err, EncodeError::SizeLimitExceeded { .. }));
    }

    #[test]
    fn size_limit_exact_boundary_passes() {
        let value = json!({"d": "x"});
        let bytes = encode(&value).expect("encode");
        let result = encode_with_limit(&value, bytes.len());
        assert!(result.is_ok());
    }
}
