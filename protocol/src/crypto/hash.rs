//! # Hashing Utilities
//!
//! BLAKE3 is the only hash the IOU protocol uses. Authorization digests and
//! derived identities (registries, instances) are all BLAKE3 over a
//! domain-tagged byte string.
//!
//! Domain tags live in [`crate::config`] and are fed in as the first part of
//! the input. Fixed-width encoding of every following part means no two
//! distinct tuples can produce the same byte string.

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use iou_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"IOU protocol");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Same result as hashing the concatenation, minus the temporary buffer.
/// Used for composite payloads like `(domain || instance || holder || ...)`.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
