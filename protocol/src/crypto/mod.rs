//! # Cryptographic Primitives
//!
//! Everything signature- and hash-related in the IOU protocol flows through
//! here:
//!
//! - **Ed25519** for authorizations. The off-chain signer signs, instances
//!   verify.
//! - **BLAKE3** for authorization digests and identity derivation.
//!
//! These are thin, type-safe wrappers around audited crates. Nothing here is
//! home-grown.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, blake3_hash_multi};
pub use keys::{Keypair, PublicKey, Signature};
pub use signatures::{sign, verify, verify_as};
