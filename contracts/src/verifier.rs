//! Signature verification seam.
//!
//! Instances never call into the crypto crate directly. They hold a
//! `dyn SignatureVerifier`, which in production is [`Ed25519Verifier`] and
//! in tests can be anything deterministic.

use iou_protocol::crypto::keys::Signature;
use iou_protocol::crypto::signatures::verify_as;
use iou_protocol::Identity;

/// Checks that `signature` was produced by `expected_signer` over exactly
/// `message`.
///
/// Implementations must be pure and fail closed: malformed keys or
/// signatures return `false`, never panic.
pub trait SignatureVerifier: Send + Sync {
    /// `true` iff the signature is valid for this signer and message.
    fn verify(&self, message: &[u8], signature: &Signature, expected_signer: &Identity) -> bool;
}

/// Strict Ed25519 verification where the signer identity is the raw
/// verifying key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &Signature, expected_signer: &Identity) -> bool {
        verify_as(expected_signer, message, signature)
    }
}
