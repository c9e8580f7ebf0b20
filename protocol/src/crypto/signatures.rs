//! # Digital Signatures
//!
//! Ed25519 signing and verification for issuance authorizations.
//!
//! The off-chain signer calls [`sign`]; instances call [`verify_as`] with
//! the registry's current signer identity. Verification is strict
//! (`verify_strict`): small-order keys and malleable signatures are
//! rejected.

use super::keys::{Keypair, PublicKey, Signature};
use crate::identity::Identity;

/// Sign a message with a keypair.
///
/// ```
/// use iou_protocol::crypto::{Keypair, sign, verify};
///
/// let keypair = Keypair::generate();
/// let signature = sign(&keypair, b"issue");
/// assert!(verify(&keypair.public_key(), b"issue", &signature));
/// ```
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify a signature against a public key. `false` on any failure.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verify a signature against an identity.
///
/// Identities that are not usable verifying keys ([`Identity::ZERO`], bytes
/// off the curve) fail closed and never verify anything.
pub fn verify_as(signer: &Identity, message: &[u8], signature: &Signature) -> bool {
    signer.as_public_key().verify(message, signature)
}
