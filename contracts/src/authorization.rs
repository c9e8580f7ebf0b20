//! # Issuance Authorizations
//!
//! The off-chain signer approves an issuance by signing the BLAKE3 digest of
//!
//! ```text
//! AUTHORIZATION_DOMAIN || instance (32) || holder (32)
//!     || amount (32, BE) || nonce (32, BE) || expiry (8, BE)
//! ```
//!
//! Every field is fixed width, so the encoding is injective. Binding the
//! instance identity means a signature for one instance is worthless on any
//! other; binding the nonce and expiry is what makes replay and staleness
//! checks meaningful.

use iou_protocol::config::{AUTHORIZATION_DOMAIN, U256_BYTES};
use iou_protocol::crypto::blake3_hash_multi;
use iou_protocol::crypto::keys::{Keypair, Signature};
use iou_protocol::{Identity, U256};
use serde::{Deserialize, Serialize};

/// The tuple an issuance signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceAuthorization {
    /// Instance the value is issued on.
    pub instance: Identity,
    /// Holder credited with the value.
    pub holder: Identity,
    /// Amount to issue.
    pub amount: U256,
    /// Per-instance replay counter.
    pub nonce: U256,
    /// Last unix second at which the authorization is still valid.
    pub expiry: u64,
}

impl IssuanceAuthorization {
    /// Bundle the fields.
    pub fn new(instance: Identity, holder: Identity, amount: U256, nonce: U256, expiry: u64) -> Self {
        Self {
            instance,
            holder,
            amount,
            nonce,
            expiry,
        }
    }

    /// 32-byte digest of the canonical encoding. This is the exact message
    /// the signer signs and instances verify.
    pub fn digest(&self) -> [u8; 32] {
        let amount = u256_be(self.amount);
        let nonce = u256_be(self.nonce);
        let expiry = self.expiry.to_be_bytes();
        blake3_hash_multi(&[
            AUTHORIZATION_DOMAIN,
            self.instance.as_bytes(),
            self.holder.as_bytes(),
            &amount,
            &nonce,
            &expiry,
        ])
    }

    /// Sign as the off-chain authorized signer.
    pub fn sign(&self, signer: &Keypair) -> Signature {
        signer.sign(&self.digest())
    }
}

/// An authorization plus its signature, in the form the operator tooling
/// hands to holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAuthorization {
    /// The signed fields.
    #[serde(flatten)]
    pub authorization: IssuanceAuthorization,
    /// Identity that produced the signature.
    pub signer: Identity,
    /// Hex-encoded Ed25519 signature over [`IssuanceAuthorization::digest`].
    pub signature: String,
}

impl SignedAuthorization {
    /// Sign `authorization` with `signer`.
    pub fn create(authorization: IssuanceAuthorization, signer: &Keypair) -> Self {
        Self {
            signature: authorization.sign(signer).to_hex(),
            signer: signer.identity(),
            authorization,
        }
    }
}

fn u256_be(value: U256) -> [u8; U256_BYTES] {
    let mut out = [0u8; U256_BYTES];
    value.to_big_endian(&mut out);
    out
}
