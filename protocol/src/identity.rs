//! # Identities
//!
//! Every party the protocol talks about (administrator, authorized signer,
//! vault, badge token, holder, registry, instance) is a 32-byte
//! [`Identity`]. For key-backed parties it is the raw Ed25519 verifying
//! key; for registries and instances it is a BLAKE3 derivation that nobody
//! holds a secret key for.
//!
//! Identities serialize as lowercase hex strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::IDENTITY_LENGTH;
use crate::crypto::hash::blake3_hash_multi;
use crate::crypto::keys::PublicKey;

/// Errors when parsing an identity from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity is not valid hex")]
    InvalidHex,

    #[error("identity must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte protocol identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity([u8; IDENTITY_LENGTH]);

impl Identity {
    /// The all-zero identity. Used as the "nobody" placeholder. It decodes to
    /// a small-order point, which strict verification rejects.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LENGTH]);

    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LENGTH] {
        &self.0
    }

    /// Derive an identity by hashing a domain tag followed by fixed-width
    /// parts.
    ///
    /// ```
    /// use iou_protocol::identity::Identity;
    ///
    /// let a = Identity::derive(b"tag", &[b"registry", &0u64.to_be_bytes()]);
    /// let b = Identity::derive(b"tag", &[b"registry", &1u64.to_be_bytes()]);
    /// assert_ne!(a, b);
    /// ```
    pub fn derive(domain: &[u8], parts: &[&[u8]]) -> Self {
        let mut all: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        all.push(domain);
        all.extend_from_slice(parts);
        Self(blake3_hash_multi(&all))
    }

    /// Interpret this identity as an Ed25519 public key.
    pub fn as_public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.0)
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex. An optional `0x` prefix is accepted.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed).map_err(|_| IdentityError::InvalidHex)?;
        let arr: [u8; IDENTITY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<PublicKey> for Identity {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl From<[u8; IDENTITY_LENGTH]> for Identity {
    fn from(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..16])
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;

    #[test]
    fn hex_roundtrip() {
        let id = Identity::from_bytes([0xAB; 32]);
        assert_eq!(Identity::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(format!("0x{}", id).parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            Identity::from_hex("abcd"),
            Err(IdentityError::InvalidLength(2))
        );
        assert_eq!(Identity::from_hex("zz"), Err(IdentityError::InvalidHex));
    }

    #[test]
    fn public_key_identity_matches_bytes() {
        let kp = Keypair::generate();
        let id = kp.identity();
        assert_eq!(id.as_bytes(), kp.public_key().as_bytes());
        assert_eq!(id.as_public_key(), kp.public_key());
    }

    #[test]
    fn derive_is_domain_separated() {
        let a = Identity::derive(b"one", &[b"x"]);
        let b = Identity::derive(b"two", &[b"x"]);
        assert_ne!(a, b);
        assert_eq!(a, Identity::derive(b"one", &[b"x"]));
    }

    #[test]
    fn serde_as_hex_string() {
        let id = Identity::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
