//! # Protocol Configuration & Constants
//!
//! Every magic number in the IOU protocol lives here. If you're hardcoding a
//! constant somewhere else, move it here.
//!
//! Domain tags are part of the signed byte format. Changing one invalidates
//! every authorization an off-chain signer has already handed out, so treat
//! them as frozen once a registry is live.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol fingerprint. Embedded in the authorization domain tag so that
/// signatures from unrelated systems can never collide with ours.
pub const PROTOCOL_FINGERPRINT: &str = "IOU-PROTOCOL-V1";

/// Crate-level protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Domain Separation
// ---------------------------------------------------------------------------

/// Prefix of every issuance authorization before hashing.
pub const AUTHORIZATION_DOMAIN: &[u8] = b"IOU-PROTOCOL-V1/issue";

/// Prefix used when deriving an instance identity from its registry and
/// sequence number.
pub const INSTANCE_ID_DOMAIN: &[u8] = b"IOU-PROTOCOL-V1/instance";

/// Prefix used when deriving a registry identity.
pub const REGISTRY_ID_DOMAIN: &[u8] = b"IOU-PROTOCOL-V1/registry";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Identity length in bytes. Signer identities are raw Ed25519 verifying
/// keys, so this matches the verifying key length.
pub const IDENTITY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Width of a big-endian encoded `U256` in the canonical message.
pub const U256_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Ledger Parameters
// ---------------------------------------------------------------------------

/// Nonce the first issuance on an instance must carry. Afterwards every
/// nonce must be strictly greater than the last accepted one; gaps are
/// fine.
pub const INITIAL_NONCE: u64 = 0;

/// First sequence id a registry hands out.
pub const INITIAL_SEQUENCE_ID: u64 = 0;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Default lifetime of an authorization produced by the operator tooling
/// when the caller gives no explicit expiry. Five minutes.
pub const DEFAULT_AUTHORIZATION_TTL: Duration = Duration::from_secs(300);

/// How long the access gate waits on the badge oracle before reporting the
/// query as failed.
pub const DEFAULT_CREDENTIAL_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
