//! Error taxonomy for registry and instance operations.
//!
//! Every fallible contract call returns [`IouError`]. None of them are
//! retried internally; the caller decides what to do next.

use iou_protocol::{Identity, U256};
use thiserror::Error;

/// Errors returned by the registry, access gate and instances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IouError {
    /// The caller is not the registry administrator.
    #[error("unauthorized: {caller} is not the registry administrator")]
    Unauthorized {
        /// The identity that attempted the call.
        caller: Identity,
    },

    /// The caller does not hold enough of the required badge credential.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The badge oracle could not be queried. Distinct from `AccessDenied`:
    /// this says nothing about the caller's actual balance.
    #[error("credential query failed: {0}")]
    CredentialQueryFailed(String),

    /// The nonce is not strictly greater than the last accepted one.
    #[error("invalid nonce: {nonce} is not above last accepted nonce {}", .last.map(|n| n.to_string()).unwrap_or_else(|| "none".into()))]
    InvalidNonce {
        /// The nonce presented.
        nonce: U256,
        /// The highest nonce accepted so far, if any.
        last: Option<U256>,
    },

    /// The authorization's expiry is in the past.
    #[error("signature expired at {expiry} (now {now})")]
    SignatureExpired {
        /// Expiry carried by the authorization (unix seconds).
        expiry: u64,
        /// Time at which the call was evaluated.
        now: u64,
    },

    /// The signature was not produced by the current authorized signer over
    /// this exact authorization.
    #[error("invalid signature")]
    InvalidSignature,

    /// The instance destination has already been set.
    #[error("destination already configured")]
    AlreadyConfigured,

    /// Redeem/burn asked for more than the caller holds.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount the caller tried to redeem or burn.
        requested: U256,
        /// Caller's outstanding balance.
        available: U256,
    },

    /// A ledger total would exceed `U256::MAX`.
    #[error("arithmetic overflow in ledger totals")]
    ArithmeticOverflow,
}

impl IouError {
    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            IouError::Unauthorized { .. } => "unauthorized",
            IouError::AccessDenied(_) => "access_denied",
            IouError::CredentialQueryFailed(_) => "credential_query_failed",
            IouError::InvalidNonce { .. } => "invalid_nonce",
            IouError::SignatureExpired { .. } => "signature_expired",
            IouError::InvalidSignature => "invalid_signature",
            IouError::AlreadyConfigured => "already_configured",
            IouError::InsufficientBalance { .. } => "insufficient_balance",
            IouError::ArithmeticOverflow => "arithmetic_overflow",
        }
    }
}
