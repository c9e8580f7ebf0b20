//! # Access Gate
//!
//! Decides whether a caller may provision a new instance by asking an
//! external balance oracle how much of the badge credential the caller
//! holds.
//!
//! The oracle is the one piece of real I/O in the protocol. An oracle that
//! errors or stalls past the configured timeout produces
//! [`IouError::CredentialQueryFailed`], never a silent `false`: "we could not
//! tell" and "you do not qualify" are different answers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iou_protocol::config::DEFAULT_CREDENTIAL_QUERY_TIMEOUT;
use iou_protocol::{Identity, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::IouError;

/// Holding threshold required to provision an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRequirement {
    /// Token contract of the badge credential.
    #[serde(rename = "token")]
    pub credential_token: Identity,
    /// Token id within that contract.
    #[serde(rename = "id")]
    pub credential_id: U256,
    /// Minimum balance the caller must hold.
    #[serde(rename = "amount")]
    pub min_amount: U256,
}

impl BadgeRequirement {
    /// Convenience constructor.
    pub fn new(credential_token: Identity, credential_id: U256, min_amount: U256) -> Self {
        Self {
            credential_token,
            credential_id,
            min_amount,
        }
    }
}

/// Failure reported by a balance oracle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle could not be reached.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// External balance oracle for badge credentials.
///
/// A zero balance is `Ok(U256::zero())`, not an error.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Balance of `(token, id)` held by `holder`.
    async fn balance_of(
        &self,
        holder: &Identity,
        token: &Identity,
        id: U256,
    ) -> Result<U256, OracleError>;
}

/// Badge-credential gate in front of instance provisioning.
#[derive(Clone)]
pub struct AccessGate {
    oracle: Arc<dyn BalanceOracle>,
    timeout: Duration,
}

impl AccessGate {
    /// Gate backed by `oracle`, with the default query timeout.
    pub fn new(oracle: Arc<dyn BalanceOracle>) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_CREDENTIAL_QUERY_TIMEOUT,
        }
    }

    /// Override how long a credential query may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured query timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `Ok(true)` iff `identity` holds at least `requirement.min_amount` of
    /// the badge credential.
    ///
    /// # Errors
    ///
    /// Returns [`IouError::CredentialQueryFailed`] if the oracle errors or
    /// does not answer within the timeout.
    pub async fn check(
        &self,
        identity: &Identity,
        requirement: &BadgeRequirement,
    ) -> Result<bool, IouError> {
        let query = self.oracle.balance_of(
            identity,
            &requirement.credential_token,
            requirement.credential_id,
        );

        let balance = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(balance)) => balance,
            Ok(Err(e)) => return Err(IouError::CredentialQueryFailed(e.to_string())),
            Err(_) => {
                return Err(IouError::CredentialQueryFailed(format!(
                    "no answer within {}ms",
                    self.timeout.as_millis()
                )))
            }
        };

        tracing::debug!(
            caller = %identity,
            token = %requirement.credential_token,
            id = %requirement.credential_id,
            %balance,
            required = %requirement.min_amount,
            "credential balance queried"
        );

        Ok(balance >= requirement.min_amount)
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// In-memory oracle
// ---------------------------------------------------------------------------

/// Badge balances kept in memory. Stands in for the real credential token in
/// dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryBadgeLedger {
    balances: RwLock<HashMap<(Identity, Identity, U256), U256>>,
}

impl InMemoryBadgeLedger {
    /// Empty ledger; every balance is zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `(token, id)` to `holder`. Saturates at `U256::MAX`.
    pub fn mint(&self, holder: Identity, token: Identity, id: U256, amount: U256) {
        let mut balances = self.balances.write();
        let entry = balances.entry((holder, token, id)).or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    /// Debit up to `amount` of `(token, id)` from `holder`. Floors at zero.
    pub fn burn(&self, holder: Identity, token: Identity, id: U256, amount: U256) {
        let mut balances = self.balances.write();
        if let Some(entry) = balances.get_mut(&(holder, token, id)) {
            *entry = entry.saturating_sub(amount);
        }
    }

    /// Current balance, zero if never minted.
    pub fn balance(&self, holder: &Identity, token: &Identity, id: U256) -> U256 {
        self.balances
            .read()
            .get(&(*holder, *token, id))
            .copied()
            .unwrap_or_else(U256::zero)
    }
}

#[async_trait]
impl BalanceOracle for InMemoryBadgeLedger {
    async fn balance_of(
        &self,
        holder: &Identity,
        token: &Identity,
        id: U256,
    ) -> Result<U256, OracleError> {
        Ok(self.balance(holder, token, id))
    }
}
