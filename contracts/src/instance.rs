//! # Instance
//!
//! One issuance/redemption ledger per issuer/destination relationship.
//! Instances are only ever created by a [`Registry`](crate::registry::Registry).
//!
//! ## Lifecycle
//!
//! ```text
//! Provisioned ──set_destination (once)──▶ DestinationSet
//! ```
//!
//! `issue`, `redeem` and `burn` are legal in both states and never change
//! it. There is no terminal state.
//!
//! ## Issuance checks
//!
//! `issue` evaluates, in this order and before touching anything:
//!
//! 1. nonce strictly above the last accepted one, or exactly
//!    `INITIAL_NONCE` for the first issuance (`InvalidNonce`)
//! 2. `now <= expiry` (`SignatureExpired`)
//! 3. signature by the registry's current signer (`InvalidSignature`)
//!
//! A replayed authorization therefore always reports `InvalidNonce`, even
//! once it has also expired.
//!
//! ## Concurrency
//!
//! All mutable state sits behind one mutex. The nonce check and the totals
//! update happen in the same critical section, so two racing calls with the
//! same nonce produce exactly one success.

use std::collections::HashMap;
use std::sync::Arc;

use iou_protocol::config::INITIAL_NONCE;
use iou_protocol::crypto::keys::Signature;
use iou_protocol::time::Clock;
use iou_protocol::{Identity, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::authorization::IssuanceAuthorization;
use crate::error::IouError;
use crate::events::{Event, EventRecord, EventSink};
use crate::registry::SharedConfig;
use crate::verifier::SignatureVerifier;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Metadata fixed at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Human-readable name of the IOU.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Chain the IOU redeems into. Empty until the destination is set.
    pub destination_chain: String,
    /// Address on the destination chain. Empty until the destination is set.
    pub destination_address: String,
    /// Decimal precision on the destination chain.
    pub destination_decimals: u8,
    /// Registry that provisioned this instance.
    pub factory: Identity,
    /// Registry-assigned sequence number.
    pub sequence_id: U256,
}

/// Issuance and redemption totals plus replay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceLedger {
    /// Sum of every accepted issuance.
    pub issued_total: U256,
    /// Sum of every redemption and burn. Never exceeds `issued_total`.
    pub redeemed_total: U256,
    /// Highest accepted nonce, `None` before the first issuance.
    pub last_nonce: Option<U256>,
}

impl InstanceLedger {
    /// `issued_total - redeemed_total`.
    pub fn outstanding(&self) -> U256 {
        self.issued_total.saturating_sub(self.redeemed_total)
    }

    /// Whether `nonce` would pass the replay check: exactly
    /// `INITIAL_NONCE` first, then strictly above the last accepted one.
    pub fn accepts_nonce(&self, nonce: U256) -> bool {
        match self.last_nonce {
            Some(last) => nonce > last,
            None => nonce == U256::from(INITIAL_NONCE),
        }
    }
}

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Created; destination not yet set.
    Provisioned,
    /// Destination set. Further `set_destination` calls fail.
    DestinationSet,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Provisioned => write!(f, "Provisioned"),
            InstanceStatus::DestinationSet => write!(f, "DestinationSet"),
        }
    }
}

/// Everything an instance borrows from its registry.
#[derive(Clone)]
pub(crate) struct InstanceContext {
    pub(crate) config: SharedConfig,
    pub(crate) verifier: Arc<dyn SignatureVerifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<dyn EventSink>,
}

#[derive(Debug)]
struct InstanceState {
    descriptor: InstanceDescriptor,
    status: InstanceStatus,
    ledger: InstanceLedger,
    balances: HashMap<Identity, U256>,
}

/// A provisioned IOU ledger.
pub struct Instance {
    id: Identity,
    context: InstanceContext,
    state: Mutex<InstanceState>,
}

impl Instance {
    /// Build a fresh instance. If the descriptor already names a destination,
    /// the instance starts in `DestinationSet` and emits its one
    /// `DestinationUpdated` event here.
    pub(crate) fn provision(
        id: Identity,
        descriptor: InstanceDescriptor,
        context: InstanceContext,
    ) -> Self {
        let has_destination =
            !descriptor.destination_chain.is_empty() || !descriptor.destination_address.is_empty();

        let instance = Self {
            id,
            context,
            state: Mutex::new(InstanceState {
                status: if has_destination {
                    InstanceStatus::DestinationSet
                } else {
                    InstanceStatus::Provisioned
                },
                descriptor,
                ledger: InstanceLedger::default(),
                balances: HashMap::new(),
            }),
        };

        if has_destination {
            let state = instance.state.lock();
            instance.emit(Event::DestinationUpdated {
                chain: state.descriptor.destination_chain.clone(),
                address: state.descriptor.destination_address.clone(),
                decimals: state.descriptor.destination_decimals,
            });
        }

        instance
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Issue `amount` to `holder` against a signed authorization.
    ///
    /// # Errors
    ///
    /// [`IouError::InvalidNonce`], [`IouError::SignatureExpired`],
    /// [`IouError::InvalidSignature`] (checked in that order), or
    /// [`IouError::ArithmeticOverflow`]. On error nothing changes.
    pub fn issue(
        &self,
        holder: Identity,
        amount: U256,
        nonce: U256,
        expiry: u64,
        signature: &Signature,
    ) -> Result<(), IouError> {
        let authorization = IssuanceAuthorization::new(self.id, holder, amount, nonce, expiry);
        // Resolved once; a rotation mid-call does not change what we check against.
        let signer = self.context.config.signer();

        let mut state = self.state.lock();

        if !state.ledger.accepts_nonce(nonce) {
            return Err(self.rejected(
                "issue",
                IouError::InvalidNonce {
                    nonce,
                    last: state.ledger.last_nonce,
                },
            ));
        }

        let now = self.context.clock.now();
        if now > expiry {
            return Err(self.rejected("issue", IouError::SignatureExpired { expiry, now }));
        }

        if !self
            .context
            .verifier
            .verify(&authorization.digest(), signature, &signer)
        {
            return Err(self.rejected("issue", IouError::InvalidSignature));
        }

        let issued_total = state
            .ledger
            .issued_total
            .checked_add(amount)
            .ok_or_else(|| self.rejected("issue", IouError::ArithmeticOverflow))?;
        let current = state.balances.get(&holder).copied().unwrap_or_else(U256::zero);
        let holder_balance = current
            .checked_add(amount)
            .ok_or_else(|| self.rejected("issue", IouError::ArithmeticOverflow))?;

        state.ledger.issued_total = issued_total;
        state.ledger.last_nonce = Some(nonce);
        state.balances.insert(holder, holder_balance);

        tracing::info!(
            instance = %self.id,
            %holder,
            %amount,
            %nonce,
            expiry,
            "issued"
        );
        self.emit(Event::Issued {
            holder,
            amount,
            nonce,
            expiry,
        });
        Ok(())
    }

    /// Redeem `amount` of the caller's outstanding balance into the
    /// destination-chain representation.
    ///
    /// # Errors
    ///
    /// [`IouError::InsufficientBalance`] if the caller holds less than
    /// `amount`.
    pub fn redeem(&self, caller: Identity, amount: U256) -> Result<(), IouError> {
        self.debit("redeem", caller, amount, Event::Redeemed {
            holder: caller,
            amount,
        })
    }

    /// Cancel `amount` of the caller's outstanding balance.
    ///
    /// Same precondition and accounting as [`redeem`](Self::redeem); only
    /// the emitted event differs.
    pub fn burn(&self, caller: Identity, amount: U256) -> Result<(), IouError> {
        self.debit("burn", caller, amount, Event::Burned {
            holder: caller,
            amount,
        })
    }

    /// Set the destination. Allowed once per instance lifetime, and not at
    /// all if the destination was supplied at provisioning.
    ///
    /// # Errors
    ///
    /// [`IouError::AlreadyConfigured`] on any second attempt.
    pub fn set_destination(
        &self,
        chain: impl Into<String>,
        address: impl Into<String>,
        decimals: u8,
    ) -> Result<(), IouError> {
        let mut state = self.state.lock();
        if state.status == InstanceStatus::DestinationSet {
            return Err(self.rejected("set_destination", IouError::AlreadyConfigured));
        }

        let chain = chain.into();
        let address = address.into();
        state.descriptor.destination_chain = chain.clone();
        state.descriptor.destination_address = address.clone();
        state.descriptor.destination_decimals = decimals;
        state.status = InstanceStatus::DestinationSet;

        tracing::info!(instance = %self.id, %chain, %address, decimals, "destination set");
        self.emit(Event::DestinationUpdated {
            chain,
            address,
            decimals,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// This instance's identity.
    pub fn id(&self) -> Identity {
        self.id
    }

    /// Snapshot of the descriptor.
    pub fn descriptor(&self) -> InstanceDescriptor {
        self.state.lock().descriptor.clone()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> InstanceStatus {
        self.state.lock().status
    }

    /// Snapshot of the ledger totals and replay state.
    pub fn ledger(&self) -> InstanceLedger {
        self.state.lock().ledger
    }

    /// Issued minus redeemed/burned, across all holders.
    pub fn outstanding(&self) -> U256 {
        self.state.lock().ledger.outstanding()
    }

    /// Outstanding balance of one holder.
    pub fn balance_of(&self, holder: &Identity) -> U256 {
        self.state
            .lock()
            .balances
            .get(holder)
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// The authorization the signer must sign for this issuance.
    pub fn authorization_message(
        &self,
        holder: Identity,
        amount: U256,
        nonce: U256,
        expiry: u64,
    ) -> IssuanceAuthorization {
        IssuanceAuthorization::new(self.id, holder, amount, nonce, expiry)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn debit(
        &self,
        op: &'static str,
        caller: Identity,
        amount: U256,
        event: Event,
    ) -> Result<(), IouError> {
        let mut state = self.state.lock();

        let available = state.balances.get(&caller).copied().unwrap_or_else(U256::zero);
        if amount > available {
            return Err(self.rejected(
                op,
                IouError::InsufficientBalance {
                    requested: amount,
                    available,
                },
            ));
        }
        // Holder balances sum to `issued_total - redeemed_total`, so this
        // cannot push redeemed past issued.
        let redeemed_total = state
            .ledger
            .redeemed_total
            .checked_add(amount)
            .filter(|total| *total <= state.ledger.issued_total)
            .ok_or_else(|| self.rejected(op, IouError::ArithmeticOverflow))?;

        state.ledger.redeemed_total = redeemed_total;
        state.balances.insert(caller, available - amount);

        tracing::info!(instance = %self.id, holder = %caller, %amount, op, "debited");
        // Still under the state lock, so sink order matches ledger order.
        self.emit(event);
        Ok(())
    }

    fn emit(&self, event: Event) {
        self.context.events.emit(EventRecord {
            emitter: self.id,
            event,
        });
    }

    fn rejected(&self, op: &'static str, err: IouError) -> IouError {
        tracing::warn!(instance = %self.id, op, kind = err.kind(), error = %err, "rejected");
        err
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
