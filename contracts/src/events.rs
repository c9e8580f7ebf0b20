//! # Domain Events
//!
//! Every successful state change emits exactly one [`Event`]; failed calls
//! emit nothing. Events are delivered to an [`EventSink`] supplied when the
//! registry is built. External indexers consume them from there.
//!
//! [`EventLog`] is the in-memory sink used by default, by the operator
//! tooling's dry runs, and by tests.

use iou_protocol::{Identity, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::access_gate::BadgeRequirement;

/// A domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Registry: the authorized signer was replaced.
    SignerUpdated {
        /// The new signer.
        signer: Identity,
    },
    /// Registry: the vault was replaced.
    VaultUpdated {
        /// The new vault.
        vault: Identity,
    },
    /// Registry: the badge requirement was replaced.
    BadgeUpdated {
        /// The new requirement.
        badge: BadgeRequirement,
    },
    /// Registry: a new instance was provisioned.
    InstanceCreated {
        /// Identity of the new instance.
        instance: Identity,
        /// Caller that provisioned it.
        creator: Identity,
        /// Registry-assigned sequence number.
        sequence_id: U256,
    },
    /// Instance: the destination was set. Emitted at most once per instance.
    DestinationUpdated {
        /// Destination chain name.
        chain: String,
        /// Address on the destination chain.
        address: String,
        /// Decimal precision on the destination chain.
        decimals: u8,
    },
    /// Instance: value was issued against a signed authorization.
    Issued {
        /// Credited holder.
        holder: Identity,
        /// Amount issued.
        amount: U256,
        /// Nonce consumed.
        nonce: U256,
        /// Expiry carried by the authorization.
        expiry: u64,
    },
    /// Instance: a holder converted outstanding balance to the destination.
    Redeemed {
        /// Holder that redeemed.
        holder: Identity,
        /// Amount redeemed.
        amount: U256,
    },
    /// Instance: a holder cancelled outstanding balance.
    Burned {
        /// Holder that burned.
        holder: Identity,
        /// Amount burned.
        amount: U256,
    },
}

impl Event {
    /// Event name, matching the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SignerUpdated { .. } => "SignerUpdated",
            Event::VaultUpdated { .. } => "VaultUpdated",
            Event::BadgeUpdated { .. } => "BadgeUpdated",
            Event::InstanceCreated { .. } => "InstanceCreated",
            Event::DestinationUpdated { .. } => "DestinationUpdated",
            Event::Issued { .. } => "Issued",
            Event::Redeemed { .. } => "Redeemed",
            Event::Burned { .. } => "Burned",
        }
    }
}

/// An event together with the registry or instance that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identity of the emitting registry or instance.
    pub emitter: Identity,
    /// The event itself.
    pub event: Event,
}

/// Destination for emitted events.
///
/// # Reentrancy
///
/// `emit` runs while the emitter still holds its state lock (the
/// registry's configuration or catalog lock, or the instance's ledger
/// lock), so events from one emitter reach the sink in the order the
/// changes were applied. A sink must not call back into the registry or
/// instance that emitted the record: the locks are not reentrant and the
/// call would deadlock. Hand records off to another thread or queue if
/// they need to be acted on.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Called exactly once per successful operation,
    /// after all checks have passed.
    fn emit(&self, record: EventRecord);
}

/// Append-only in-memory event log.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Mutex<Vec<EventRecord>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in emission order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Events emitted by one registry or instance, in order.
    pub fn events_from(&self, emitter: &Identity) -> Vec<Event> {
        self.records
            .lock()
            .iter()
            .filter(|r| &r.emitter == emitter)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// `true` if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&self, record: EventRecord) {
        self.records.lock().push(record);
    }
}
