//! # IOU Contracts
//!
//! The stateful half of the IOU protocol:
//!
//! - **Registry**: administrator-owned configuration (authorized signer,
//!   vault, badge requirement) and the catalog of provisioned instances.
//! - **Access Gate**: badge-credential check that decides who may
//!   provision a new instance.
//! - **Instance**: one issuance/redemption ledger per issuer/destination
//!   relationship, guarded by signed, expiring, non-replayable
//!   authorizations.
//! - **Verifier**: the signature check instances delegate to, injectable
//!   so tests can run without real keys.
//!
//! ## Design Principles
//!
//! 1. Every check runs before any mutation. A failed call leaves state and
//!    the event log exactly as they were.
//! 2. Amounts are `U256` with checked arithmetic. No wrapping, ever.
//! 3. Instances read the registry's signer through a shared handle, so a
//!    rotation applies everywhere at once.
//! 4. Authorization failures are typed errors, not panics.

pub mod access_gate;
pub mod authorization;
pub mod error;
pub mod events;
pub mod instance;
pub mod registry;
pub mod verifier;

pub use access_gate::{AccessGate, BadgeRequirement, BalanceOracle, InMemoryBadgeLedger, OracleError};
pub use authorization::{IssuanceAuthorization, SignedAuthorization};
pub use error::IouError;
pub use events::{Event, EventLog, EventRecord, EventSink};
pub use instance::{Instance, InstanceDescriptor, InstanceLedger, InstanceStatus};
pub use registry::{CreateInstanceRequest, Registry, RegistryBuilder, RegistryConfig, SharedConfig};
pub use verifier::{Ed25519Verifier, SignatureVerifier};
