//! # Registry
//!
//! Administrator-owned configuration and the catalog of provisioned
//! instances.
//!
//! ## Security Model
//!
//! - **Admin gating**: `set_signer`, `set_vault` and `set_badge` fail with
//!   [`IouError::Unauthorized`] unless the caller is the administrator fixed
//!   at construction. There is no way to change the administrator.
//! - **Credential gating**: `create_instance` is open to anyone holding the
//!   configured badge credential, as reported by the [`AccessGate`].
//! - **Live signer**: instances hold a clone of the [`SharedConfig`] handle
//!   and read the signer from it on every issuance, so rotating the signer
//!   revokes the old key everywhere at once.
//!
//! ## Provisioning
//!
//! The credential query is the only `.await`. The catalog lock is taken
//! after it resolves, so a failed or slow query never consumes a sequence
//! number and never blocks other provisioning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use iou_protocol::config::{INITIAL_SEQUENCE_ID, INSTANCE_ID_DOMAIN, REGISTRY_ID_DOMAIN, U256_BYTES};
use iou_protocol::time::{Clock, SystemClock};
use iou_protocol::{Identity, U256};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access_gate::{AccessGate, BadgeRequirement, BalanceOracle};
use crate::error::IouError;
use crate::events::{Event, EventLog, EventRecord, EventSink};
use crate::instance::{Instance, InstanceContext, InstanceDescriptor};
use crate::verifier::{Ed25519Verifier, SignatureVerifier};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Registry-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// The only identity allowed to change the other fields.
    pub administrator: Identity,
    /// Key whose signatures authorize issuance on every instance.
    #[serde(rename = "signer")]
    pub authorized_signer: Identity,
    /// Custody address for the backing assets.
    pub vault: Identity,
    /// Credential required to provision an instance.
    pub badge: BadgeRequirement,
}

#[derive(Debug)]
struct Versioned {
    config: RegistryConfig,
    version: u64,
}

/// Shared, versioned handle to a [`RegistryConfig`].
///
/// Clones point at the same configuration. Every successful mutation bumps
/// the version by one.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Versioned>>,
}

impl SharedConfig {
    /// Wrap `config` at version 0.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Versioned { config, version: 0 })),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> RegistryConfig {
        self.inner.read().config
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Current authorized signer.
    pub fn signer(&self) -> Identity {
        self.inner.read().config.authorized_signer
    }

    /// Run `apply` under the write lock. If it succeeds the version is
    /// bumped and `applied` sees the new version before the lock is
    /// released.
    fn update<E>(
        &self,
        apply: impl FnOnce(&mut RegistryConfig) -> Result<(), E>,
        applied: impl FnOnce(u64),
    ) -> Result<u64, E> {
        let mut guard = self.inner.write();
        apply(&mut guard.config)?;
        guard.version += 1;
        let version = guard.version;
        applied(version);
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Parameters for [`Registry::create_instance`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    /// Human-readable name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Destination chain. Leave empty to set it later.
    #[serde(default)]
    pub destination_chain: String,
    /// Destination address. Leave empty to set it later.
    #[serde(default)]
    pub destination_address: String,
    /// Destination decimal precision.
    #[serde(default)]
    pub destination_decimals: u8,
}

impl CreateInstanceRequest {
    /// Request with no destination.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Supply the destination up front.
    pub fn with_destination(
        mut self,
        chain: impl Into<String>,
        address: impl Into<String>,
        decimals: u8,
    ) -> Self {
        self.destination_chain = chain.into();
        self.destination_address = address.into();
        self.destination_decimals = decimals;
        self
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`Registry`]. Only the configuration and the badge oracle
/// are required; everything else has a production default.
pub struct RegistryBuilder {
    config: RegistryConfig,
    oracle: Arc<dyn BalanceOracle>,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    query_timeout: Option<Duration>,
}

impl RegistryBuilder {
    /// Start from the initial configuration and the credential oracle.
    pub fn new(config: RegistryConfig, oracle: Arc<dyn BalanceOracle>) -> Self {
        Self {
            config,
            oracle,
            verifier: Arc::new(Ed25519Verifier),
            clock: Arc::new(SystemClock),
            events: Arc::new(EventLog::new()),
            query_timeout: None,
        }
    }

    /// Replace the signature verifier.
    pub fn verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the clock expiry is measured against.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event sink.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Bound how long a credential query may take.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Finish. The registry gets a fresh random identity.
    pub fn build(self) -> Registry {
        let id = Identity::derive(REGISTRY_ID_DOMAIN, &[Uuid::new_v4().as_bytes().as_slice()]);

        let mut gate = AccessGate::new(self.oracle);
        if let Some(timeout) = self.query_timeout {
            gate = gate.with_timeout(timeout);
        }

        tracing::info!(
            registry = %id,
            administrator = %self.config.administrator,
            signer = %self.config.authorized_signer,
            vault = %self.config.vault,
            "registry deployed"
        );

        Registry {
            id,
            gate,
            context: InstanceContext {
                config: SharedConfig::new(self.config),
                verifier: self.verifier,
                clock: self.clock,
                events: self.events,
            },
            catalog: Mutex::new(Catalog::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct CatalogEntry {
    instance: Arc<Instance>,
    creator: Identity,
}

struct Catalog {
    next_sequence: u64,
    entries: Vec<CatalogEntry>,
    by_id: HashMap<Identity, usize>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_sequence: INITIAL_SEQUENCE_ID,
            entries: Vec::new(),
            by_id: HashMap::new(),
        }
    }
}

/// Global configuration plus the instance catalog.
pub struct Registry {
    id: Identity,
    gate: AccessGate,
    context: InstanceContext,
    catalog: Mutex<Catalog>,
}

impl Registry {
    /// Shorthand for `RegistryBuilder::new(config, oracle).build()`.
    pub fn new(config: RegistryConfig, oracle: Arc<dyn BalanceOracle>) -> Self {
        RegistryBuilder::new(config, oracle).build()
    }

    /// Replace the authorized signer. Existing instances pick up the new
    /// signer on their next issuance.
    ///
    /// # Errors
    ///
    /// [`IouError::Unauthorized`] unless `caller` is the administrator.
    pub fn set_signer(&self, caller: Identity, signer: Identity) -> Result<(), IouError> {
        self.mutate_config(
            caller,
            "set_signer",
            |config| config.authorized_signer = signer,
            Event::SignerUpdated { signer },
        )
    }

    /// Replace the vault.
    ///
    /// # Errors
    ///
    /// [`IouError::Unauthorized`] unless `caller` is the administrator.
    pub fn set_vault(&self, caller: Identity, vault: Identity) -> Result<(), IouError> {
        self.mutate_config(
            caller,
            "set_vault",
            |config| config.vault = vault,
            Event::VaultUpdated { vault },
        )
    }

    /// Replace the badge requirement for future provisioning.
    ///
    /// # Errors
    ///
    /// [`IouError::Unauthorized`] unless `caller` is the administrator.
    pub fn set_badge(&self, caller: Identity, badge: BadgeRequirement) -> Result<(), IouError> {
        self.mutate_config(
            caller,
            "set_badge",
            |config| config.badge = badge,
            Event::BadgeUpdated { badge },
        )
    }

    /// Provision a new instance for `caller`.
    ///
    /// # Errors
    ///
    /// - [`IouError::AccessDenied`] if the caller holds less than the badge
    ///   requirement.
    /// - [`IouError::CredentialQueryFailed`] if the oracle errors or times
    ///   out.
    ///
    /// On error no sequence number is consumed and no event is emitted.
    pub async fn create_instance(
        &self,
        caller: Identity,
        request: CreateInstanceRequest,
    ) -> Result<Arc<Instance>, IouError> {
        let badge = self.context.config.snapshot().badge;

        let qualified = self.gate.check(&caller, &badge).await.map_err(|e| {
            tracing::warn!(registry = %self.id, %caller, error = %e, "credential query failed");
            e
        })?;
        if !qualified {
            tracing::warn!(registry = %self.id, %caller, "instance creation denied");
            return Err(IouError::AccessDenied("missing required credential".into()));
        }

        let mut catalog = self.catalog.lock();
        let sequence = catalog.next_sequence;
        let sequence_id = U256::from(sequence);
        let id = self.instance_id(sequence_id);

        let descriptor = InstanceDescriptor {
            name: request.name,
            symbol: request.symbol,
            destination_chain: request.destination_chain,
            destination_address: request.destination_address,
            destination_decimals: request.destination_decimals,
            factory: self.id,
            sequence_id,
        };
        let instance = Arc::new(Instance::provision(id, descriptor, self.context.clone()));

        catalog.next_sequence += 1;
        let index = catalog.entries.len();
        catalog.entries.push(CatalogEntry {
            instance: Arc::clone(&instance),
            creator: caller,
        });
        catalog.by_id.insert(id, index);

        tracing::info!(
            registry = %self.id,
            instance = %id,
            creator = %caller,
            sequence,
            "instance created"
        );
        self.emit(Event::InstanceCreated {
            instance: id,
            creator: caller,
            sequence_id,
        });

        Ok(instance)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// This registry's identity.
    pub fn id(&self) -> Identity {
        self.id
    }

    /// The fixed administrator.
    pub fn administrator(&self) -> Identity {
        self.context.config.snapshot().administrator
    }

    /// Current authorized signer.
    pub fn signer(&self) -> Identity {
        self.context.config.signer()
    }

    /// Current vault.
    pub fn vault(&self) -> Identity {
        self.context.config.snapshot().vault
    }

    /// Current badge requirement.
    pub fn badge(&self) -> BadgeRequirement {
        self.context.config.snapshot().badge
    }

    /// Snapshot of the whole configuration.
    pub fn config(&self) -> RegistryConfig {
        self.context.config.snapshot()
    }

    /// Number of configuration changes since deployment.
    pub fn config_version(&self) -> u64 {
        self.context.config.version()
    }

    /// Handle shared with every instance.
    pub fn shared_config(&self) -> SharedConfig {
        self.context.config.clone()
    }

    /// Look up an instance by identity.
    pub fn instance(&self, id: &Identity) -> Option<Arc<Instance>> {
        let catalog = self.catalog.lock();
        catalog
            .by_id
            .get(id)
            .map(|&index| Arc::clone(&catalog.entries[index].instance))
    }

    /// Look up an instance by sequence number.
    pub fn instance_by_sequence(&self, sequence_id: U256) -> Option<Arc<Instance>> {
        if sequence_id > U256::from(u64::MAX) {
            return None;
        }
        let index = usize::try_from(sequence_id.low_u64()).ok()?;
        self.catalog
            .lock()
            .entries
            .get(index)
            .map(|entry| Arc::clone(&entry.instance))
    }

    /// Every instance, in creation order.
    pub fn instances(&self) -> Vec<Arc<Instance>> {
        self.catalog
            .lock()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.instance))
            .collect()
    }

    /// Instances provisioned by `creator`, in creation order.
    pub fn instances_created_by(&self, creator: &Identity) -> Vec<Arc<Instance>> {
        self.catalog
            .lock()
            .entries
            .iter()
            .filter(|entry| &entry.creator == creator)
            .map(|entry| Arc::clone(&entry.instance))
            .collect()
    }

    /// Number of instances provisioned.
    pub fn instance_count(&self) -> usize {
        self.catalog.lock().entries.len()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn instance_id(&self, sequence_id: U256) -> Identity {
        let mut sequence = [0u8; U256_BYTES];
        sequence_id.to_big_endian(&mut sequence);
        Identity::derive(INSTANCE_ID_DOMAIN, &[self.id.as_bytes().as_slice(), sequence.as_slice()])
    }

    fn mutate_config(
        &self,
        caller: Identity,
        op: &'static str,
        apply: impl FnOnce(&mut RegistryConfig),
        event: Event,
    ) -> Result<(), IouError> {
        self.context.config.update(
            |config| {
                if caller != config.administrator {
                    tracing::warn!(registry = %self.id, %caller, op, "unauthorized config change");
                    return Err(IouError::Unauthorized { caller });
                }
                apply(config);
                Ok(())
            },
            |version| {
                tracing::info!(registry = %self.id, op, version, "configuration updated");
                // Emitted under the write lock so sink order matches config order.
                self.emit(event);
            },
        )?;
        Ok(())
    }

    fn emit(&self, event: Event) {
        self.context.events.emit(EventRecord {
            emitter: self.id,
            event,
        });
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("config", &self.config())
            .field("instances", &self.instance_count())
            .finish_non_exhaustive()
    }
}
