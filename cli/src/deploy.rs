//! Registry deployment dry runs.
//!
//! A deployment file is the registry configuration plus the badge balances
//! to seed the in-memory oracle with:
//!
//! ```json
//! {
//!   "administrator": "<hex>",
//!   "signer": "<hex>",
//!   "vault": "<hex>",
//!   "badge": { "token": "<hex>", "id": "0x0", "amount": "0x1" },
//!   "badge_holders": [ { "holder": "<hex>", "amount": "0x1" } ]
//! }
//! ```
//!
//! 256-bit quantities are `0x`-prefixed hex strings.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use iou_contracts::{
    CreateInstanceRequest, EventLog, EventRecord, InMemoryBadgeLedger, InstanceDescriptor,
    InstanceStatus, RegistryBuilder, RegistryConfig,
};
use iou_protocol::{Identity, U256};
use serde::{Deserialize, Serialize};

/// Contents of a deployment file.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentFile {
    /// Initial registry configuration.
    #[serde(flatten)]
    pub config: RegistryConfig,
    /// Holdings of the configured badge credential.
    #[serde(default)]
    pub badge_holders: Vec<BadgeHolding>,
}

/// One seeded balance of the configured badge credential.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BadgeHolding {
    /// Holder identity.
    pub holder: Identity,
    /// Balance held.
    pub amount: U256,
}

impl DeploymentFile {
    /// Parse a deployment file from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid registry deployment file")
    }

    /// Read and parse a deployment file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("while loading {}", path.display()))
    }
}

/// What `deploy` prints.
#[derive(Debug, Serialize)]
pub struct DeploymentSummary {
    /// Identity of the deployed registry.
    pub registry: Identity,
    /// Configuration after deployment.
    pub config: RegistryConfig,
    /// Number of configuration changes applied.
    pub config_version: u64,
    /// Provisioned instance, if a creator was given.
    pub instance: Option<InstanceSummary>,
    /// Every event emitted during the run, in order.
    pub events: Vec<EventRecord>,
}

/// A provisioned instance.
#[derive(Debug, Serialize)]
pub struct InstanceSummary {
    /// Instance identity.
    pub id: Identity,
    /// Descriptor as provisioned.
    pub descriptor: InstanceDescriptor,
    /// Lifecycle state.
    pub status: InstanceStatus,
}

/// Deploy a registry from `file` and, if `creator` is given, provision one
/// instance for it.
pub async fn run(
    file: DeploymentFile,
    creator: Option<Identity>,
    request: CreateInstanceRequest,
) -> Result<DeploymentSummary> {
    let badges = Arc::new(InMemoryBadgeLedger::new());
    let badge = file.config.badge;
    for seed in &file.badge_holders {
        badges.mint(seed.holder, badge.credential_token, badge.credential_id, seed.amount);
    }
    tracing::debug!(holders = file.badge_holders.len(), "badge ledger seeded");

    let log = Arc::new(EventLog::new());
    let registry = RegistryBuilder::new(file.config, badges)
        .event_sink(log.clone())
        .build();

    let instance = match creator {
        Some(creator) => {
            let instance = registry
                .create_instance(creator, request)
                .await
                .with_context(|| format!("could not provision an instance for {creator}"))?;
            Some(InstanceSummary {
                id: instance.id(),
                descriptor: instance.descriptor(),
                status: instance.status(),
            })
        }
        None => None,
    };

    Ok(DeploymentSummary {
        registry: registry.id(),
        config: registry.config(),
        config_version: registry.config_version(),
        instance,
        events: log.records(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iou_contracts::Event;

    fn id(b: u8) -> Identity {
        Identity::from_bytes([b; 32])
    }

    fn file_json(holders: &str) -> String {
        format!(
            r#"{{
                "administrator": "{admin}",
                "signer": "{signer}",
                "vault": "{vault}",
                "badge": {{ "token": "{token}", "id": "0x0", "amount": "0x1" }},
                "badge_holders": {holders}
            }}"#,
            admin = id(0xAD),
            signer = id(0x51),
            vault = id(0xFA),
            token = id(0xBA),
        )
    }

    #[test]
    fn parses_deployment_file() {
        let file = DeploymentFile::from_json(&file_json(&format!(
            r#"[{{ "holder": "{}", "amount": "0x2" }}]"#,
            id(1)
        )))
        .unwrap();

        assert_eq!(file.config.administrator, id(0xAD));
        assert_eq!(file.config.authorized_signer, id(0x51));
        assert_eq!(file.config.badge.min_amount, U256::one());
        assert_eq!(file.badge_holders.len(), 1);
        assert_eq!(file.badge_holders[0].amount, U256::from(2u64));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(DeploymentFile::from_json(r#"{ "administrator": "00" }"#).is_err());
    }

    #[tokio::test]
    async fn deploy_with_badge_holder_provisions_instance() {
        let file = DeploymentFile::from_json(&file_json(&format!(
            r#"[{{ "holder": "{}", "amount": "0x1" }}]"#,
            id(1)
        )))
        .unwrap();

        let summary = run(
            file,
            Some(id(1)),
            CreateInstanceRequest::new("Acme", "ACME").with_destination("ethereum", "0xfeed", 6),
        )
        .await
        .unwrap();

        let instance = summary.instance.unwrap();
        assert_eq!(instance.status, InstanceStatus::DestinationSet);
        assert_eq!(instance.descriptor.factory, summary.registry);
        assert!(matches!(
            summary.events.last().map(|r| &r.event),
            Some(Event::InstanceCreated { .. })
        ));
    }

    #[tokio::test]
    async fn deploy_without_badge_fails() {
        let file = DeploymentFile::from_json(&file_json("[]")).unwrap();
        let err = run(file, Some(id(2)), CreateInstanceRequest::new("A", "A"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("missing required credential"));
    }
}
