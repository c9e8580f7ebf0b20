//! Integration tests for the registry and instance lifecycle.
//!
//! These walk the public API the way an operator and a holder would:
//! deploy a registry, provision an instance behind the badge gate, issue
//! against signed authorizations, then redeem and burn.

use std::sync::Arc;

use async_trait::async_trait;
use iou_contracts::{
    BadgeRequirement, BalanceOracle, CreateInstanceRequest, Event, EventLog, InMemoryBadgeLedger,
    Instance, InstanceStatus, IouError, OracleError, Registry, RegistryBuilder, RegistryConfig,
    SignatureVerifier,
};
use iou_protocol::crypto::keys::{Keypair, Signature};
use iou_protocol::time::ManualClock;
use iou_protocol::{Identity, U256};

const NOW: u64 = 1_700_000_000;

fn id(b: u8) -> Identity {
    Identity::from_bytes([b; 32])
}

fn badge_token() -> Identity {
    id(0xBA)
}

/// Deployed registry plus the handles tests poke at.
struct Deployment {
    registry: Registry,
    admin: Identity,
    signer: Keypair,
    badges: Arc<InMemoryBadgeLedger>,
    clock: Arc<ManualClock>,
    log: Arc<EventLog>,
}

fn deploy() -> Deployment {
    let admin = id(0xAD);
    let signer = Keypair::from_seed(&[0x51; 32]);
    let badges = Arc::new(InMemoryBadgeLedger::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let log = Arc::new(EventLog::new());

    let config = RegistryConfig {
        administrator: admin,
        authorized_signer: signer.identity(),
        vault: id(0xFA),
        badge: BadgeRequirement::new(badge_token(), U256::zero(), U256::one()),
    };
    let registry = RegistryBuilder::new(config, badges.clone())
        .clock(clock.clone())
        .event_sink(log.clone())
        .build();

    Deployment {
        registry,
        admin,
        signer,
        badges,
        clock,
        log,
    }
}

impl Deployment {
    async fn provision(&self, creator: Identity) -> Arc<Instance> {
        self.badges
            .mint(creator, badge_token(), U256::zero(), U256::one());
        self.registry
            .create_instance(creator, CreateInstanceRequest::new("Acme IOU", "AIOU"))
            .await
            .unwrap()
    }
}

fn authorize(
    instance: &Instance,
    signer: &Keypair,
    holder: Identity,
    amount: u64,
    nonce: u64,
    expiry: u64,
) -> Signature {
    instance
        .authorization_message(holder, U256::from(amount), U256::from(nonce), expiry)
        .sign(signer)
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

#[tokio::test]
async fn badge_holder_creates_instance_and_others_are_denied() {
    let d = deploy();
    let holder = id(1);
    d.badges.mint(holder, badge_token(), U256::zero(), U256::one());

    let instance = d
        .registry
        .create_instance(holder, CreateInstanceRequest::new("Acme IOU", "AIOU"))
        .await
        .unwrap();

    assert_eq!(
        d.log.events_from(&d.registry.id()),
        vec![Event::InstanceCreated {
            instance: instance.id(),
            creator: holder,
            sequence_id: U256::zero(),
        }]
    );
    assert_eq!(instance.descriptor().factory, d.registry.id());

    let err = d
        .registry
        .create_instance(id(2), CreateInstanceRequest::new("Nope", "NOPE"))
        .await
        .unwrap_err();
    assert!(matches!(err, IouError::AccessDenied(_)));
    assert_eq!(d.registry.instance_count(), 1);
}

#[tokio::test]
async fn oracle_failure_is_reported_and_consumes_no_sequence() {
    struct DownOracle;

    #[async_trait]
    impl BalanceOracle for DownOracle {
        async fn balance_of(&self, _: &Identity, _: &Identity, _: U256) -> Result<U256, OracleError> {
            Err(OracleError::Unavailable("rpc timeout".into()))
        }
    }

    let config = RegistryConfig {
        administrator: id(0xAD),
        authorized_signer: id(0x51),
        vault: id(0xFA),
        badge: BadgeRequirement::new(badge_token(), U256::zero(), U256::one()),
    };
    let log = Arc::new(EventLog::new());
    let registry = RegistryBuilder::new(config, Arc::new(DownOracle))
        .event_sink(log.clone())
        .build();

    let err = registry
        .create_instance(id(1), CreateInstanceRequest::new("A", "A"))
        .await
        .unwrap_err();
    assert!(matches!(err, IouError::CredentialQueryFailed(_)));
    assert_eq!(registry.instance_count(), 0);
    assert!(registry.instance_by_sequence(U256::zero()).is_none());
    assert!(log.is_empty());
}

#[tokio::test]
async fn badge_change_applies_to_future_provisioning() {
    let d = deploy();
    d.provision(id(1)).await;

    let stricter = BadgeRequirement::new(badge_token(), U256::zero(), U256::from(5u64));
    d.registry.set_badge(d.admin, stricter).unwrap();

    let err = d
        .registry
        .create_instance(id(1), CreateInstanceRequest::new("B", "B"))
        .await
        .unwrap_err();
    assert!(matches!(err, IouError::AccessDenied(_)));

    d.badges.mint(id(1), badge_token(), U256::zero(), U256::from(4u64));
    let second = d
        .registry
        .create_instance(id(1), CreateInstanceRequest::new("B", "B"))
        .await
        .unwrap();
    assert_eq!(second.descriptor().sequence_id, U256::one());
}

#[tokio::test]
async fn destination_supplied_at_creation_precedes_instance_created() {
    let d = deploy();
    d.badges.mint(id(1), badge_token(), U256::zero(), U256::one());
    let request = CreateInstanceRequest::new("Acme IOU", "AIOU").with_destination("ethereum", "0xfeed", 6);

    let instance = d.registry.create_instance(id(1), request).await.unwrap();
    assert_eq!(instance.status(), InstanceStatus::DestinationSet);

    let names: Vec<_> = d.log.records().iter().map(|r| r.event.name()).collect();
    assert_eq!(names, vec!["DestinationUpdated", "InstanceCreated"]);
    assert_eq!(
        instance.set_destination("ethereum", "0xbeef", 6),
        Err(IouError::AlreadyConfigured)
    );
    let destination_events = d
        .log
        .events_from(&instance.id())
        .into_iter()
        .filter(|e| matches!(e, Event::DestinationUpdated { .. }))
        .count();
    assert_eq!(destination_events, 1);
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issue_then_replay_is_rejected() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);

    let sig = authorize(&instance, &d.signer, holder, 100, 0, NOW + 300);
    instance
        .issue(holder, U256::from(100u64), U256::zero(), NOW + 300, &sig)
        .unwrap();
    assert_eq!(instance.ledger().issued_total, U256::from(100u64));

    let err = instance
        .issue(holder, U256::from(100u64), U256::zero(), NOW + 300, &sig)
        .unwrap_err();
    assert!(matches!(err, IouError::InvalidNonce { .. }));
    assert_eq!(instance.ledger().issued_total, U256::from(100u64));
}

#[tokio::test]
async fn expired_authorization_leaves_ledger_unchanged() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);

    let sig = authorize(&instance, &d.signer, holder, 100, 0, NOW - 1);
    let err = instance
        .issue(holder, U256::from(100u64), U256::zero(), NOW - 1, &sig)
        .unwrap_err();

    assert_eq!(
        err,
        IouError::SignatureExpired {
            expiry: NOW - 1,
            now: NOW,
        }
    );
    assert_eq!(instance.ledger().issued_total, U256::zero());
    assert_eq!(instance.ledger().last_nonce, None);
}

#[tokio::test]
async fn authorization_expires_as_the_clock_moves() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);
    let sig = authorize(&instance, &d.signer, holder, 5, 0, NOW + 300);

    d.clock.advance(301);
    let err = instance
        .issue(holder, U256::from(5u64), U256::zero(), NOW + 300, &sig)
        .unwrap_err();
    assert_eq!(err.kind(), "signature_expired");
}

#[tokio::test]
async fn only_the_current_signer_is_trusted() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);

    let impostor = Keypair::from_seed(&[0x66; 32]);
    let sig = authorize(&instance, &impostor, holder, 10, 0, NOW + 60);
    assert_eq!(
        instance.issue(holder, U256::from(10u64), U256::zero(), NOW + 60, &sig),
        Err(IouError::InvalidSignature)
    );

    // A signature for one instance is worthless on another.
    let other = d.provision(id(2)).await;
    let sig = authorize(&other, &d.signer, holder, 10, 0, NOW + 60);
    assert_eq!(
        instance.issue(holder, U256::from(10u64), U256::zero(), NOW + 60, &sig),
        Err(IouError::InvalidSignature)
    );
    assert!(d.log.events_from(&instance.id()).is_empty());
}

#[tokio::test]
async fn signer_rotation_reaches_existing_instances() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);

    let old_sig = authorize(&instance, &d.signer, holder, 10, 0, NOW + 60);

    let rotated = Keypair::from_seed(&[0x52; 32]);
    d.registry.set_signer(d.admin, rotated.identity()).unwrap();

    assert_eq!(
        instance.issue(holder, U256::from(10u64), U256::zero(), NOW + 60, &old_sig),
        Err(IouError::InvalidSignature)
    );

    let new_sig = authorize(&instance, &rotated, holder, 10, 0, NOW + 60);
    instance
        .issue(holder, U256::from(10u64), U256::zero(), NOW + 60, &new_sig)
        .unwrap();
    assert_eq!(instance.balance_of(&holder), U256::from(10u64));
}

#[tokio::test]
async fn non_admin_cannot_rotate_signer() {
    let d = deploy();
    let before = d.registry.signer();
    let err = d.registry.set_signer(id(1), id(1)).unwrap_err();
    assert_eq!(err, IouError::Unauthorized { caller: id(1) });
    assert_eq!(d.registry.signer(), before);
    assert!(d.log.is_empty());
}

#[tokio::test]
async fn deterministic_verifier_can_stand_in_for_ed25519() {
    /// Accepts any signature whose bytes equal the first 64 bytes of
    /// `message || signer`.
    struct EchoVerifier;

    impl SignatureVerifier for EchoVerifier {
        fn verify(&self, message: &[u8], signature: &Signature, expected_signer: &Identity) -> bool {
            let mut expected = message.to_vec();
            expected.extend_from_slice(expected_signer.as_bytes());
            signature.as_bytes() == &expected[..64]
        }
    }

    let badges = Arc::new(InMemoryBadgeLedger::new());
    let signer = id(0x51);
    let registry = RegistryBuilder::new(
        RegistryConfig {
            administrator: id(0xAD),
            authorized_signer: signer,
            vault: id(0xFA),
            badge: BadgeRequirement::new(badge_token(), U256::zero(), U256::zero()),
        },
        badges,
    )
    .verifier(Arc::new(EchoVerifier))
    .clock(Arc::new(ManualClock::new(NOW)))
    .build();

    let instance = registry
        .create_instance(id(1), CreateInstanceRequest::new("Mock", "MOCK"))
        .await
        .unwrap();
    let digest = instance
        .authorization_message(id(2), U256::from(7u64), U256::zero(), NOW)
        .digest();
    let mut bytes = digest.to_vec();
    bytes.extend_from_slice(signer.as_bytes());
    let sig = Signature::from_slice(&bytes[..64]);

    instance
        .issue(id(2), U256::from(7u64), U256::zero(), NOW, &sig)
        .unwrap();
    assert_eq!(instance.outstanding(), U256::from(7u64));
}

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_redeem_then_nothing_left() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let holder = id(0x40);
    let sig = authorize(&instance, &d.signer, holder, 100, 0, NOW + 300);
    instance
        .issue(holder, U256::from(100u64), U256::zero(), NOW + 300, &sig)
        .unwrap();

    instance.redeem(holder, U256::from(100u64)).unwrap();
    assert_eq!(instance.ledger().redeemed_total, U256::from(100u64));

    let err = instance.redeem(holder, U256::one()).unwrap_err();
    assert!(matches!(err, IouError::InsufficientBalance { .. }));
    assert_eq!(instance.ledger().redeemed_total, U256::from(100u64));
}

#[tokio::test]
async fn conservation_holds_across_mixed_operations() {
    let d = deploy();
    let instance = d.provision(id(1)).await;
    let (alice, bob) = (id(0x41), id(0x42));

    for (nonce, (holder, amount)) in [(alice, 60u64), (bob, 40), (alice, 5)].into_iter().enumerate() {
        let nonce = nonce as u64;
        let sig = authorize(&instance, &d.signer, holder, amount, nonce, NOW + 60);
        instance
            .issue(holder, U256::from(amount), U256::from(nonce), NOW + 60, &sig)
            .unwrap();
    }

    instance.redeem(alice, U256::from(50u64)).unwrap();
    instance.burn(bob, U256::from(40u64)).unwrap();
    assert!(instance.burn(bob, U256::one()).is_err());

    let ledger = instance.ledger();
    assert_eq!(ledger.issued_total, U256::from(105u64));
    assert_eq!(ledger.redeemed_total, U256::from(90u64));
    assert!(ledger.redeemed_total <= ledger.issued_total);
    assert_eq!(
        instance.balance_of(&alice) + instance.balance_of(&bob),
        instance.outstanding()
    );
}
