// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # IOU Protocol Core Primitives
//!
//! The building blocks shared by the IOU registry and ledger contracts:
//! identities, Ed25519 keys and signatures, hashing, and the time source
//! that authorization expiry is measured against.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants. Domain tags, nonce floor, timeouts.
//! - **crypto**: Ed25519 signing/verification and BLAKE3 hashing.
//! - **identity**: 32-byte identities for signers, holders, tokens and
//!   provisioned instances.
//! - **time**: Wall-clock seconds, injectable so expiry logic is testable.
//!
//! Nothing in this crate holds protocol state. The stateful parts (registry,
//! instances, ledgers) live in `iou-contracts`.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod time;

pub use identity::Identity;
pub use primitive_types::U256;
