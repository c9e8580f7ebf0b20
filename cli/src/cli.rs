//! # CLI Interface
//!
//! Command-line structure for `iou`, defined with `clap` derive. Five
//! subcommands: `keygen`, `authorize`, `check`, `deploy` and `version`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use iou_protocol::{Identity, U256};

use crate::logging::LogFormat;

/// Operator tooling for the IOU protocol.
///
/// Generates signer keys, signs and checks issuance authorizations, and
/// dry-runs registry deployments against an in-memory badge ledger.
#[derive(Parser, Debug)]
#[command(name = "iou", about = "IOU protocol operator tooling", version, propagate_version = true)]
pub struct IouCli {
    /// Log output format. Logs go to stderr.
    #[arg(long, global = true, env = "IOU_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh Ed25519 signer keypair.
    Keygen(KeygenArgs),
    /// Sign an issuance authorization as the authorized signer.
    Authorize(AuthorizeArgs),
    /// Verify an issuance authorization against a signer identity.
    Check(CheckArgs),
    /// Deploy a registry in memory from a JSON file and print a summary.
    Deploy(DeployArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for `keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the hex secret key here (mode 0600 on Unix) instead of
    /// printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// The fields an issuance authorization covers.
#[derive(Args, Debug)]
pub struct AuthorizationFields {
    /// Instance identity (hex).
    #[arg(long)]
    pub instance: Identity,

    /// Holder identity (hex).
    #[arg(long)]
    pub holder: Identity,

    /// Amount to issue, in decimal.
    #[arg(long, value_parser = parse_u256)]
    pub amount: U256,

    /// Replay nonce, in decimal. Must be 0 for an instance's first
    /// issuance and exceed the last accepted nonce afterwards.
    #[arg(long, value_parser = parse_u256)]
    pub nonce: U256,
}

/// Arguments for `authorize`.
#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    #[command(flatten)]
    pub fields: AuthorizationFields,

    /// Absolute expiry, unix seconds.
    #[arg(long, conflicts_with = "ttl")]
    pub expiry: Option<u64>,

    /// Validity window from now, in seconds. Defaults to the protocol's
    /// authorization TTL.
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Hex-encoded Ed25519 secret key of the authorized signer.
    ///
    /// Prefer the environment variable over the flag so the key stays out
    /// of shell history.
    #[arg(long, env = "IOU_SIGNER_KEY", hide_env_values = true)]
    pub signer_key: String,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub fields: AuthorizationFields,

    /// Expiry carried by the authorization, unix seconds.
    #[arg(long)]
    pub expiry: u64,

    /// Identity expected to have signed (hex).
    #[arg(long)]
    pub signer: Identity,

    /// Hex-encoded signature.
    #[arg(long)]
    pub signature: String,
}

/// Arguments for `deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Registry deployment file (JSON).
    #[arg(long, short = 'c', env = "IOU_REGISTRY_CONFIG")]
    pub config: PathBuf,

    /// Provision a first instance on behalf of this identity.
    #[arg(long)]
    pub creator: Option<Identity>,

    /// Name of the provisioned instance.
    #[arg(long, default_value = "IOU")]
    pub name: String,

    /// Symbol of the provisioned instance.
    #[arg(long, default_value = "IOU")]
    pub symbol: String,

    /// Destination chain, if known up front.
    #[arg(long, requires = "creator")]
    pub destination_chain: Option<String>,

    /// Destination address, if known up front.
    #[arg(long, requires = "destination_chain")]
    pub destination_address: Option<String>,

    /// Destination decimal precision.
    #[arg(long, default_value_t = 18)]
    pub destination_decimals: u8,
}

fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|e| format!("not a decimal 256-bit integer: {e:?}"))
}
