// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # IOU Operator Tool
//!
//! Entry point for the `iou` binary. Parses CLI arguments, initializes
//! logging, and dispatches to a subcommand:
//!
//! - `keygen`: generate a signer keypair
//! - `authorize`: sign an issuance authorization
//! - `check`: verify an issuance authorization
//! - `deploy`: dry-run a registry deployment from a JSON file
//! - `version`: print build version information
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;
mod deploy;
mod logging;

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use iou_contracts::{
    CreateInstanceRequest, Ed25519Verifier, IssuanceAuthorization, SignatureVerifier, SignedAuthorization,
};
use iou_protocol::config::{DEFAULT_AUTHORIZATION_TTL, PROTOCOL_FINGERPRINT, PROTOCOL_VERSION};
use iou_protocol::crypto::keys::{Keypair, Signature};
use iou_protocol::time::{Clock, SystemClock};
use iou_protocol::Identity;
use serde::Serialize;

use cli::{Commands, IouCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = IouCli::parse();
    logging::init_logging("iou=info,iou_contracts=info,iou_protocol=info", cli.log_format);

    match cli.command {
        Commands::Keygen(args) => keygen(args),
        Commands::Authorize(args) => authorize(args),
        Commands::Check(args) => check(args),
        Commands::Deploy(args) => deploy_registry(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Generates a signer keypair, optionally writing the secret to a file.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = Keypair::generate();
    let identity = keypair.identity();

    #[derive(Serialize)]
    struct KeygenOutput {
        identity: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_key_file: Option<String>,
    }

    let output = match &args.out {
        Some(path) => {
            write_secret(path, &keypair.secret_key_hex())?;
            tracing::info!(%identity, key_path = %path.display(), "signer keypair generated");
            KeygenOutput {
                identity: identity.to_hex(),
                secret_key: None,
                secret_key_file: Some(path.display().to_string()),
            }
        }
        None => {
            tracing::warn!("no --out given; secret key printed to stdout");
            KeygenOutput {
                identity: identity.to_hex(),
                secret_key: Some(keypair.secret_key_hex()),
                secret_key_file: None,
            }
        }
    };

    print_json(&output)
}

fn write_secret(path: &Path, secret_hex: &str) -> Result<()> {
    std::fs::write(path, secret_hex)
        .with_context(|| format!("failed to write secret key to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Signs an issuance authorization with the configured signer key.
fn authorize(args: cli::AuthorizeArgs) -> Result<()> {
    let signer = Keypair::from_hex(args.signer_key.trim()).context("invalid signer key")?;

    let expiry = match args.expiry {
        Some(expiry) => expiry,
        None => {
            let ttl = args.ttl.unwrap_or(DEFAULT_AUTHORIZATION_TTL.as_secs());
            SystemClock
                .now()
                .checked_add(ttl)
                .context("expiry overflows u64")?
        }
    };

    let fields = args.fields;
    let signed = sign_fields(&fields, expiry, &signer);

    tracing::info!(
        instance = %fields.instance,
        holder = %fields.holder,
        amount = %fields.amount,
        nonce = %fields.nonce,
        expires_at = %format_expiry(expiry),
        signer = %signed.signer,
        "authorization signed"
    );

    print_json(&signed)
}

/// Verifies an authorization the way an instance would, minus the nonce.
fn check(args: cli::CheckArgs) -> Result<()> {
    let valid = signature_is_valid(&args.fields, args.expiry, &args.signer, &args.signature)?;
    let now = SystemClock.now();

    #[derive(Serialize)]
    struct CheckOutput {
        valid_signature: bool,
        expired: bool,
        expires_at: String,
    }

    print_json(&CheckOutput {
        valid_signature: valid,
        expired: now > args.expiry,
        expires_at: format_expiry(args.expiry),
    })?;

    if !valid {
        bail!("signature was not produced by {} over this authorization", args.signer);
    }
    Ok(())
}

fn authorization_for(fields: &cli::AuthorizationFields, expiry: u64) -> IssuanceAuthorization {
    IssuanceAuthorization::new(fields.instance, fields.holder, fields.amount, fields.nonce, expiry)
}

fn sign_fields(fields: &cli::AuthorizationFields, expiry: u64, signer: &Keypair) -> SignedAuthorization {
    SignedAuthorization::create(authorization_for(fields, expiry), signer)
}

/// Whether `signature_hex` is `signer`'s signature over the authorization
/// described by `fields` and `expiry`.
fn signature_is_valid(
    fields: &cli::AuthorizationFields,
    expiry: u64,
    signer: &Identity,
    signature_hex: &str,
) -> Result<bool> {
    let signature = Signature::from_hex(signature_hex.trim()).context("invalid signature")?;
    let digest = authorization_for(fields, expiry).digest();
    Ok(Ed25519Verifier.verify(&digest, &signature, signer))
}

/// Deploys a registry in memory and prints the resulting state.
async fn deploy_registry(args: cli::DeployArgs) -> Result<()> {
    let file = deploy::DeploymentFile::load(&args.config)?;
    tracing::info!(config = %args.config.display(), "deploying registry");

    let mut request = CreateInstanceRequest::new(args.name, args.symbol);
    if let Some(chain) = args.destination_chain {
        request = request.with_destination(
            chain,
            args.destination_address.unwrap_or_default(),
            args.destination_decimals,
        );
    }

    let summary = deploy::run(file, args.creator, request).await?;
    print_json(&summary)
}

fn format_expiry(expiry: u64) -> String {
    i64::try_from(expiry)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| expiry.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("iou       {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {} ({})", PROTOCOL_VERSION, PROTOCOL_FINGERPRINT);
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}
