//! Signer resolution from configured credentials.

use alloy_core::primitives::B256;
use alloy_signer_local::PrivateKeySigner;

use crate::{Credential, DeployError};

/// Resolve the deployer from the configured credential pool.
///
/// Only the first credential is used; the rest are ignored.
pub fn resolve_signer(accounts: &[Credential]) -> Result<PrivateKeySigner, DeployError> {
    let (first, rest) = accounts.split_first().ok_or_else(|| {
        DeployError::Configuration(
            "no signer credential configured (set `network.accounts` or `pk`)".to_string(),
        )
    })?;

    if !rest.is_empty() {
        tracing::debug!(ignored = rest.len(), "Using the first configured account only");
    }

    signer_from_credential(first)
}

/// Parse a hex-encoded secp256k1 private key, with or without `0x` prefix.
pub fn signer_from_credential(credential: &Credential) -> Result<PrivateKeySigner, DeployError> {
    let secret = credential.expose().trim();
    let secret = secret.strip_prefix("0x").unwrap_or(secret);

    let bytes = hex::decode(secret).map_err(|_| {
        DeployError::Configuration("signer credential is not valid hex".to_string())
    })?;

    let bytes: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        DeployError::Configuration(format!(
            "signer credential must be exactly 32 bytes, got {}",
            bytes.len()
        ))
    })?;

    PrivateKeySigner::from_bytes(&B256::from(bytes)).map_err(|_| {
        DeployError::Configuration("signer credential is not a valid secp256k1 key".to_string())
    })
}
