//! Error taxonomy for a deployment run.

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::TxHash;

/// Process exit code reported for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit code reported for any failed run.
pub const EXIT_FAILURE: u8 = 1;

/// Every way a deployment run can fail.
///
/// None of these are retried: a failure at any stage terminates the run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Missing or malformed signer credential, endpoint or other setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The compiled artifact does not exist.
    #[error(
        "artifact `{name}` not found under {} (has the contract been compiled?)",
        .searched.display()
    )]
    ArtifactNotFound { name: String, searched: PathBuf },

    /// The artifact exists but cannot be deployed as-is.
    #[error("artifact `{name}` cannot be deployed: {reason}")]
    InvalidArtifact { name: String, reason: String },

    /// The network rejected the transaction before inclusion, or could not be reached.
    #[error("failed to submit deployment transaction: {0:#}")]
    Submission(#[source] anyhow::Error),

    /// No final state was observed within the wait budget.
    #[error(
        "confirmation status unknown: transaction {tx_hash} was not confirmed within {}s \
         and may still be mined, check the network before redeploying",
        .timeout.as_secs()
    )]
    ConfirmationTimeout { tx_hash: TxHash, timeout: Duration },

    /// The transaction was included but contract construction failed.
    #[error(
        "deployment transaction {tx_hash} reverted{}",
        .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    TransactionReverted {
        tx_hash: TxHash,
        reason: Option<String>,
    },

    /// A successful receipt that does not carry a usable contract address.
    #[error("receipt for transaction {tx_hash} has no contract address")]
    InvalidReceipt { tx_hash: TxHash },

    /// The progress report could not be written.
    #[error("failed to write deployment report: {0}")]
    Report(#[from] std::io::Error),
}

impl DeployError {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}

impl From<figment::Error> for DeployError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
