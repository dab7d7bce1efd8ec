//! lottery-deploy - One-shot deployment of the lottery contract.
//!
//! This crate resolves a signer and a compiled artifact, submits the creation transaction,
//! waits for it to be confirmed and reports the resulting contract address. Every failure is
//! surfaced as a [`DeployError`] and maps to a non-zero exit code.

mod artifact;
mod config;
mod error;
mod pipeline;
pub mod rpc;
mod signer;
mod transport;

pub use artifact::{ArtifactResolver, ContractArtifact, FsArtifacts};
pub use config::{
    ArtifactsConfig, CONFIG_FILENAME, ConfirmationConfig, Credential, DEFAULT_CONTRACT_NAME,
    DEFAULT_ENDPOINT, DeployConfig, ENV_PREFIX, ExplorerConfig, LEGACY_EXPLORER_KEY_VAR,
    LEGACY_PRIVATE_KEY_VAR, NetworkConfig,
};
pub use error::{DeployError, EXIT_FAILURE, EXIT_SUCCESS};
pub use pipeline::{DeployedContract, DeploymentPipeline, REVERT_REASON_TIMEOUT, Stage};
pub use signer::{resolve_signer, signer_from_credential};
pub use transport::{
    DEFAULT_PRIORITY_FEE, DeployTransport, DeploymentReceipt, DeploymentRequest, FeeParams,
    RpcTransport,
};

// Types that appear in the public API.
pub use alloy_core::primitives::{Address, TxHash};
pub use alloy_signer_local::PrivateKeySigner;
