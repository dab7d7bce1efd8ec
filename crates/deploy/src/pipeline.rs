//! The deploy-and-report sequence.
//!
//! A run moves through `INIT → SIGNER_RESOLVED → ARTIFACT_RESOLVED → SUBMITTED → CONFIRMED`.
//! Any failure moves it to `FAILED` and aborts the remaining steps. Nothing is retried.

use std::{io::Write, time::Duration};

use alloy_core::primitives::{Address, TxHash};
use alloy_signer_local::PrivateKeySigner;

use crate::{
    ArtifactResolver, ConfirmationConfig, ContractArtifact, Credential, DeployConfig,
    DeployError, DeployTransport, DeploymentReceipt, EXIT_SUCCESS, FsArtifacts, RpcTransport,
    resolve_signer,
};

/// Upper bound on fetching the revert reason of a failed deployment.
pub const REVERT_REASON_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    SignerResolved,
    ArtifactResolved,
    Submitted,
    Confirmed,
    Failed,
}

/// A confirmed deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    /// The address of the created contract. Never the zero address.
    pub address: Address,
    /// The transaction that created it.
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Deploys one contract and reports the result.
///
/// The transport, artifact source and credentials are all injected, so any of them can be
/// replaced in tests.
#[derive(Debug)]
pub struct DeploymentPipeline<T, R> {
    transport: T,
    artifacts: R,
    accounts: Vec<Credential>,
    contract: String,
    label: String,
    confirmation: ConfirmationConfig,
}

impl DeploymentPipeline<RpcTransport, FsArtifacts> {
    /// Build a pipeline talking JSON-RPC to the configured endpoint and reading artifacts from disk.
    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        let transport = RpcTransport::new(config.network.endpoint.clone(), config.network.chain_id)
            .map_err(|e| DeployError::Configuration(format!("{e:#}")))?;

        Ok(Self::new(
            transport,
            FsArtifacts::new(&config.artifacts.dir),
            config.network.accounts.clone(),
            config.artifacts.contract.clone(),
        )
        .with_confirmation(config.confirmation))
    }
}

impl<T, R> DeploymentPipeline<T, R>
where
    T: DeployTransport,
    R: ArtifactResolver,
{
    pub fn new(
        transport: T,
        artifacts: R,
        accounts: Vec<Credential>,
        contract: impl Into<String>,
    ) -> Self {
        let contract = contract.into();
        Self {
            label: report_label(&contract),
            transport,
            artifacts,
            accounts,
            contract,
            confirmation: ConfirmationConfig::default(),
        }
    }

    /// Set the bounds of the confirmation wait.
    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Set the label of the final report line (`<label> address: ...`).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the pipeline, writing progress lines to `out`.
    ///
    /// On success `out` holds the deployer line followed by the contract address line.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<DeployedContract, DeployError> {
        let mut stage = Stage::Init;
        let result = self.run_stages(out, &mut stage).await;

        if let Err(ref e) = result {
            tracing::error!(stage = %stage, error = %e, "Deployment failed");
            stage = self.advance(stage, Stage::Failed);
        }
        debug_assert!(matches!(stage, Stage::Confirmed | Stage::Failed));

        result
    }

    /// Run the pipeline and map the outcome to a process exit code, writing errors to `err`.
    pub async fn execute<W: Write, E: Write>(&self, out: &mut W, err: &mut E) -> u8 {
        match self.run(out).await {
            Ok(_) => EXIT_SUCCESS,
            Err(e) => {
                if let Err(write_err) = writeln!(err, "Error: {e}") {
                    tracing::error!(error = %write_err, "Failed to write error report");
                }
                e.exit_code()
            }
        }
    }

    async fn run_stages<W: Write>(
        &self,
        out: &mut W,
        stage: &mut Stage,
    ) -> Result<DeployedContract, DeployError> {
        let signer = resolve_signer(&self.accounts)?;
        *stage = self.advance(*stage, Stage::SignerResolved);
        writeln!(out, "Deploying contracts with the account: {}", signer.address())?;

        let artifact = self.artifacts.resolve(&self.contract)?;
        *stage = self.advance(*stage, Stage::ArtifactResolved);

        let tx_hash = self.submit(&signer, &artifact).await?;
        *stage = self.advance(*stage, Stage::Submitted);

        let receipt = self.await_confirmation(tx_hash).await?;
        let deployed = into_deployed(receipt)?;
        *stage = self.advance(*stage, Stage::Confirmed);

        tracing::info!(
            address = %deployed.address,
            tx_hash = %deployed.tx_hash,
            block = deployed.block_number,
            gas_used = deployed.gas_used,
            "Contract deployed"
        );
        writeln!(out, "{} address: {}", self.label, deployed.address)?;

        Ok(deployed)
    }

    fn advance(&self, from: Stage, to: Stage) -> Stage {
        tracing::debug!(from = %from, to = %to, contract = %self.contract, "Stage transition");
        to
    }

    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        artifact: &ContractArtifact,
    ) -> Result<TxHash, DeployError> {
        tracing::info!(
            contract = %artifact.name,
            deployer = %signer.address(),
            bytecode_len = artifact.bytecode.len(),
            "Submitting deployment transaction..."
        );

        let tx_hash = self.transport.submit_deployment(signer, artifact).await?;

        tracing::info!(tx_hash = %tx_hash, "Deployment transaction sent");
        Ok(tx_hash)
    }

    /// Wait for the transaction to reach a final state within the configured timeout.
    ///
    /// The timeout bounds the receipt and confirmation-depth polls only. Once a revert has been
    /// observed the run fails as reverted, however long the reason lookup takes.
    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<DeploymentReceipt, DeployError> {
        let timeout = self.confirmation.timeout();
        let deadline = tokio::time::Instant::now() + timeout;

        tracing::info!(
            tx_hash = %tx_hash,
            timeout_secs = timeout.as_secs(),
            confirmations = self.confirmation.confirmations,
            "Waiting for confirmation..."
        );

        let timed_out = || DeployError::ConfirmationTimeout { tx_hash, timeout };

        let receipt = tokio::time::timeout_at(deadline, self.poll_receipt(tx_hash))
            .await
            .map_err(|_| timed_out())?;

        if !receipt.success {
            let reason = self.revert_reason(&receipt).await;
            return Err(DeployError::TransactionReverted { tx_hash, reason });
        }

        if self.confirmation.confirmations > 1 {
            let target = receipt
                .block_number
                .saturating_add(self.confirmation.confirmations - 1);
            tokio::time::timeout_at(deadline, self.poll_depth(target))
                .await
                .map_err(|_| timed_out())?;
        }

        Ok(receipt)
    }

    async fn poll_receipt(&self, tx_hash: TxHash) -> DeploymentReceipt {
        let poll_interval = self.confirmation.poll_interval();

        loop {
            match self.transport.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => tracing::trace!(tx_hash = %tx_hash, "Transaction pending"),
                Err(e) => {
                    tracing::debug!(error = %e, tx_hash = %tx_hash, "Receipt poll failed, polling again...")
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn poll_depth(&self, target: u64) {
        let poll_interval = self.confirmation.poll_interval();

        loop {
            match self.transport.block_number().await {
                Ok(head) if head >= target => return,
                Ok(head) => tracing::trace!(head, target, "Waiting for more confirmations"),
                Err(e) => {
                    tracing::debug!(error = %e, "Block number poll failed, polling again...")
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Ask the transport why the deployment reverted, giving up after [`REVERT_REASON_TIMEOUT`].
    async fn revert_reason(&self, receipt: &DeploymentReceipt) -> Option<String> {
        match tokio::time::timeout(REVERT_REASON_TIMEOUT, self.transport.revert_reason(receipt)).await
        {
            Ok(reason) => reason,
            Err(_) => {
                tracing::debug!(tx_hash = %receipt.tx_hash, "Revert reason lookup timed out");
                None
            }
        }
    }
}

/// A successful receipt must carry a non-zero contract address.
fn into_deployed(receipt: DeploymentReceipt) -> Result<DeployedContract, DeployError> {
    match receipt.contract_address {
        Some(address) if address != Address::ZERO => Ok(DeployedContract {
            address,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }),
        _ => Err(DeployError::InvalidReceipt {
            tx_hash: receipt.tx_hash,
        }),
    }
}

/// `lottery` → `Lottery`, `contracts/Lottery.sol:lottery` → `Lottery`.
fn report_label(contract: &str) -> String {
    let name = contract.rsplit(':').next().unwrap_or(contract);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
