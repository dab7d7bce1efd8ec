//! The network collaborator used by the deployment pipeline.
//!
//! [`DeployTransport`] is the seam between the pipeline and the chain. [`RpcTransport`]
//! implements it over HTTP JSON-RPC: the transaction is populated from the node (chain ID,
//! nonce, gas, fees), signed locally and sent raw.

use std::future::Future;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, Bytes, TxHash, TxKind};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{ContractArtifact, DeployError, rpc};

/// Priority fee used when the node does not implement `eth_maxPriorityFeePerGas` (1.5 gwei).
pub const DEFAULT_PRIORITY_FEE: u128 = 1_500_000_000;

/// The outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Whether execution succeeded. `false` means the transaction reverted.
    pub success: bool,
    /// The created contract, present only for successful deployments.
    pub contract_address: Option<Address>,
}

/// Network operations the deployment pipeline depends on.
pub trait DeployTransport: Send + Sync {
    /// Sign and submit a transaction creating `artifact`, returning its hash.
    ///
    /// Any rejection before inclusion is a [`DeployError::Submission`].
    fn submit_deployment(
        &self,
        signer: &PrivateKeySigner,
        artifact: &ContractArtifact,
    ) -> impl Future<Output = Result<TxHash, DeployError>> + Send;

    /// Fetch the receipt of a transaction, `None` while it is still pending.
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = anyhow::Result<Option<DeploymentReceipt>>> + Send;

    /// The latest block number.
    fn block_number(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Best-effort explanation of why a reverted deployment failed.
    fn revert_reason(
        &self,
        _receipt: &DeploymentReceipt,
    ) -> impl Future<Output = Option<String>> + Send {
        async { None }
    }
}

/// Fee fields of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    /// Dynamic fee (EIP-1559) for networks reporting a base fee.
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    /// Legacy gas price for networks without a base fee.
    Legacy { gas_price: u128 },
}

impl FeeParams {
    /// Fees for a block with the given base fee: twice the base fee plus the tip.
    pub fn eip1559(base_fee: u128, priority_fee: u128) -> Self {
        FeeParams::Eip1559 {
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        }
    }
}

/// The fields needed to build the creation transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fees: FeeParams,
    pub bytecode: Bytes,
}

impl DeploymentRequest {
    /// Sign the request and wrap it in an EIP-2718 envelope.
    pub fn sign(self, signer: &PrivateKeySigner) -> anyhow::Result<TxEnvelope> {
        let envelope = match self.fees {
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = TxEip1559 {
                    chain_id: self.chain_id,
                    nonce: self.nonce,
                    gas_limit: self.gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to: TxKind::Create,
                    input: self.bytecode,
                    ..Default::default()
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .context("Failed to sign EIP-1559 deployment transaction")?;
                TxEnvelope::from(tx.into_signed(signature))
            }
            FeeParams::Legacy { gas_price } => {
                let mut tx = TxLegacy {
                    chain_id: Some(self.chain_id),
                    nonce: self.nonce,
                    gas_price,
                    gas_limit: self.gas_limit,
                    to: TxKind::Create,
                    input: self.bytecode,
                    ..Default::default()
                };
                let signature = signer
                    .sign_transaction_sync(&mut tx)
                    .context("Failed to sign legacy deployment transaction")?;
                TxEnvelope::from(tx.into_signed(signature))
            }
        };

        Ok(envelope)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlock {
    #[serde(default, deserialize_with = "rpc::deserialize_opt_u128_quantity")]
    base_fee_per_gas: Option<u128>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: TxHash,
    #[serde(deserialize_with = "rpc::deserialize_u64_quantity")]
    block_number: u64,
    #[serde(deserialize_with = "rpc::deserialize_u64_quantity")]
    gas_used: u64,
    /// Absent on pre-Byzantium receipts.
    #[serde(default, deserialize_with = "rpc::deserialize_opt_u128_quantity")]
    status: Option<u128>,
    #[serde(default)]
    contract_address: Option<Address>,
}

impl From<RawReceipt> for DeploymentReceipt {
    fn from(raw: RawReceipt) -> Self {
        let success = raw.status.is_none_or(|status| status == 1);
        Self {
            tx_hash: raw.transaction_hash,
            block_number: raw.block_number,
            gas_used: raw.gas_used,
            success,
            contract_address: raw.contract_address.filter(|_| success),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentTransaction {
    from: Address,
    input: Bytes,
    #[serde(deserialize_with = "rpc::deserialize_u64_quantity")]
    gas: u64,
}

/// [`DeployTransport`] over an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    client: reqwest::Client,
    endpoint: Url,
    expected_chain_id: Option<u64>,
}

impl RpcTransport {
    /// Create a transport for `endpoint`. When `expected_chain_id` is set, submissions are
    /// refused if the node reports a different chain.
    pub fn new(endpoint: Url, expected_chain_id: Option<u64>) -> anyhow::Result<Self> {
        Ok(Self {
            client: rpc::create_client(rpc::DEFAULT_TIMEOUT)?,
            endpoint,
            expected_chain_id,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> anyhow::Result<T> {
        rpc::json_rpc_call(&self.client, self.endpoint.as_str(), method, params).await
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> anyhow::Result<u128> {
        let value: String = self.call(method, params).await?;
        rpc::parse_quantity(&value)
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        let chain_id = self.quantity("eth_chainId", vec![]).await?;
        let chain_id = u64::try_from(chain_id).context("Chain ID does not fit in u64")?;

        if let Some(expected) = self.expected_chain_id {
            if chain_id != expected {
                anyhow::bail!(
                    "Endpoint {} is on chain {}, but the configuration expects chain {}",
                    self.endpoint,
                    chain_id,
                    expected
                );
            }
        }

        Ok(chain_id)
    }

    async fn fee_params(&self) -> anyhow::Result<FeeParams> {
        let block: LatestBlock = self
            .call("eth_getBlockByNumber", vec!["latest".into(), false.into()])
            .await
            .context("Failed to fetch latest block")?;

        match block.base_fee_per_gas {
            Some(base_fee) => {
                let priority_fee = match self.quantity("eth_maxPriorityFeePerGas", vec![]).await {
                    Ok(fee) => fee,
                    Err(e) => {
                        tracing::debug!(error = %e, "eth_maxPriorityFeePerGas unavailable, using default tip");
                        DEFAULT_PRIORITY_FEE
                    }
                };
                Ok(FeeParams::eip1559(base_fee, priority_fee))
            }
            None => {
                let gas_price = self
                    .quantity("eth_gasPrice", vec![])
                    .await
                    .context("Failed to fetch gas price")?;
                Ok(FeeParams::Legacy { gas_price })
            }
        }
    }

    /// Populate the creation transaction from the node's current state.
    async fn populate(
        &self,
        from: Address,
        artifact: &ContractArtifact,
    ) -> anyhow::Result<DeploymentRequest> {
        let chain_id = self.chain_id().await?;

        let nonce = self
            .quantity(
                "eth_getTransactionCount",
                vec![serde_json::json!(from), "pending".into()],
            )
            .await
            .context("Failed to fetch account nonce")?;

        let gas_limit = self
            .quantity(
                "eth_estimateGas",
                vec![serde_json::json!({
                    "from": from,
                    "data": artifact.bytecode,
                })],
            )
            .await
            .context("Failed to estimate deployment gas")?;

        let fees = self.fee_params().await?;

        Ok(DeploymentRequest {
            chain_id,
            nonce: u64::try_from(nonce).context("Nonce does not fit in u64")?,
            gas_limit: u64::try_from(gas_limit).context("Gas estimate does not fit in u64")?,
            fees,
            bytecode: artifact.bytecode.clone(),
        })
    }
}

impl DeployTransport for RpcTransport {
    async fn submit_deployment(
        &self,
        signer: &PrivateKeySigner,
        artifact: &ContractArtifact,
    ) -> Result<TxHash, DeployError> {
        let from = signer.address();

        let request = self
            .populate(from, artifact)
            .await
            .map_err(DeployError::Submission)?;

        tracing::debug!(
            chain_id = request.chain_id,
            nonce = request.nonce,
            gas_limit = request.gas_limit,
            fees = ?request.fees,
            "Deployment transaction populated"
        );

        let envelope = request.sign(signer).map_err(DeployError::Submission)?;
        let raw = Bytes::from(envelope.encoded_2718());

        let tx_hash: TxHash = self
            .call("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
            .map_err(DeployError::Submission)?;

        if tx_hash != *envelope.tx_hash() {
            tracing::warn!(
                node = %tx_hash,
                local = %envelope.tx_hash(),
                "Node returned a different transaction hash than the one signed"
            );
        }

        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> anyhow::Result<Option<DeploymentReceipt>> {
        let receipt: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await?;
        Ok(receipt.map(DeploymentReceipt::from))
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let number = self.quantity("eth_blockNumber", vec![]).await?;
        u64::try_from(number).context("Block number does not fit in u64")
    }

    /// Replays the creation as an `eth_call` on the parent block and returns the node's error.
    async fn revert_reason(&self, receipt: &DeploymentReceipt) -> Option<String> {
        let tx: SentTransaction = match self
            .call("eth_getTransactionByHash", vec![serde_json::json!(receipt.tx_hash)])
            .await
        {
            Ok(Some(tx)) => tx,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to fetch reverted transaction");
                return None;
            }
        };

        let parent = rpc::to_quantity(u128::from(receipt.block_number.saturating_sub(1)));
        let replay: anyhow::Result<Bytes> = self
            .call(
                "eth_call",
                vec![
                    serde_json::json!({
                        "from": tx.from,
                        "data": tx.input,
                        "gas": rpc::to_quantity(u128::from(tx.gas)),
                    }),
                    parent.into(),
                ],
            )
            .await;

        match replay {
            Err(e) => Some(format!("{e:#}")),
            // The replay succeeded on the parent state, so the revert depended on the block itself.
            Ok(_) => None,
        }
    }
}
