//! Tests of the JSON-RPC transport against a mock node.
//!
//! Each node method gets a canned answer. Submitted transactions are decoded from the
//! recorded `eth_sendRawTransaction` request to check what was signed.

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::Bytes;
use alloy_eips::eip2718::Decodable2718;
use lottery_deploy::{
    Address, ContractArtifact, DEFAULT_PRIORITY_FEE, DeployError, DeployTransport,
    DeploymentReceipt, PrivateKeySigner, RpcTransport, TxHash,
};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Anvil / Hardhat default account #0.
const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

const SENT_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const CONTRACT_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

async fn answer(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result
        })))
        .mount(server)
        .await;
}

async fn answer_error(server: &MockServer, rpc_method: &str, error: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": error
        })))
        .mount(server)
        .await;
}

/// Answers every call `populate` makes, on a chain with the given latest block.
async fn node_state(server: &MockServer, chain_id: &str, latest_block: Value) {
    answer(server, "eth_chainId", json!(chain_id)).await;
    answer(server, "eth_getTransactionCount", json!("0x3")).await;
    answer(server, "eth_estimateGas", json!("0x7a120")).await;
    answer(server, "eth_getBlockByNumber", latest_block).await;
}

fn transport(server: &MockServer, expected_chain_id: Option<u64>) -> RpcTransport {
    RpcTransport::new(Url::parse(&server.uri()).unwrap(), expected_chain_id).unwrap()
}

fn dev_signer() -> PrivateKeySigner {
    DEV_KEY.parse().unwrap()
}

fn lottery_artifact() -> ContractArtifact {
    ContractArtifact {
        name: "lottery".to_string(),
        abi: JsonAbi::default(),
        bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        path: None,
    }
}

/// Bodies of every request sent for `rpc_method`.
async fn requests_for(server: &MockServer, rpc_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.body_json::<Value>().unwrap())
        .filter(|body| body["method"] == rpc_method)
        .collect()
}

/// The transaction carried by the single `eth_sendRawTransaction` request.
async fn sent_transaction(server: &MockServer) -> TxEnvelope {
    let sent = requests_for(server, "eth_sendRawTransaction").await;
    assert_eq!(sent.len(), 1);
    let raw: Bytes = serde_json::from_value(sent[0]["params"][0].clone()).unwrap();
    let mut buf: &[u8] = &raw;
    TxEnvelope::decode_2718(&mut buf).unwrap()
}

#[tokio::test]
async fn test_chain_id_mismatch_refuses_to_submit() {
    let server = MockServer::start().await;
    node_state(&server, "0x1", json!({ "baseFeePerGas": "0x3b9aca00" })).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = transport(&server, Some(80001))
        .submit_deployment(&dev_signer(), &lottery_artifact())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::Submission(_)), "got {err:?}");
    assert!(err.to_string().contains("chain 1"));
    assert!(err.to_string().contains("chain 80001"));
}

#[tokio::test]
async fn test_eip1559_creation_with_default_tip() {
    let server = MockServer::start().await;
    node_state(&server, "0x13881", json!({ "baseFeePerGas": "0x3b9aca00" })).await;
    answer_error(
        &server,
        "eth_maxPriorityFeePerGas",
        json!({ "code": -32601, "message": "method not found" }),
    )
    .await;
    answer(&server, "eth_sendRawTransaction", json!(SENT_HASH)).await;

    let tx_hash = transport(&server, Some(80001))
        .submit_deployment(&dev_signer(), &lottery_artifact())
        .await
        .unwrap();
    assert_eq!(tx_hash, SENT_HASH.parse::<TxHash>().unwrap());

    let envelope = sent_transaction(&server).await;
    let TxEnvelope::Eip1559(signed) = &envelope else {
        panic!("expected a dynamic fee transaction, got {envelope:?}");
    };
    let tx = signed.tx();
    assert_eq!(tx.chain_id, 80001);
    assert_eq!(tx.nonce, 3);
    assert_eq!(tx.gas_limit, 500_000);
    assert_eq!(tx.max_priority_fee_per_gas, DEFAULT_PRIORITY_FEE);
    assert_eq!(tx.max_fee_per_gas, 2 * 1_000_000_000 + DEFAULT_PRIORITY_FEE);
    assert!(envelope.is_create());
    assert_eq!(envelope.input(), &lottery_artifact().bytecode);

    let estimate = requests_for(&server, "eth_estimateGas").await;
    let from: Address = serde_json::from_value(estimate[0]["params"][0]["from"].clone()).unwrap();
    assert_eq!(from, DEV_ADDRESS.parse::<Address>().unwrap());
    let nonce = requests_for(&server, "eth_getTransactionCount").await;
    assert_eq!(nonce[0]["params"][1], "pending");
}

#[tokio::test]
async fn test_eip1559_uses_node_tip() {
    let server = MockServer::start().await;
    node_state(&server, "0x13881", json!({ "baseFeePerGas": "0x64" })).await;
    answer(&server, "eth_maxPriorityFeePerGas", json!("0xa")).await;
    answer(&server, "eth_sendRawTransaction", json!(SENT_HASH)).await;

    transport(&server, None)
        .submit_deployment(&dev_signer(), &lottery_artifact())
        .await
        .unwrap();

    let envelope = sent_transaction(&server).await;
    assert_eq!(envelope.max_priority_fee_per_gas(), Some(10));
    assert_eq!(envelope.max_fee_per_gas(), 210);
}

#[tokio::test]
async fn test_legacy_creation_without_base_fee() {
    let server = MockServer::start().await;
    node_state(&server, "0x7a69", json!({ "number": "0x5" })).await;
    answer(&server, "eth_gasPrice", json!("0x4a817c800")).await;
    answer(&server, "eth_sendRawTransaction", json!(SENT_HASH)).await;

    transport(&server, Some(31337))
        .submit_deployment(&dev_signer(), &lottery_artifact())
        .await
        .unwrap();

    let envelope = sent_transaction(&server).await;
    let TxEnvelope::Legacy(signed) = &envelope else {
        panic!("expected a legacy transaction, got {envelope:?}");
    };
    assert_eq!(signed.tx().gas_price, 20_000_000_000);
    assert_eq!(signed.tx().chain_id, Some(31337));
    assert!(requests_for(&server, "eth_maxPriorityFeePerGas").await.is_empty());
}

#[tokio::test]
async fn test_node_rejection_is_a_submission_error() {
    let server = MockServer::start().await;
    node_state(&server, "0x7a69", json!({ "baseFeePerGas": "0x1" })).await;
    answer(&server, "eth_maxPriorityFeePerGas", json!("0x1")).await;
    answer_error(
        &server,
        "eth_sendRawTransaction",
        json!({ "code": -32000, "message": "nonce too low" }),
    )
    .await;

    let err = transport(&server, Some(31337))
        .submit_deployment(&dev_signer(), &lottery_artifact())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Submission(_)), "got {err:?}");
    assert!(err.to_string().contains("nonce too low"));
}

#[tokio::test]
async fn test_pending_receipt_is_none() {
    let server = MockServer::start().await;
    answer(&server, "eth_getTransactionReceipt", Value::Null).await;

    let receipt = transport(&server, None)
        .transaction_receipt(SENT_HASH.parse().unwrap())
        .await
        .unwrap();

    assert_eq!(receipt, None);
}

#[tokio::test]
async fn test_mined_receipt() {
    let server = MockServer::start().await;
    answer(
        &server,
        "eth_getTransactionReceipt",
        json!({
            "transactionHash": SENT_HASH,
            "blockNumber": "0x2a",
            "gasUsed": "0x5208",
            "status": "0x1",
            "contractAddress": CONTRACT_ADDRESS
        }),
    )
    .await;

    let receipt = transport(&server, None)
        .transaction_receipt(SENT_HASH.parse().unwrap())
        .await
        .unwrap()
        .unwrap();

    assert!(receipt.success);
    assert_eq!(receipt.block_number, 42);
    assert_eq!(receipt.contract_address, Some(CONTRACT_ADDRESS.parse().unwrap()));
}

#[tokio::test]
async fn test_block_number() {
    let server = MockServer::start().await;
    answer(&server, "eth_blockNumber", json!("0x64")).await;

    assert_eq!(transport(&server, None).block_number().await.unwrap(), 100);
}

#[tokio::test]
async fn test_revert_reason_from_replay() {
    let server = MockServer::start().await;
    answer(
        &server,
        "eth_getTransactionByHash",
        json!({
            "hash": SENT_HASH,
            "from": DEV_ADDRESS,
            "input": "0x6080604052",
            "gas": "0x7a120"
        }),
    )
    .await;
    answer_error(
        &server,
        "eth_call",
        json!({ "code": 3, "message": "execution reverted: manager only", "data": "0x08c379a0" }),
    )
    .await;

    let receipt = DeploymentReceipt {
        tx_hash: SENT_HASH.parse().unwrap(),
        block_number: 42,
        gas_used: 500_000,
        success: false,
        contract_address: None,
    };
    let reason = transport(&server, None).revert_reason(&receipt).await.unwrap();

    assert!(reason.contains("execution reverted: manager only"));
    let replay = requests_for(&server, "eth_call").await;
    assert_eq!(replay[0]["params"][1], "0x29");
    assert_eq!(replay[0]["params"][0]["data"], "0x6080604052");
}

#[tokio::test]
async fn test_revert_reason_unknown_transaction() {
    let server = MockServer::start().await;
    answer(&server, "eth_getTransactionByHash", Value::Null).await;

    let receipt = DeploymentReceipt {
        tx_hash: SENT_HASH.parse().unwrap(),
        block_number: 42,
        gas_used: 500_000,
        success: false,
        contract_address: None,
    };

    assert_eq!(transport(&server, None).revert_reason(&receipt).await, None);
}
