//! Tests for the wallet server: account generation and signed transfers.

mod common;

use std::sync::Arc;

use chain_mcp_tools::{
    blockchain::erc20,
    config::Config,
    servers::wallet::{self, generate_account},
    tools::ToolRegistry,
};
use ethers_core::types::{NameOrAddress, U256};
use serde_json::json;

use common::*;

const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn registry(env: chain_mcp_tools::blockchain::Environment) -> ToolRegistry {
    let ctx = context(env, Config::default());
    ToolRegistry::builder().register_all(wallet::tools(&ctx)).build().unwrap()
}

#[tokio::test]
async fn create_account_returns_fresh_credentials() {
    let registry = registry(read_only(Arc::new(StubChain::new("1"))));

    let first = registry.dispatch("create_account", json!({})).await;
    let second = registry.dispatch("create_account", json!({})).await;

    let first = first.data().expect("success envelope");
    assert_eq!(first["mnemonic"].as_str().unwrap().split_whitespace().count(), 12);
    assert_eq!(first["derivationPath"], "m/44'/60'/0'/0/0");
    assert_eq!(first["privateKey"].as_str().unwrap().len(), 66);
    assert_ne!(first["address"], second.data().unwrap()["address"]);
}

#[tokio::test]
async fn create_account_rejects_arguments() {
    let registry = registry(read_only(Arc::new(StubChain::new("1"))));
    let result = registry.dispatch("create_account", json!({ "name": "main" })).await;
    assert!(!result.is_success());
}

#[test]
fn generated_keys_are_usable() {
    let account = generate_account().unwrap();
    assert!(account.address.starts_with("0x"));
    assert_eq!(account.address.len(), 42);
}

#[tokio::test]
async fn read_only_environment_refuses_every_write() {
    let chain = Arc::new(StubChain::new("1"));
    let registry = registry(read_only(chain.clone()));

    for (tool, args) in [
        ("get_account", json!({})),
        ("transfer_native", json!({ "to": RECIPIENT, "amount": "1" })),
        ("transfer_token", json!({ "to": RECIPIENT, "amount": "1", "symbol": "USDC" })),
        ("approve_token", json!({ "spender": RECIPIENT, "amount": "1", "symbol": "USDC" })),
    ] {
        let result = registry.dispatch(tool, args).await;
        let error = result.error().unwrap_or_default().to_string();
        assert!(error.starts_with("precondition failed"), "{}: {}", tool, error);
    }
    assert!(chain.calls().is_empty());
}

#[tokio::test]
async fn get_account_reports_signer_balance() {
    let chain = Arc::new(StubChain::new("1").with_balance(U256::exp10(17)));
    let result = registry(read_write(chain)).dispatch("get_account", json!({})).await;
    let data = result.data().expect("success envelope");
    assert_eq!(data["address"], DEV_ADDRESS);
    assert_eq!(data["balance"], "0.1");
}

#[tokio::test]
async fn native_transfer_is_signed_and_sent() {
    let chain = Arc::new(StubChain::new("1"));
    let result = registry(read_write(chain.clone()))
        .dispatch("transfer_native", json!({ "to": RECIPIENT, "amount": "0.25" }))
        .await;

    let data = result.data().expect("success envelope");
    assert_eq!(data["from"], DEV_ADDRESS);
    assert_eq!(data["to"], RECIPIENT);
    assert_eq!(data["amountRaw"], "250000000000000000");

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].value, Some(U256::from(250_000_000_000_000_000u64)));
}

#[tokio::test]
async fn zero_transfer_is_rejected_before_sending() {
    let chain = Arc::new(StubChain::new("1"));
    let result = registry(read_write(chain.clone()))
        .dispatch("transfer_native", json!({ "to": RECIPIENT, "amount": "0" }))
        .await;
    assert!(result.error().unwrap().contains("zero"));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn token_transfer_targets_the_token_contract() {
    let chain = Arc::new(StubChain::new("1"));
    let result = registry(read_write(chain.clone()))
        .dispatch("transfer_token", json!({ "to": RECIPIENT, "amount": "12.5", "symbol": "USDC" }))
        .await;

    let data = result.data().expect("success envelope");
    assert_eq!(data["amountRaw"], "12500000");
    assert_eq!(data["symbol"], "USDC");

    let sent = chain.sent();
    let usdc = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".parse().unwrap();
    assert_eq!(sent[0].to, Some(NameOrAddress::Address(usdc)));
    let calldata = sent[0].data.as_ref().unwrap();
    assert_eq!(hex::encode(&calldata[..4]), hex_selector(erc20::TRANSFER));
}

#[tokio::test]
async fn zero_approval_revokes() {
    let chain = Arc::new(StubChain::new("1"));
    let result = registry(read_write(chain.clone()))
        .dispatch("approve_token", json!({ "spender": RECIPIENT, "amount": "0", "symbol": "USDC" }))
        .await;

    assert_eq!(result.data().expect("success envelope")["amountRaw"], "0");
    let calldata = chain.sent()[0].data.clone().unwrap();
    assert_eq!(hex::encode(&calldata[..4]), hex_selector(erc20::APPROVE));
    assert!(calldata[4 + 32..].iter().all(|b| *b == 0));
}
