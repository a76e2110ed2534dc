//! ABI detection and generic contract reads.

mod common;

use std::str::FromStr;
use std::sync::Arc;

use chain_mcp_tools::{
    blockchain::{abi::encode_call, probe::detect_abi, probe::ContractAbi},
    config::Config,
    error::ToolError,
    servers::contract,
    tools::ToolRegistry,
};
use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, U256};
use serde_json::json;

use common::*;

const SUPPORTS_INTERFACE: &str = "supportsInterface(bytes4)";

fn interface_call(id: [u8; 4]) -> Vec<u8> {
    encode_call(SUPPORTS_INTERFACE, &[Token::FixedBytes(id.to_vec())]).to_vec()
}

fn contract_address() -> Address {
    Address::from_str(STRK).unwrap()
}

#[tokio::test]
async fn erc20_is_detected_after_nft_probes_fail() {
    let chain = StubChain::new("1")
        .answer("totalSupply()", uint(U256::exp10(21)))
        .answer("decimals()", uint(18u8));

    let abi = detect_abi(&chain, contract_address()).await.unwrap();

    assert_eq!(abi, ContractAbi::Erc20);
    assert_eq!(
        chain.calls(),
        vec![
            hex_selector(SUPPORTS_INTERFACE),
            hex_selector(SUPPORTS_INTERFACE),
            hex_selector("totalSupply()"),
            hex_selector("decimals()")
        ]
    );
}

#[tokio::test]
async fn erc721_stops_the_probe() {
    let chain = StubChain::new("1")
        .answer_calldata(interface_call([0xd9, 0xb6, 0x7a, 0x26]), boolean(false))
        .answer_calldata(interface_call([0x80, 0xac, 0x58, 0xcd]), boolean(true))
        .answer("totalSupply()", uint(10u8));

    let abi = detect_abi(&chain, contract_address()).await.unwrap();

    assert_eq!(abi, ContractAbi::Erc721);
    assert_eq!(chain.calls().len(), 2);
}

#[tokio::test]
async fn exhausted_probes_are_unknown_abi() {
    let chain = StubChain::new("1");
    let err = detect_abi(&chain, contract_address()).await.unwrap_err();
    assert!(matches!(err, ToolError::UnknownAbi(ref a) if a == STRK));
    assert_eq!(chain.calls().len(), 3);
}

#[tokio::test]
async fn detection_reports_the_contract_owner() {
    let owner = Address::from_str(DEV_ADDRESS).unwrap();
    let chain = Arc::new(
        StubChain::new("1")
            .answer_calldata(interface_call([0xd9, 0xb6, 0x7a, 0x26]), boolean(false))
            .answer_calldata(interface_call([0x80, 0xac, 0x58, 0xcd]), boolean(true))
            .answer("owner()", encode(&[Token::Address(owner)])),
    );

    let result = registry(chain.clone()).dispatch("detect_contract_abi", json!({ "address": STRK })).await;

    let data = result.data().expect("success envelope");
    assert_eq!(data["abi"], "ERC721");
    assert_eq!(data["owner"], DEV_ADDRESS);
    assert_eq!(chain.calls().last(), Some(&hex_selector("owner()")));
}

#[tokio::test]
async fn detection_without_owner_reports_null() {
    let chain = Arc::new(
        StubChain::new("1")
            .answer("totalSupply()", uint(U256::exp10(21)))
            .answer("decimals()", uint(18u8)),
    );
    let result = registry(chain).dispatch("detect_contract_abi", json!({ "address": STRK })).await;
    let data = result.data().expect("success envelope");
    assert_eq!(data["abi"], "ERC20");
    assert!(data["owner"].is_null());
}

fn registry(chain: Arc<StubChain>) -> ToolRegistry {
    let ctx = context(read_only(chain), Config::default());
    ToolRegistry::builder().register_all(contract::tools(&ctx)).build().unwrap()
}

#[tokio::test]
async fn is_contract_reports_code_size() {
    let chain = Arc::new(StubChain::new("1").with_code(vec![0x60, 0x80, 0x60, 0x40]));
    let result = registry(chain).dispatch("is_contract", json!({ "address": STRK })).await;
    let data = result.data().unwrap();
    assert_eq!(data["isContract"], true);
    assert_eq!(data["codeSize"], 4);
}

#[tokio::test]
async fn read_contract_decodes_named_outputs() {
    let chain = Arc::new(StubChain::new("1").answer("balanceOf(address)", uint(42u8)));
    let abi = json!([{
        "type": "function",
        "name": "balanceOf",
        "stateMutability": "view",
        "inputs": [{ "name": "owner", "type": "address" }],
        "outputs": [{ "name": "balance", "type": "uint256" }]
    }]);

    let result = registry(chain.clone())
        .dispatch(
            "read_contract",
            json!({ "address": STRK, "abi": abi, "function": "balanceOf", "args": [DEV_ADDRESS] }),
        )
        .await;

    let data = result.data().expect("success envelope");
    assert_eq!(data["function"], "balanceOf(address)");
    assert_eq!(data["result"]["balance"], "42");
    assert_eq!(chain.calls(), vec![hex_selector("balanceOf(address)")]);
}

#[tokio::test]
async fn read_contract_rejects_wrong_arity_before_calling() {
    let chain = Arc::new(StubChain::new("1"));
    let abi = r#"[{"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint256"}]}]"#;

    let result = registry(chain.clone())
        .dispatch(
            "read_contract",
            json!({ "address": STRK, "abi": abi, "function": "totalSupply", "args": [1] }),
        )
        .await;

    assert!(!result.is_success());
    assert!(chain.calls().is_empty());
}
