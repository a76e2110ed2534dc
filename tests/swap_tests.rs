//! Trading server against a mocked aggregator and bridge API.

mod common;

use std::sync::Arc;

use chain_mcp_tools::{blockchain::Environment, config::Config, servers::swap, tools::ToolRegistry};
use mockito::{mock, Matcher};
use serde_json::json;

use common::*;

const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// Each test mounts its mocks under its own prefix on the shared server.
fn registry(env: Environment, prefix: &str) -> ToolRegistry {
    let config = Config {
        swap_api_url: format!("{}/{}", mockito::server_url(), prefix),
        swap_api_key: Some("swap-key".to_string()),
        bridge_api_url: format!("{}/{}", mockito::server_url(), prefix),
        bridge_api_key: Some("bridge-key".to_string()),
        ..Config::default()
    };
    let ctx = context(env, config);
    ToolRegistry::builder().register_all(swap::tools(&ctx)).build().unwrap()
}

#[tokio::test]
async fn zero_sell_amount_fails_before_any_request() {
    let api = mock("GET", "/zero/swap/allowance-holder/price")
        .match_query(Matcher::Any)
        .expect(0)
        .create();
    let chain = Arc::new(StubChain::new("1"));

    let result = registry(read_only(chain.clone()), "zero")
        .dispatch(
            "get_swap_quote",
            json!({ "sellToken": "WETH", "buyToken": "USDC", "sellAmount": "0" }),
        )
        .await;

    assert!(!result.is_success());
    let error = result.error().unwrap();
    assert!(error.starts_with("invalid parameters"), "{}", error);
    assert!(error.contains("at least 0.000001"), "{}", error);
    assert!(chain.calls().is_empty());
    api.assert();
}

#[tokio::test]
async fn price_quote_is_reported_in_human_units() {
    let api = mock("GET", "/price/swap/allowance-holder/price")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("chainId".into(), "1".into()),
            Matcher::UrlEncoded("sellToken".into(), WETH.into()),
            Matcher::UrlEncoded("buyToken".into(), USDC.into()),
            Matcher::UrlEncoded("sellAmount".into(), "1000000000000000000".into()),
        ]))
        .match_header("0x-version", "v2")
        .match_header("0x-api-key", "swap-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"buyAmount":"2500000000","minBuyAmount":"2475000000"}"#)
        .create();

    let result = registry(read_only(Arc::new(StubChain::new("1"))), "price")
        .dispatch(
            "get_swap_quote",
            json!({ "sellToken": "weth", "buyToken": "USDC", "sellAmount": "1" }),
        )
        .await;

    api.assert();
    let data = result.data().expect("success envelope");
    assert_eq!(data["sellToken"], "WETH");
    assert_eq!(data["buyToken"], "USDC");
    assert_eq!(data["sellAmountRaw"], "1000000000000000000");
    assert_eq!(data["buyAmount"], "2500");
    assert_eq!(data["minBuyAmount"], "2475");
}

#[tokio::test]
async fn api_errors_carry_the_upstream_message() {
    let _api = mock("GET", "/liquidity/swap/allowance-holder/price")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"name":"INPUT_INVALID","message":"Insufficient liquidity"}"#)
        .create();

    let result = registry(read_only(Arc::new(StubChain::new("1"))), "liquidity")
        .dispatch(
            "get_swap_quote",
            json!({ "sellToken": "WETH", "buyToken": "USDC", "sellAmount": "5" }),
        )
        .await;

    assert_eq!(result.error(), Some("swap API returned HTTP 400: Insufficient liquidity"));
}

#[tokio::test]
async fn same_token_swap_is_rejected() {
    let api = mock("GET", "/same/swap/allowance-holder/price")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let result = registry(read_only(Arc::new(StubChain::new("1"))), "same")
        .dispatch(
            "get_swap_quote",
            json!({ "sellToken": "USDC", "buyToken": USDC, "sellAmount": "1" }),
        )
        .await;

    assert!(result.error().unwrap().contains("same token"));
    api.assert();
}

#[tokio::test]
async fn execute_swap_requires_a_signer() {
    let api = mock("GET", "/readonly/swap/allowance-holder/quote")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let result = registry(read_only(Arc::new(StubChain::new("1"))), "readonly")
        .dispatch(
            "execute_swap",
            json!({ "sellToken": "ETH", "buyToken": "USDC", "sellAmount": "0.5" }),
        )
        .await;

    assert!(result.error().unwrap().starts_with("precondition failed"));
    api.assert();
}

#[tokio::test]
async fn execute_swap_submits_the_quoted_transaction() {
    let api = mock("GET", "/execute/swap/allowance-holder/quote")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sellAmount".into(), "500000000000000000".into()),
            Matcher::UrlEncoded("taker".into(), DEV_ADDRESS.into()),
            Matcher::UrlEncoded("slippageBps".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "buyAmount": "1250000000",
                "transaction": {
                    "to": "0x0000000000001ff3684f28c67538d4d072c22734",
                    "data": "0x2213bc0b",
                    "value": "500000000000000000",
                    "gas": "210000",
                    "gasPrice": "1000000000"
                },
                "issues": { "allowance": null }
            })
            .to_string(),
        )
        .create();
    let chain = Arc::new(StubChain::new("1"));

    let result = registry(read_write(chain.clone()), "execute")
        .dispatch(
            "execute_swap",
            json!({ "sellToken": "ETH", "buyToken": "USDC", "sellAmount": "0.5", "slippageBps": 100 }),
        )
        .await;

    api.assert();
    let data = result.data().expect("success envelope");
    assert_eq!(data["txHash"], format!("0x{}", "ab".repeat(32)));
    assert_eq!(data["buyAmount"], "1250");
    assert_eq!(chain.calls(), vec!["send".to_string()]);
    let sent = chain.sent();
    assert_eq!(sent[0].value, Some(500_000_000_000_000_000u64.into()));
    assert_eq!(sent[0].gas, Some(210_000u64.into()));
}

#[tokio::test]
async fn allowance_issue_stops_before_sending() {
    let _api = mock("GET", "/allowance/swap/allowance-holder/quote")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "buyAmount": "1",
                "issues": { "allowance": { "actual": "0", "spender": "0x0000000000001ff3684f28c67538d4d072c22734" } }
            })
            .to_string(),
        )
        .create();
    let chain = Arc::new(StubChain::new("1"));

    let result = registry(read_write(chain.clone()), "allowance")
        .dispatch(
            "execute_swap",
            json!({ "sellToken": "USDC", "buyToken": "WETH", "sellAmount": "10" }),
        )
        .await;

    let error = result.error().unwrap();
    assert!(error.contains("run approve_token first"), "{}", error);
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn bridge_quote_reads_destination_decimals() {
    let api = mock("GET", "/bridge/quote")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fromChain".into(), "1".into()),
            Matcher::UrlEncoded("toChain".into(), "10".into()),
            Matcher::UrlEncoded("fromToken".into(), USDC.into()),
            Matcher::UrlEncoded("fromAmount".into(), "1000000".into()),
        ]))
        .match_header("x-lifi-api-key", "bridge-key")
        .with_status(200)
        .with_body(
            json!({
                "tool": "across",
                "action": { "toToken": { "symbol": "USDC", "decimals": 6 } },
                "estimate": { "toAmount": "999000", "toAmountMin": "990000", "executionDuration": 62.4 }
            })
            .to_string(),
        )
        .create();

    let result = registry(read_only(Arc::new(StubChain::new("1"))), "bridge")
        .dispatch(
            "get_bridge_quote",
            json!({
                "toChain": "10",
                "fromToken": "USDC",
                "toToken": "USDC",
                "amount": "1",
                "fromAddress": DEV_ADDRESS
            }),
        )
        .await;

    api.assert();
    let data = result.data().expect("success envelope");
    assert_eq!(data["bridge"], "across");
    assert_eq!(data["toAmount"], "0.999");
    assert_eq!(data["toAmountMin"], "0.99");
    assert_eq!(data["estimatedDurationSecs"], 62);
}
