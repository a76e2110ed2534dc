//! MCP JSON-RPC handling, both per request and over a stdio-like stream.

mod common;

use std::sync::Arc;

use chain_mcp_tools::{
    config::Config,
    mcp::{
        self,
        handler::handle_mcp_request,
        protocol::{error_codes, Request, Response, PROTOCOL_VERSION},
    },
    servers::ServerKind,
    AppState,
};
use ethers_core::types::U256;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use common::*;

fn state_with(chain: Arc<StubChain>) -> AppState {
    let ctx = context(read_only(chain), Config::default());
    app_state(&ctx, &ServerKind::ALL)
}

async fn call(state: &AppState, id: i64, method: &str, params: Value) -> Response {
    handle_mcp_request(Request::new(json!(id), method, Some(params)), state)
        .await
        .expect("requests with an id get a response")
}

#[tokio::test]
async fn initialize_reports_protocol_and_environment() {
    let state = state_with(Arc::new(StubChain::new("1")));
    let resp = call(&state, 1, "initialize", json!({})).await;
    let result = resp.result.unwrap();
    assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_advertises_every_server() {
    let state = state_with(Arc::new(StubChain::new("1")));
    let resp = call(&state, 2, "tools/list", json!({})).await;
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();

    assert_eq!(tools.len(), state.registry.len());
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in ["get_total_supply", "create_account", "detect_contract_abi", "get_swap_quote"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn tools_call_wraps_the_envelope() {
    let chain = Arc::new(StubChain::new("1").answer("totalSupply()", uint(U256::exp10(21))));
    let state = state_with(chain);

    let resp = call(
        &state,
        3,
        "tools/call",
        json!({ "name": "get_total_supply", "arguments": { "symbol": "STRK" } }),
    )
    .await;

    let result = resp.result.unwrap();
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["status"], "success");
    assert_eq!(result["structuredContent"]["data"]["totalSupply"], "1000");
    let text: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text, result["structuredContent"]);
}

#[tokio::test]
async fn tool_failures_are_results_not_rpc_errors() {
    let state = state_with(Arc::new(StubChain::new("1")));
    let resp = call(&state, 4, "tools/call", json!({ "name": "no_such_tool", "arguments": {} })).await;
    assert!(resp.error.is_none());
    let result = resp.result.unwrap();
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"], "Unknown tool: no_such_tool");
}

#[tokio::test]
async fn tool_name_as_method_is_a_shortcut() {
    let state = state_with(Arc::new(StubChain::new("1")));
    let resp = call(&state, 5, "convert_amount", json!({ "amount": "2", "direction": "toBase", "decimals": 3 })).await;
    assert_eq!(resp.result.unwrap()["structuredContent"]["data"]["output"], "2000");
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let state = state_with(Arc::new(StubChain::new("1")));

    let missing = handle_mcp_request(Request::new(json!(6), "tools/call", None), &state)
        .await
        .unwrap();
    assert_eq!(missing.error.unwrap().code, error_codes::INVALID_PARAMS);

    let unknown = call(&state, 7, "resources/list", json!({})).await;
    assert_eq!(unknown.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

    let notification = Request::new(Value::Null, "notifications/initialized", None);
    assert!(handle_mcp_request(notification, &state).await.is_none());
}

#[tokio::test]
async fn serve_answers_line_by_line() {
    let state = state_with(Arc::new(StubChain::new("1")));
    let (client, server) = tokio::io::duplex(1 << 20);
    let (server_read, server_write) = tokio::io::split(server);
    let serving = tokio::spawn(mcp::serve(BufReader::new(server_read), server_write, state));

    let (mut client_read, mut client_write) = tokio::io::split(client);
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "{not json",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
    ]
    .join("\n");
    client_write.write_all(input.as_bytes()).await.unwrap();
    client_write.write_all(b"\n").await.unwrap();
    client_write.shutdown().await.unwrap();
    drop(client_write);

    serving.await.unwrap().unwrap();
    let mut output = String::new();
    client_read.read_to_string(&mut output).await.unwrap();

    let responses: Vec<Response> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].id, json!(1));
    assert_eq!(responses[1].error.as_ref().unwrap().code, error_codes::PARSE_ERROR);
    assert_eq!(responses[2].id, json!(2));
}
