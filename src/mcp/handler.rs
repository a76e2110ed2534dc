//! # MCP Handler Module
//!
//! Implements the Model Context Protocol methods on top of the tool registry:
//!
//! - `initialize` - server info, protocol version and capabilities
//! - `ping` - liveness check
//! - `tools/list` - every registered tool with its input schema
//! - `tools/call` - dispatches one tool and returns its envelope
//!
//! Any registered tool name may also be used directly as the method; such
//! requests are rewritten into `tools/call` with `params` as the arguments.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::mcp::protocol::{call_tool_result, error_codes, CallToolParams, Request, Response, PROTOCOL_VERSION};
use crate::AppState;

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: &AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req, state),
        "ping" => Response::success(req.id, json!({})),
        "tools/list" => handle_tools_list(&req, state),
        "tools/call" => handle_tool_call(req, state).await,
        method if state.registry.contains(method) => {
            let wrapped = Request::new(
                req.id.clone(),
                "tools/call",
                Some(json!({
                    "name": method,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            );
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request. Tool failures are results with
/// `isError: true`, not JSON-RPC errors; only malformed params are.
async fn handle_tool_call(req: Request, state: &AppState) -> Response {
    let params = match req.params {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };
    let call: CallToolParams = match serde_json::from_value(params) {
        Ok(call) => call,
        Err(e) => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                format!("Invalid tools/call params: {}", e),
            )
        }
    };

    let result = state.registry.dispatch(&call.name, call.arguments).await;
    if let Some(error) = result.error() {
        warn!("Tool '{}' returned failure: {}", call.name, error);
    }
    Response::success(req.id, call_tool_result(&result))
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request, state: &AppState) -> Response {
    let environment = &state.environment;
    let instructions = format!(
        "Blockchain tool server for chain {}. {} tools available; signing is {}.",
        environment.chain_id,
        state.registry.len(),
        if environment.can_sign { "enabled" } else { "disabled (read-only)" }
    );

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": {
                "name": "chain_mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request from the registry's descriptors.
fn handle_tools_list(req: &Request, state: &AppState) -> Response {
    let tools: Vec<Value> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| json!(d))
        .collect();
    Response::success(req.id.clone(), json!({ "tools": tools }))
}
