use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::tools::ToolResult;
use crate::AppState;

pub async fn list_tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "tools": state.registry.descriptors() }))
}

// The envelope is returned as-is; only an unknown tool changes the status code.
pub async fn call_tool_handler(
    Path(name): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    let status = if state.registry.contains(&name) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    let args = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let result: ToolResult = state.registry.dispatch(&name, args).await;
    (status, Json(result))
}
