use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "chainId": state.environment.chain_id,
        "canSign": state.environment.can_sign,
        "tools": state.registry.len(),
        "routing": state.router.is_some()
    }))
}
