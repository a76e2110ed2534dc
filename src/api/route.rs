use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::router::{RoutingError, RoutingState};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub message: String,
}

/// Runs one request through the routing graph and returns the final state.
pub async fn route_handler(State(state): State<AppState>, Json(body): Json<RouteRequest>) -> impl IntoResponse {
    let Some(router) = state.router.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "routing is disabled; set LLM_API_KEY to enable it" })),
        );
    };

    let initial = RoutingState::new(body.message, state.environment.clone());
    match router.invoke(initial).await {
        Ok(final_state) => (StatusCode::OK, Json(json!(final_state))),
        Err(e @ RoutingError::NoQuestion) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
        Err(e) => {
            error!("Routing failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() })))
        }
    }
}
