//! # API Module
//!
//! HTTP transport for the same registry the stdio MCP server exposes.
//!
//! ## Available Endpoints
//!
//! - `GET /api/health` - liveness, chain and signing status
//! - `GET /api/tools` - tool descriptors (`name`, `description`, `inputSchema`)
//! - `POST /api/tools/:name` - run one tool; the body is its arguments
//! - `POST /api/rpc` - MCP JSON-RPC over HTTP
//! - `POST /api/route` - natural-language request through the routing graph

pub mod health;
pub mod route;
pub mod rpc;
pub mod tools;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/tools", get(tools::list_tools_handler))
        .route("/tools/:name", post(tools::call_tool_handler))
        .route("/rpc", post(rpc::rpc_handler))
        .route("/route", post(route::route_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
