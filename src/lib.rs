// src/lib.rs

use std::sync::Arc;

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod mcp;
pub mod router;
pub mod servers;
pub mod tools;
pub mod utils;

use blockchain::environment::EnvironmentSummary;
use router::{Catalog, RoutingGraph};
use servers::{ServerContext, ServerKind};
use tools::{RegistryError, ToolRegistry};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::Config>,
    /// Every tool the selected servers expose
    pub registry: Arc<ToolRegistry>,
    /// Natural-language routing, present only when an LLM is configured
    pub router: Option<Arc<RoutingGraph>>,
    /// Chain and signing status reported by `initialize` and `/api/health`
    pub environment: EnvironmentSummary,
}

/// Registers the tools of each selected server into one registry and
/// returns the per-server tool names alongside it for the routing catalog.
pub fn build_registry(
    kinds: &[ServerKind],
    ctx: &ServerContext,
) -> Result<(ToolRegistry, Catalog), RegistryError> {
    let mut builder = ToolRegistry::builder();
    let mut per_server = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let tools = servers::tools_for(kind, ctx);
        per_server.push((kind, tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>()));
        builder = builder.register_all(tools);
    }
    let registry = builder.build()?;
    Ok((registry, Catalog::standard(&per_server)))
}
