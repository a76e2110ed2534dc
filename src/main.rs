// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chain_mcp_tools::{
    api::create_router,
    blockchain::{client::http_client, Environment, JsonRpcChain, ReadEnv, WriteEnv},
    build_registry,
    config::Config,
    mcp,
    router::{llm::LlmClassifier, RoutingGraph},
    servers::{ServerContext, ServerKind},
    AppState,
};
use clap::Parser;
use tokio::io;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chain_mcp", version, about = "MCP tool servers for EVM chains and trading APIs")]
struct Args {
    /// Serve MCP over stdin/stdout instead of HTTP (also enabled by MCP_MODE)
    #[arg(long)]
    mcp: bool,

    /// Comma-separated tool servers to expose: token, wallet, contract, swap or all
    #[arg(long, default_value = "all")]
    server: String,
}

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    let app = create_router(state);

    info!("🚀 HTTP Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("HTTP server stopped")
}

// --- MCP Server Logic ---
async fn run_mcp_server(state: AppState) -> Result<()> {
    info!("🚀 Starting MCP server on stdin/stdout...");
    mcp::serve(io::BufReader::new(io::stdin()), io::stdout(), state)
        .await
        .context("MCP transport failed")?;
    info!("MCP server shutting down");
    Ok(())
}

fn build_state(config: Config, kinds: &[ServerKind]) -> Result<AppState> {
    let config = Arc::new(config);
    let client = http_client(config.http_timeout)?;
    let rpc = JsonRpcChain::new(client.clone(), config.rpc_url()?, config.default_chain_id.clone());
    let read = ReadEnv::new(Arc::new(rpc));

    let env = match &config.tx_private_key {
        Some(key) => Environment::ReadWrite(WriteEnv::from_private_key(read, key)?),
        None => {
            warn!("TX_PRIVATE_KEY not set, write actions will be refused");
            Environment::ReadOnly(read)
        }
    };
    let environment = env.summary();
    info!(
        "Chain {} ({}), signing {}",
        environment.chain_id,
        config.rpc_url()?,
        environment.account.as_deref().unwrap_or("disabled")
    );

    let ctx = ServerContext::new(env, client.clone(), config.clone());
    let (registry, catalog) = build_registry(kinds, &ctx)?;
    let registry = Arc::new(registry);
    info!(
        "Registered {} tools from servers: {}",
        registry.len(),
        kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    );

    let router = match &config.llm_api_key {
        Some(key) => {
            let llm = LlmClassifier::new(client, config.llm_api_url.clone(), key.clone(), config.llm_model.clone());
            Some(Arc::new(RoutingGraph::standard(Arc::new(llm), registry.clone(), catalog)))
        }
        None => {
            info!("LLM_API_KEY not set, natural-language routing is disabled");
            None
        }
    };

    Ok(AppState {
        config,
        registry,
        router,
        environment,
    })
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout belongs to the MCP transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_mcp_tools=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let kinds = match ServerKind::parse_list(&args.server) {
        Ok(kinds) => kinds,
        Err(e) => {
            error!("❌ Invalid --server value: {}", e);
            std::process::exit(1);
        }
    };

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let state = match build_state(config, &kinds) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to initialize tool servers: {:#}", e);
            std::process::exit(1);
        }
    };

    let outcome = if args.mcp || std::env::var("MCP_MODE").is_ok() {
        run_mcp_server(state).await
    } else {
        run_http_server(state).await
    };
    if let Err(e) = outcome {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
