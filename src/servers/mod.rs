//! # Tool servers
//!
//! Each server is a named bundle of tool actions over one shared
//! [`ServerContext`]. The binary picks which bundles to expose with
//! `--server token,wallet,...`; every selected tool lands in a single
//! [`ToolRegistry`](crate::tools::ToolRegistry).

pub mod contract;
pub mod swap;
pub mod token;
pub mod wallet;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::blockchain::Environment;
use crate::config::Config;
use crate::error::ToolError;
use crate::tools::Tool;

/// Everything a tool action may reach: the environment handle, the shared
/// HTTP client and the process configuration.
#[derive(Clone)]
pub struct ServerContext {
    pub env: Environment,
    pub http: Client,
    pub config: Arc<Config>,
}

impl ServerContext {
    pub fn new(env: Environment, http: Client, config: Arc<Config>) -> Self {
        Self { env, http, config }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    Token,
    Wallet,
    Contract,
    Swap,
}

impl ServerKind {
    pub const ALL: [ServerKind; 4] = [
        ServerKind::Token,
        ServerKind::Wallet,
        ServerKind::Contract,
        ServerKind::Swap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Token => "token",
            ServerKind::Wallet => "wallet",
            ServerKind::Contract => "contract",
            ServerKind::Swap => "swap",
        }
    }

    /// Parses a comma-separated selection; `all` expands to every server.
    /// Duplicates are dropped, first occurrence wins.
    pub fn parse_list(input: &str) -> Result<Vec<ServerKind>, String> {
        let mut kinds = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let selected: Vec<ServerKind> = if part.eq_ignore_ascii_case("all") {
                ServerKind::ALL.to_vec()
            } else {
                vec![part.parse()?]
            };
            for kind in selected {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        if kinds.is_empty() {
            return Err("no tool server selected".to_string());
        }
        Ok(kinds)
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" | "tokens" => Ok(ServerKind::Token),
            "wallet" => Ok(ServerKind::Wallet),
            "contract" | "contracts" => Ok(ServerKind::Contract),
            "swap" | "trading" => Ok(ServerKind::Swap),
            other => Err(format!(
                "unknown server '{}' (expected token, wallet, contract, swap or all)",
                other
            )),
        }
    }
}

/// Serializes a typed response into envelope data.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::External(format!("failed to encode response: {}", e)))
}

/// The tools one server contributes.
pub fn tools_for(kind: ServerKind, ctx: &ServerContext) -> Vec<Arc<dyn Tool>> {
    match kind {
        ServerKind::Token => token::tools(ctx),
        ServerKind::Wallet => wallet::tools(ctx),
        ServerKind::Contract => contract::tools(ctx),
        ServerKind::Swap => swap::tools(ctx),
    }
}
