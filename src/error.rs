// src/error.rs

use thiserror::Error;

/// Everything a tool action can fail with. Each variant ends up as the `error`
/// string of a failure envelope; none of them crosses the action boundary.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Parameters failed their schema before any external call was made.
    #[error("invalid parameters: {0}")]
    Validation(String),
    /// The chain node, contract or HTTP API reported an error.
    #[error("{0}")]
    External(String),
    /// A symbol, address or identifier is not in the known tables.
    #[error("not found: {0}")]
    NotFound(String),
    /// The action cannot run in the current environment (e.g. no signer).
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// A contract call returned bytes that do not match the method's ABI.
    #[error("failed to decode {method} result: {reason}")]
    Decode { method: String, reason: String },
    /// None of the known ABI variants matched the deployed contract.
    #[error("unknown ABI for contract {0}")]
    UnknownAbi(String),
}

impl ToolError {
    pub fn decode(method: &str, reason: impl ToString) -> Self {
        ToolError::Decode {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the context chain ("eth_call failed: ...").
        ToolError::External(format!("{:#}", err))
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::External(err.to_string())
    }
}
