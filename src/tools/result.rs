// src/tools/result.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when a failure carries no text of its own.
pub const FALLBACK_ERROR: &str = "Unknown error occurred";

/// The envelope returned by every tool action.
///
/// Serializes as `{"status":"success","data":...}` or
/// `{"status":"failure","error":"..."}`. Consumers branch on `status`; the
/// legacy `"error"` status is accepted when reading an envelope back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { data: Value },
    #[serde(alias = "error")]
    Failure { error: String },
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        ToolResult::Success { data }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let error = if message.trim().is_empty() {
            FALLBACK_ERROR.to_string()
        } else {
            message
        };
        ToolResult::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ToolResult::Success { data } => Some(data),
            ToolResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { error } => Some(error),
        }
    }

    /// Compact JSON text of the envelope, as sent back over a transport.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"failure","error":"failed to serialize result: {}"}}"#,
                e
            )
        })
    }
}
