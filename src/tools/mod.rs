//! # Tools
//!
//! The tool action contract shared by every server:
//!
//! - [`Action`] is what a tool author writes: typed, validated parameters and
//!   an async `run` that returns data or a [`ToolError`].
//! - [`Tool`] is the object-safe face the registry and transports see. It takes
//!   raw JSON arguments and always answers with a [`ToolResult`] envelope.
//! - [`ActionTool`] bridges the two: deserialize, validate, run, wrap.

pub mod registry;
pub mod result;

pub use registry::{RegistryError, ToolDescriptor, ToolRegistry, ToolRegistryBuilder};
pub use result::ToolResult;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::ToolError;

/// A named, schema-described callable exposed by a tool server.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema advertised to MCP clients in `tools/list`.
    fn input_schema(&self) -> Value;
    /// Runs the tool. Never fails: every outcome is an envelope.
    async fn call(&self, args: Value) -> ToolResult;
}

/// A single tool action with typed parameters.
#[async_trait]
pub trait Action: Send + Sync + 'static {
    type Params: DeserializeOwned + Validate + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn input_schema() -> Value;

    async fn run(&self, params: Self::Params) -> Result<Value, ToolError>;
}

/// Adapts an [`Action`] to the [`Tool`] interface.
pub struct ActionTool<A>(pub A);

impl<A: Action> ActionTool<A> {
    pub fn shared(action: A) -> Arc<dyn Tool> {
        Arc::new(ActionTool(action))
    }
}

#[async_trait]
impl<A: Action> Tool for ActionTool<A> {
    fn name(&self) -> &str {
        A::NAME
    }

    fn description(&self) -> &str {
        A::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        A::input_schema()
    }

    async fn call(&self, args: Value) -> ToolResult {
        let params = match parse_params::<A::Params>(args) {
            Ok(params) => params,
            Err(e) => {
                warn!("Rejected arguments for '{}': {}", A::NAME, e);
                return ToolResult::failure(e.to_string());
            }
        };

        match AssertUnwindSafe(self.0.run(params)).catch_unwind().await {
            Ok(Ok(data)) => {
                debug!("Tool '{}' succeeded", A::NAME);
                ToolResult::success(data)
            }
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", A::NAME, e);
                ToolResult::failure(e.to_string())
            }
            Err(_) => {
                warn!("Tool '{}' panicked", A::NAME);
                ToolResult::failure(format!("tool '{}' aborted unexpectedly", A::NAME))
            }
        }
    }
}

/// Parameters of actions that take no arguments.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

/// Schema for [`NoParams`].
pub fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

/// Deserializes and validates tool arguments. A missing argument object is
/// treated as `{}`.
pub fn parse_params<P: DeserializeOwned + Validate>(args: Value) -> Result<P, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    let params: P = serde_json::from_value(args).map_err(|e| ToolError::Validation(e.to_string()))?;
    params
        .validate()
        .map_err(|e| ToolError::Validation(describe_validation_errors(&e)))?;
    Ok(params)
}

/// Renders validator errors as `field: constraint` pairs in field order.
/// Nested (flattened) parameter groups are rendered by their own field names.
pub fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    collect_validation_errors(errors, &mut parts);
    parts.sort();

    if parts.is_empty() {
        "parameters failed validation".to_string()
    } else {
        parts.join("; ")
    }
}

fn collect_validation_errors(errors: &ValidationErrors, parts: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    parts.push(format!("{}: {}", field, describe_field_error(err)));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_validation_errors(nested, parts),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_validation_errors(nested, parts);
                }
            }
        }
    }
}

fn describe_field_error(err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }
    let mut bounds: Vec<String> = err
        .params
        .iter()
        .filter(|(k, _)| k.as_ref() != "value")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    bounds.sort();
    if bounds.is_empty() {
        format!("failed '{}' constraint", err.code)
    } else {
        format!("failed '{}' constraint ({})", err.code, bounds.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, Validate)]
    struct EchoParams {
        #[validate(length(min = 1))]
        text: String,
    }

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Action for Echo {
        type Params = EchoParams;
        const NAME: &'static str = "echo";
        const DESCRIPTION: &'static str = "Echo the text back.";

        fn input_schema() -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }

        async fn run(&self, params: EchoParams) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if params.text == "panic" {
                panic!("collaborator exploded");
            }
            if params.text == "fail" {
                return Err(ToolError::External("upstream said no".into()));
            }
            Ok(json!({ "text": params.text }))
        }
    }

    fn echo() -> ActionTool<Echo> {
        ActionTool(Echo { calls: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_run() {
        let tool = echo();
        let result = tool.call(json!({"text": ""})).await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("text"));
        assert_eq!(tool.0.calls.load(Ordering::SeqCst), 0);

        let result = tool.call(Value::Null).await;
        assert!(result.error().unwrap().contains("missing field"));
        assert_eq!(tool.0.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn errors_and_panics_become_failures() {
        let tool = echo();
        assert_eq!(
            tool.call(json!({"text": "fail"})).await,
            ToolResult::failure("upstream said no")
        );
        let result = tool.call(json!({"text": "panic"})).await;
        assert_eq!(result.error(), Some("tool 'echo' aborted unexpectedly"));
    }

    #[tokio::test]
    async fn success_wraps_data() {
        let result = echo().call(json!({"text": "hi"})).await;
        assert_eq!(result, ToolResult::success(json!({"text": "hi"})));
    }
}
