//! # Routing graph
//!
//! Natural-language requests travel a fixed three-hop pipeline:
//!
//! ```text
//! selector ──(next == __end__)──► terminal
//!    │
//!    ▼
//! category ──(next == __end__)──► terminal
//!    │
//!    ▼
//! specialized ──────────────────► terminal
//! ```
//!
//! Each stage reads the current [`RoutingState`] and returns a [`StageOutput`]:
//! a `next` decision, messages to append, and `routingInfo` keys that are
//! shallow-merged into what earlier stages recorded. There are no cycles and
//! each stage runs at most once per invocation.

pub mod llm;
pub mod stages;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blockchain::environment::EnvironmentSummary;
use crate::tools::ToolRegistry;

pub use stages::{
    AgentSpec, Catalog, Category, CategoryStage, Choice, ChoiceOption, Classifier, Plan, SelectorStage,
    SpecializedStage, ToolPlanner,
};

/// Terminal sentinel carried in `next`.
pub const END: &str = "__end__";

/// Where traversal goes next: a named agent/category, or the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Next {
    Agent(String),
    End,
}

impl Next {
    pub fn is_end(&self) -> bool {
        matches!(self, Next::End)
    }

    pub fn agent(&self) -> Option<&str> {
        match self {
            Next::Agent(name) => Some(name),
            Next::End => None,
        }
    }
}

impl From<String> for Next {
    fn from(value: String) -> Self {
        if value == END {
            Next::End
        } else {
            Next::Agent(value)
        }
    }
}

impl From<Next> for String {
    fn from(next: Next) -> Self {
        match next {
            Next::Agent(name) => name,
            Next::End => END.to_string(),
        }
    }
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Agent(name) => f.write_str(name),
            Next::End => f.write_str(END),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool name for `Role::Tool` messages.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), name: None }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into(), name: Some(name.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingState {
    pub messages: Vec<Message>,
    pub next: Next,
    pub mcp_environment: EnvironmentSummary,
    #[serde(default)]
    pub routing_info: Map<String, Value>,
}

impl RoutingState {
    pub fn new(question: impl Into<String>, environment: EnvironmentSummary) -> Self {
        let mut routing_info = Map::new();
        routing_info.insert("runId".to_string(), Value::String(Uuid::new_v4().to_string()));
        routing_info.insert("startedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        Self {
            messages: vec![Message::user(question)],
            next: Next::Agent(stages::SELECTOR.to_string()),
            mcp_environment: environment,
            routing_info,
        }
    }

    /// The most recent user turn.
    pub fn question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Applies a stage's update: `next` is replaced, messages are appended and
    /// `routingInfo` keys are overwritten one by one.
    pub fn apply(&mut self, output: StageOutput) {
        self.next = output.next;
        self.messages.extend(output.messages);
        for (key, value) in output.routing_info {
            self.routing_info.insert(key, value);
        }
    }
}

/// A stage's contribution to the state.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub next: Next,
    pub messages: Vec<Message>,
    pub routing_info: Map<String, Value>,
}

impl StageOutput {
    pub fn new(next: Next) -> Self {
        Self { next, messages: Vec::new(), routing_info: Map::new() }
    }

    pub fn end() -> Self {
        Self::new(Next::End)
    }

    pub fn with_info(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.routing_info.insert(key.to_string(), value.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, state: &RoutingState) -> anyhow::Result<StageOutput>;
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("routing request has no user message")]
    NoQuestion,
    #[error("{stage} stage failed: {message}")]
    Stage { stage: String, message: String },
}

/// The selector → category → specialized pipeline.
#[derive(Clone)]
pub struct RoutingGraph {
    selector: Arc<dyn Stage>,
    category: Arc<dyn Stage>,
    specialized: Arc<dyn Stage>,
}

impl RoutingGraph {
    pub fn new(selector: Arc<dyn Stage>, category: Arc<dyn Stage>, specialized: Arc<dyn Stage>) -> Self {
        Self { selector, category, specialized }
    }

    /// Runs the pipeline to the terminal state.
    pub async fn invoke(&self, mut state: RoutingState) -> Result<RoutingState, RoutingError> {
        if state.question().map_or(true, |q| q.trim().is_empty()) {
            return Err(RoutingError::NoQuestion);
        }
        let run_id = state.routing_info.get("runId").cloned().unwrap_or(Value::Null);
        info!("Routing run {} started", run_id);

        for stage in [&self.selector, &self.category, &self.specialized] {
            let output = stage.run(&state).await.map_err(|e| RoutingError::Stage {
                stage: stage.name().to_string(),
                message: format!("{:#}", e),
            })?;
            debug!("{} stage chose {}", stage.name(), output.next);
            state.apply(output);
            if state.next.is_end() {
                break;
            }
        }

        state.next = Next::End;
        info!("Routing run {} reached terminal", run_id);
        Ok(state)
    }

    /// Wires the standard stages around one classifier/planner and a registry.
    pub fn standard<C>(collaborator: Arc<C>, registry: Arc<ToolRegistry>, catalog: Catalog) -> Self
    where
        C: Classifier + ToolPlanner + 'static,
    {
        let catalog = Arc::new(catalog);
        Self::new(
            Arc::new(SelectorStage::new(collaborator.clone(), catalog.clone())),
            Arc::new(CategoryStage::new(collaborator.clone(), catalog.clone())),
            Arc::new(SpecializedStage::new(collaborator, registry, catalog)),
        )
    }
}
