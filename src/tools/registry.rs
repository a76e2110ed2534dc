// src/tools/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::{Tool, ToolResult};

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// What `tools/list` advertises for one tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Collects tools at startup. Nothing can be added once [`build`](Self::build)
/// has returned.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn register_all(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Fails on the first name registered twice.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (position, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), position).is_some() {
                return Err(RegistryError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

/// Immutable name → tool map for one server (or the union of several).
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Runs the named tool. Unknown names produce a failure envelope.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        match self.get(name) {
            Some(tool) => {
                info!("Dispatching tool: {}", name);
                tool.call(args).await
            }
            None => {
                warn!("Unknown tool requested: {}", name);
                ToolResult::failure(format!("Unknown tool: {}", name))
            }
        }
    }
}
