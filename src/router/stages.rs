//! The three routing stages and the collaborators they consult.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{Message, Next, RoutingState, Stage, StageOutput};
use crate::servers::ServerKind;
use crate::tools::{ToolDescriptor, ToolRegistry};

pub const SELECTOR: &str = "selector";
pub const CATEGORY: &str = "category";
pub const SPECIALIZED: &str = "specialized";

/// One candidate offered to a [`Classifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceOption {
    pub name: String,
    pub description: String,
}

/// A classifier's decision. `choice: None` means none of the options fit.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Picks one option for a request. The algorithm is up to the implementation.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn choose(&self, question: &str, options: &[ChoiceOption]) -> Result<Choice>;
}

/// What the specialized stage should do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Call { tool: String, arguments: Value },
    Answer(String),
}

/// Picks at most one tool call among an agent's tools.
#[async_trait]
pub trait ToolPlanner: Send + Sync {
    async fn plan(&self, question: &str, tools: &[ToolDescriptor]) -> Result<Plan>;
}

/// A specialized agent: one tool server's worth of tools.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub agents: Vec<AgentSpec>,
}

/// Categories and the agents in them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    /// `onchain` groups token/wallet/contract, `trading` holds swap. Agents
    /// whose server was not loaded, and categories left empty, are omitted.
    pub fn standard(servers: &[(ServerKind, Vec<String>)]) -> Self {
        let agent = |kind: ServerKind| -> Option<AgentSpec> {
            servers.iter().find(|(k, _)| *k == kind).map(|(_, tools)| AgentSpec {
                name: kind.as_str().to_string(),
                description: agent_description(kind).to_string(),
                tools: tools.clone(),
            })
        };
        let categories = vec![
            Category {
                name: "onchain".to_string(),
                description: "Reading chain state, token data, contracts, and sending from the account".to_string(),
                agents: [ServerKind::Token, ServerKind::Wallet, ServerKind::Contract]
                    .into_iter()
                    .filter_map(agent)
                    .collect(),
            },
            Category {
                name: "trading".to_string(),
                description: "Swap and bridge quotes and swap execution".to_string(),
                agents: [ServerKind::Swap].into_iter().filter_map(agent).collect(),
            },
        ];
        Self {
            categories: categories.into_iter().filter(|c| !c.agents.is_empty()).collect(),
        }
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.categories
            .iter()
            .flat_map(|c| c.agents.iter())
            .find(|a| a.name == name)
    }
}

fn agent_description(kind: ServerKind) -> &'static str {
    match kind {
        ServerKind::Token => "Token lookup, supply, metadata, balances, allowances, unit conversion",
        ServerKind::Wallet => "Account creation and native/token transfers and approvals",
        ServerKind::Contract => "Contract detection, interface probing and generic view calls",
        ServerKind::Swap => "DEX swap quotes, swap execution and bridge quotes",
    }
}

/// Accepts the classifier's choice only when it names one of the options.
fn decide(choice: &Choice, options: &[ChoiceOption]) -> Next {
    match choice.choice.as_deref() {
        Some(name) if options.iter().any(|o| o.name == name) => Next::Agent(name.to_string()),
        Some(name) => {
            warn!("Classifier picked unknown option '{}'", name);
            Next::End
        }
        None => Next::End,
    }
}

fn question(state: &RoutingState) -> Result<&str> {
    state.question().ok_or_else(|| anyhow!("no user message to route"))
}

pub struct SelectorStage {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<Catalog>,
}

impl SelectorStage {
    pub fn new(classifier: Arc<dyn Classifier>, catalog: Arc<Catalog>) -> Self {
        Self { classifier, catalog }
    }
}

#[async_trait]
impl Stage for SelectorStage {
    fn name(&self) -> &str {
        SELECTOR
    }

    async fn run(&self, state: &RoutingState) -> Result<StageOutput> {
        let options: Vec<ChoiceOption> = self
            .catalog
            .categories
            .iter()
            .map(|c| ChoiceOption { name: c.name.clone(), description: c.description.clone() })
            .collect();
        let choice = self.classifier.choose(question(state)?, &options).await?;
        let next = decide(&choice, &options);
        info!("Selector routed to {}", next);

        let mut output = StageOutput::new(next.clone())
            .with_info("selectedCategory", String::from(next.clone()))
            .with_info("reasoning", choice.reasoning)
            .with_info("timestamp", Utc::now().to_rfc3339());
        if next.is_end() {
            output = output.with_message(Message::assistant("I can't help with that request using the available tools."));
        }
        Ok(output)
    }
}

pub struct CategoryStage {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<Catalog>,
}

impl CategoryStage {
    pub fn new(classifier: Arc<dyn Classifier>, catalog: Arc<Catalog>) -> Self {
        Self { classifier, catalog }
    }
}

#[async_trait]
impl Stage for CategoryStage {
    fn name(&self) -> &str {
        CATEGORY
    }

    async fn run(&self, state: &RoutingState) -> Result<StageOutput> {
        let category_name = state.next.agent().unwrap_or_default();
        let Some(category) = self.catalog.category(category_name) else {
            return Ok(StageOutput::end().with_info("error", format!("unknown category '{}'", category_name)));
        };

        let options: Vec<ChoiceOption> = category
            .agents
            .iter()
            .map(|a| ChoiceOption { name: a.name.clone(), description: a.description.clone() })
            .collect();
        // A single agent needs no classification.
        let choice = if options.len() == 1 {
            Choice { choice: Some(options[0].name.clone()), reasoning: "only agent in category".to_string() }
        } else {
            self.classifier.choose(question(state)?, &options).await?
        };
        let next = decide(&choice, &options);
        info!("Category {} routed to {}", category.name, next);

        Ok(StageOutput::new(next.clone())
            .with_info("selectedAgent", String::from(next))
            .with_info("categoryReasoning", choice.reasoning)
            .with_info("timestamp", Utc::now().to_rfc3339()))
    }
}

pub struct SpecializedStage {
    planner: Arc<dyn ToolPlanner>,
    registry: Arc<ToolRegistry>,
    catalog: Arc<Catalog>,
}

impl SpecializedStage {
    pub fn new(planner: Arc<dyn ToolPlanner>, registry: Arc<ToolRegistry>, catalog: Arc<Catalog>) -> Self {
        Self { planner, registry, catalog }
    }
}

#[async_trait]
impl Stage for SpecializedStage {
    fn name(&self) -> &str {
        SPECIALIZED
    }

    async fn run(&self, state: &RoutingState) -> Result<StageOutput> {
        let agent_name = state.next.agent().unwrap_or_default();
        let agent = self
            .catalog
            .agent(agent_name)
            .ok_or_else(|| anyhow!("unknown agent '{}'", agent_name))?;
        let tools: Vec<ToolDescriptor> = self
            .registry
            .descriptors()
            .into_iter()
            .filter(|d| agent.tools.contains(&d.name))
            .collect();

        let output = StageOutput::end().with_info("agent", agent.name.clone());
        match self.planner.plan(question(state)?, &tools).await? {
            Plan::Answer(text) => Ok(output.with_message(Message::assistant(text))),
            Plan::Call { tool, arguments } => {
                if !agent.tools.contains(&tool) {
                    return Err(anyhow!("agent '{}' has no tool '{}'", agent.name, tool));
                }
                let result = self.registry.dispatch(&tool, arguments.clone()).await;
                let status = if result.is_success() { "success" } else { "failure" };
                Ok(output
                    .with_info("toolCall", json!({ "name": tool, "arguments": arguments }))
                    .with_info("toolStatus", status)
                    .with_message(Message::tool(tool, result.to_json_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_skips_missing_servers() {
        let catalog = Catalog::standard(&[(ServerKind::Token, vec!["get_total_supply".to_string()])]);
        assert_eq!(catalog.categories.len(), 1);
        assert_eq!(catalog.categories[0].name, "onchain");
        assert!(catalog.agent("token").is_some());
        assert!(catalog.agent("swap").is_none());
    }

    #[test]
    fn unknown_choices_end_the_run() {
        let options = vec![ChoiceOption { name: "onchain".into(), description: String::new() }];
        let pick = |c: Option<&str>| decide(&Choice { choice: c.map(str::to_string), reasoning: String::new() }, &options);
        assert_eq!(pick(Some("onchain")), Next::Agent("onchain".into()));
        assert_eq!(pick(Some("weather")), Next::End);
        assert_eq!(pick(None), Next::End);
    }
}
