//! OpenAI-compatible chat collaborator for classification and tool planning.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::stages::{Choice, ChoiceOption, Classifier, Plan, ToolPlanner};
use crate::tools::ToolDescriptor;

pub struct LlmClassifier {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl LlmClassifier {
    pub fn new(client: Client, api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// POSTs to `/chat/completions` and returns the first choice's message.
    async fn complete(&self, body: Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!("LLM request -> {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        let json: Value = response.json().await.context("LLM returned a non-JSON body")?;
        if !status.is_success() {
            let error = json["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(anyhow!("LLM API returned HTTP {}: {}", status.as_u16(), error));
        }

        json["choices"]
            .get(0)
            .map(|choice| choice["message"].clone())
            .ok_or_else(|| anyhow!("LLM response has no choices"))
    }
}

fn options_prompt(options: &[ChoiceOption]) -> String {
    options
        .iter()
        .map(|o| format!("- {}: {}", o.name, o.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn choose(&self, question: &str, options: &[ChoiceOption]) -> Result<Choice> {
        let system = format!(
            "Route the user's request to exactly one of these options:\n{}\n\n\
             Reply with a JSON object {{\"choice\": <option name or null>, \"reasoning\": <short text>}}. \
             Use null when no option fits.",
            options_prompt(options)
        );
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": question }
            ]
        });

        let message = self.complete(body).await?;
        let content = message["content"]
            .as_str()
            .ok_or_else(|| anyhow!("classification reply has no content"))?;
        serde_json::from_str(content).with_context(|| format!("classification reply is not JSON: {}", content))
    }
}

#[async_trait]
impl ToolPlanner for LlmClassifier {
    async fn plan(&self, question: &str, tools: &[ToolDescriptor]) -> Result<Plan> {
        let functions: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema
                    }
                })
            })
            .collect();
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": "Call the single tool that answers the request. If none applies, reply in text." },
                { "role": "user", "content": question }
            ],
            "tools": functions,
            "tool_choice": "auto"
        });

        let message = self.complete(body).await?;
        if let Some(call) = message["tool_calls"].as_array().and_then(|calls| calls.first()) {
            let function = &call["function"];
            let tool = function["name"]
                .as_str()
                .ok_or_else(|| anyhow!("tool call without a name"))?
                .to_string();
            // Arguments arrive as a JSON-encoded string.
            let arguments = match &function["arguments"] {
                Value::String(raw) => serde_json::from_str(raw)
                    .with_context(|| format!("arguments for {} are not JSON", tool))?,
                other => other.clone(),
            };
            return Ok(Plan::Call { tool, arguments });
        }
        Ok(Plan::Answer(message["content"].as_str().unwrap_or_default().to_string()))
    }
}
