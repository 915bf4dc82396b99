use std::collections::BTreeMap;
use std::time::Duration;

use arena_models::agent::AgentProfile;
use arena_models::config::ProviderConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::decision_source::DecisionSource;
use crate::error::AgentError;
use crate::parser::extract_decision;
use crate::prompts::{market_prompt, trader_system_prompt};

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Decision source speaking the OpenAI-compatible chat completions protocol.
///
/// One instance serves every provider in the config; the agent's `provider`
/// tag picks the endpoint. API keys and env-provided model ids are resolved
/// per call, so a missing variable only holds the affected agent.
pub struct ChatCompletionsSource {
    client: reqwest::Client,
    providers: BTreeMap<String, ProviderConfig>,
}

impl ChatCompletionsSource {
    pub fn new(
        providers: BTreeMap<String, ProviderConfig>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, providers })
    }

    fn provider(&self, agent: &AgentProfile) -> Result<&ProviderConfig, AgentError> {
        self.providers.get(&agent.provider).ok_or_else(|| {
            AgentError::Config(format!("unknown provider '{}'", agent.provider))
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_api_key(agent: &AgentProfile) -> Result<String, AgentError> {
    env_value(&agent.api_key_env)
        .ok_or_else(|| AgentError::Config(format!("API key missing ({})", agent.api_key_env)))
}

fn resolve_model(agent: &AgentProfile) -> Result<String, AgentError> {
    if let Some(model) = agent.model.as_deref().filter(|m| !m.trim().is_empty()) {
        return Ok(model.to_string());
    }
    match &agent.model_env {
        Some(var) => env_value(var)
            .ok_or_else(|| AgentError::Config(format!("model id missing ({var})"))),
        None => Err(AgentError::Config("no model configured".to_string())),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl DecisionSource for ChatCompletionsSource {
    async fn decide(
        &self,
        agent: &AgentProfile,
        market_summary: &str,
    ) -> Result<serde_json::Value, AgentError> {
        let provider = self.provider(agent)?;
        let api_key = resolve_api_key(agent)?;
        let model = resolve_model(agent)?;

        let mut body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": trader_system_prompt(agent)},
                {"role": "user", "content": market_prompt(market_summary)},
            ],
            "temperature": agent.temperature(),
        });
        if provider.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!(
            "{}/chat/completions",
            provider.base_url.trim_end_matches('/')
        );
        debug!(agent = %agent.name, provider = %agent.provider, %model, "Requesting decision");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                agent = %agent.name,
                status = status.as_u16(),
                "Decision provider rejected request"
            );
            return Err(AgentError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY).to_string(),
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AgentError::Parse("empty completion".to_string()))?;

        extract_decision(&content)
    }
}
