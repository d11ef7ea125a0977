use anyhow::{anyhow, Context, Result};
use dialoguer::{theme::ColorfulTheme, Select};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai;
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::Config;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Provider {
    OpenAI,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "OpenAI"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIModel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIModelsResponse {
    data: Vec<OpenAIModel>,
}

pub struct LLMProvider {
    provider: Provider,
    model_name: String,
}

impl LLMProvider {
    /// Build a provider from the saved configuration, falling back to the
    /// interactive selector (which also persists its answer) when no
    /// configuration exists yet.
    pub async fn new() -> Result<Self> {
        if let Some(config) = Config::load()? {
            return Ok(Self {
                provider: config.provider,
                model_name: config.model_name,
            });
        }
        Self::new_interactive().await
    }

    pub async fn new_interactive() -> Result<Self> {
        let provider = Provider::OpenAI;
        let model_name = Self::select_model(&provider).await?;

        Config::new(provider.clone(), model_name.clone()).save()?;

        Ok(Self {
            provider,
            model_name,
        })
    }

    async fn select_model(provider: &Provider) -> Result<String> {
        let models = Self::list_models(provider).await?;

        if models.is_empty() {
            return Err(anyhow!("No models available for {:?}", provider));
        }

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select Model")
            .items(&models)
            .interact()?;

        Ok(models[selection].clone())
    }

    async fn list_models(provider: &Provider) -> Result<Vec<String>> {
        match provider {
            Provider::OpenAI => {
                let api_key =
                    env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;
                let client = reqwest::Client::new();
                fetch_openai_models(&client, OPENAI_API_BASE, &api_key).await
            }
        }
    }

    pub fn get_openai_client(&self) -> Result<openai::Client> {
        Ok(openai::Client::from_env())
    }

    pub fn get_model_name(&self) -> &str {
        &self.model_name
    }

    pub fn get_provider(&self) -> &Provider {
        &self.provider
    }

    /// One prompt, one plain-text completion.
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::OpenAI => {
                let client = self.get_openai_client()?;
                let agent = client.agent(&self.model_name).build();
                let response = agent
                    .prompt(prompt)
                    .await
                    .context("Completion request failed")?;
                Ok(response)
            }
        }
    }
}

pub(crate) async fn fetch_openai_models(
    client: &reqwest::Client,
    api_base: &str,
    api_key: &str,
) -> Result<Vec<String>> {
    let response = client
        .get(format!("{api_base}/models"))
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await?;

    let models: OpenAIModelsResponse = response.json().await?;

    let mut model_names: Vec<String> = models
        .data
        .iter()
        .filter(|m| m.id.contains("gpt"))
        .map(|m| m.id.clone())
        .collect();

    model_names.sort();
    model_names.dedup();

    if model_names.is_empty() {
        model_names = vec!["gpt-5".to_string(), "gpt-5-mini".to_string()];
    }

    Ok(model_names)
}

#[cfg(test)]
mod tests;
