// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;

use super::traits::BaseAI;
use super::MERGE_MODEL;

/// OpenAI implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIClient {
    client: openai::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        let client = openai::Client::new(&api_key);
        Self { client }
    }
}

#[async_trait]
impl BaseAI for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            prompt_length = prompt.len(),
            model = MERGE_MODEL,
            "Building OpenAI agent for completion"
        );

        let agent = self
            .client
            .agent(MERGE_MODEL)
            .preamble("You are a real estate data analyst.")
            .max_tokens(4096)
            .build();

        let response = agent
            .prompt(prompt)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    model = MERGE_MODEL,
                    prompt_preview = %&prompt[..prompt.len().min(200)],
                    "OpenAI API call failed"
                );
                e
            })
            .context("Failed to call OpenAI API")?;

        tracing::debug!(
            response_length = response.len(),
            model = MERGE_MODEL,
            "OpenAI API response received"
        );

        Ok(response)
    }
}
